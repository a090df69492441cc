use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::users::{Credentials, User};
use crate::repositories::AuthProvider;
use crate::session::SessionContext;
use crate::validation::Validate;

pub enum SessionRequest {
    SignUp {
        credentials: Credentials,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    SignIn {
        credentials: Credentials,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    SignOut {
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    Current {
        response: oneshot::Sender<Option<User>>,
    },
}

pub struct SessionRequestHandler<A> {
    auth: Arc<A>,
    session: SessionContext,
}

impl<A> Clone for SessionRequestHandler<A> {
    fn clone(&self) -> Self {
        SessionRequestHandler {
            auth: self.auth.clone(),
            session: self.session.clone(),
        }
    }
}

impl<A: AuthProvider + 'static> SessionRequestHandler<A> {
    pub fn new(auth: Arc<A>, session: SessionContext) -> Self {
        SessionRequestHandler { auth, session }
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<User, ServiceError> {
        credentials.validate().map_err(ServiceError::Validation)?;

        let user = self
            .auth
            .sign_up(&credentials)
            .await
            .inspect_err(|e| log::warn!("Sign-up failed for {}: {}", credentials.email, e))?;
        self.session.establish(user.clone());

        Ok(user)
    }

    async fn sign_in(&self, credentials: Credentials) -> Result<User, ServiceError> {
        credentials.validate().map_err(ServiceError::Validation)?;

        let user = self
            .auth
            .sign_in(&credentials)
            .await
            .inspect_err(|e| log::warn!("Sign-in failed for {}: {}", credentials.email, e))?;
        self.session.establish(user.clone());

        Ok(user)
    }
}

#[async_trait]
impl<A: AuthProvider + 'static> RequestHandler<SessionRequest> for SessionRequestHandler<A> {
    async fn handle_request(&self, request: SessionRequest) {
        match request {
            SessionRequest::SignUp {
                credentials,
                response,
            } => {
                let user = self.sign_up(credentials).await;
                let _ = response.send(user);
            }
            SessionRequest::SignIn {
                credentials,
                response,
            } => {
                let user = self.sign_in(credentials).await;
                let _ = response.send(user);
            }
            SessionRequest::SignOut { response } => {
                self.session.clear();
                let _ = response.send(Ok(()));
            }
            SessionRequest::Current { response } => {
                let _ = response.send(self.session.current_user());
            }
        }
    }
}

pub struct SessionService;

impl SessionService {
    pub fn new() -> Self {
        SessionService {}
    }
}

#[async_trait]
impl<A: AuthProvider + 'static> Service<SessionRequest, SessionRequestHandler<A>>
    for SessionService
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "ana@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn sign_up_establishes_the_session() {
        let session = SessionContext::new();
        let handler = SessionRequestHandler::new(Arc::new(MemoryStore::new()), session.clone());

        let user = handler.sign_up(credentials("secret1")).await.unwrap();

        assert_eq!(session.current_user(), Some(user));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_the_backend() {
        let session = SessionContext::new();
        let handler = SessionRequestHandler::new(Arc::new(MemoryStore::new()), session.clone());

        let result = handler.sign_up(credentials("abc")).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn sign_out_always_clears() {
        let session = SessionContext::new();
        let handler = SessionRequestHandler::new(Arc::new(MemoryStore::new()), session.clone());
        handler.sign_up(credentials("secret1")).await.unwrap();

        for _ in 0..2 {
            let (tx, rx) = oneshot::channel();
            handler
                .handle_request(SessionRequest::SignOut { response: tx })
                .await;
            assert!(rx.await.unwrap().is_ok());
            assert!(session.current_user().is_none());
        }

        let wrong = handler.sign_in(credentials("wrong-password")).await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));
        assert!(session.current_user().is_none());
    }
}
