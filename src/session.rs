use std::sync::Arc;

use tokio::sync::watch;

use crate::models::users::User;

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Unauthenticated => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No active session")]
    Missing,
}

/// The signed-in user, shared by everything that talks to the record store.
/// Subscribers are notified on every transition.
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);

        SessionContext {
            state: Arc::new(state),
        }
    }

    pub fn establish(&self, user: User) {
        log::info!("Session established for user {}", user.id);
        self.state.send_replace(SessionState::Authenticated(user));
    }

    /// Always ends in `Unauthenticated`, even when nobody was signed in.
    pub fn clear(&self) {
        let previous = self.state.send_replace(SessionState::Unauthenticated);
        if let SessionState::Authenticated(user) = previous {
            log::info!("Session cleared for user {}", user.id);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn require_user(&self) -> Result<User, SessionError> {
        self.current_user().ok_or(SessionError::Missing)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn starts_unauthenticated() {
        let session = SessionContext::new();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(matches!(session.require_user(), Err(SessionError::Missing)));
    }

    #[test]
    fn establish_then_clear() {
        let session = SessionContext::new();
        session.establish(user("u1"));
        assert_eq!(session.require_user().unwrap().id, "u1");

        session.clear();
        assert!(session.current_user().is_none());

        session.clear();
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let session = SessionContext::new();
        let mut events = session.subscribe();

        session.establish(user("u1"));
        events.changed().await.unwrap();
        assert_eq!(events.borrow_and_update().user().unwrap().id, "u1");

        session.clone().clear();
        events.changed().await.unwrap();
        assert_eq!(*events.borrow_and_update(), SessionState::Unauthenticated);
    }
}
