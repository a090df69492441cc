use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::{AuthError, FinanceStore, StoreError};
use crate::session::SessionContext;
use crate::validation::ValidationErrors;

pub mod http;
pub mod ledger;
pub mod session;

use ledger::{Ledger, LedgerError, LedgerRequest, LedgerRequestHandler, LedgerService};
use session::{SessionRequest, SessionRequestHandler, SessionService};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(ValidationErrors),
    #[error("Not signed in")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Unknown family member '{0}'")]
    UnknownFamilyMember(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => ServiceError::NotFound(error.to_string()),
            other => ServiceError::Store(other.to_string()),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Validation(errors) => ServiceError::Validation(errors),
            LedgerError::Unauthenticated => ServiceError::Unauthenticated,
            LedgerError::UnknownFamilyMember(id) => ServiceError::UnknownFamilyMember(id),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ServiceError::InvalidCredentials,
            AuthError::EmailTaken => ServiceError::EmailTaken,
            AuthError::Store(e) => e.into(),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Request channels into the running services.
#[derive(Clone)]
pub struct Channels {
    pub ledger: mpsc::Sender<LedgerRequest>,
    pub session: mpsc::Sender<SessionRequest>,
}

/// Spawns the ledger and session services over one shared session context.
/// Must be called from within a tokio runtime.
pub fn spawn_services<S: FinanceStore>(store: Arc<S>) -> Channels {
    let (ledger_tx, mut ledger_rx) = mpsc::channel(512);
    let (session_tx, mut session_rx) = mpsc::channel(512);

    let session = SessionContext::new();
    let ledger = Ledger::new(store.clone(), session.clone());

    log::info!("Starting session watcher.");
    tokio::spawn(ledger.clone().watch_session());

    log::info!("Starting ledger service.");
    let mut ledger_service = LedgerService::new();
    tokio::spawn(async move {
        ledger_service
            .run(LedgerRequestHandler::new(ledger), &mut ledger_rx)
            .await;
    });

    log::info!("Starting session service.");
    let mut session_service = SessionService::new();
    tokio::spawn(async move {
        session_service
            .run(SessionRequestHandler::new(store, session), &mut session_rx)
            .await;
    });

    Channels {
        ledger: ledger_tx,
        session: session_tx,
    }
}

/// Starts every service and serves HTTP on `listen` until the server stops.
pub async fn start_services<S: FinanceStore>(
    store: Arc<S>,
    listen: &str,
) -> Result<(), anyhow::Error> {
    let channels = spawn_services(store);

    log::info!("Starting HTTP server.");
    http::start_http_server(listen, channels).await
}
