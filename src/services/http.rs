use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{Channels, ServiceError};
use crate::repositories::{
    AssetTable, DebtTable, FamilyAssetTable, FamilyDebtTable, FamilyMemberTable,
};

mod auth;
mod records;
mod summary;

#[derive(Clone)]
struct AppState {
    ledger_channel: mpsc::Sender<super::ledger::LedgerRequest>,
    session_channel: mpsc::Sender<super::session::SessionRequest>,
}

type Reply = (StatusCode, Json<Value>);

/// Sends a request built around a fresh reply channel and waits for the answer.
async fn dispatch<M, R>(
    channel: &mpsc::Sender<M>,
    service: &str,
    build: impl FnOnce(oneshot::Sender<Result<R, ServiceError>>) -> M,
) -> Result<R, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn status_of(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Unauthenticated | ServiceError::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        ServiceError::EmailTaken => StatusCode::CONFLICT,
        ServiceError::UnknownFamilyMember(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Store(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Communication(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(error: ServiceError) -> Reply {
    let status = status_of(&error);
    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    }

    let body = match &error {
        ServiceError::Validation(errors) => {
            let fields: Map<String, Value> = errors
                .errors
                .iter()
                .map(|e| (e.field.to_string(), Value::String(e.message.clone())))
                .collect();
            json!({"error": "Validation failed", "fields": fields})
        }
        other => json!({"error": other.to_string()}),
    };

    (status, Json(body))
}

fn reply<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Reply {
    match result {
        Ok(value) => (status, Json(json!(value))),
        Err(error) => error_reply(error),
    }
}

fn router(channels: Channels) -> Router {
    let app_state = AppState {
        ledger_channel: channels.ledger,
        session_channel: channels.session,
    };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/session", get(auth::current_session))
        .route(
            "/assets",
            get(records::list::<AssetTable>).post(records::create::<AssetTable>),
        )
        .route(
            "/assets/{id}",
            put(records::update::<AssetTable>).delete(records::delete::<AssetTable>),
        )
        .route(
            "/debts",
            get(records::list::<DebtTable>).post(records::create::<DebtTable>),
        )
        .route(
            "/debts/{id}",
            put(records::update::<DebtTable>).delete(records::delete::<DebtTable>),
        )
        .route(
            "/family/members",
            get(records::list::<FamilyMemberTable>).post(records::create::<FamilyMemberTable>),
        )
        .route(
            "/family/members/{id}",
            put(records::update::<FamilyMemberTable>)
                .delete(records::delete::<FamilyMemberTable>),
        )
        .route(
            "/family/members/{id}/assets",
            get(records::list_for_member::<FamilyAssetTable>),
        )
        .route(
            "/family/members/{id}/debts",
            get(records::list_for_member::<FamilyDebtTable>),
        )
        .route(
            "/family/assets",
            get(records::list::<FamilyAssetTable>).post(records::create::<FamilyAssetTable>),
        )
        .route(
            "/family/assets/{id}",
            put(records::update::<FamilyAssetTable>).delete(records::delete::<FamilyAssetTable>),
        )
        .route(
            "/family/debts",
            get(records::list::<FamilyDebtTable>).post(records::create::<FamilyDebtTable>),
        )
        .route(
            "/family/debts/{id}",
            put(records::update::<FamilyDebtTable>).delete(records::delete::<FamilyDebtTable>),
        )
        .route("/summary", get(summary::financial_summary))
        .route("/family/summary", get(summary::family_overview))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(listen: &str, channels: Channels) -> Result<(), anyhow::Error> {
    let app = router(channels);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
