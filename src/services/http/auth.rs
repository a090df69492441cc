use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use tokio::sync::oneshot;

use super::{dispatch, error_reply, reply, AppState, Reply};
use crate::models::users::Credentials;
use crate::services::{session::SessionRequest, ServiceError};

pub(super) async fn sign_up(State(state): State<AppState>, Json(credentials): Json<Credentials>) -> Reply {
    let user = dispatch(&state.session_channel, "session", |response| {
        SessionRequest::SignUp {
            credentials,
            response,
        }
    })
    .await;

    reply(StatusCode::CREATED, user)
}

pub(super) async fn sign_in(State(state): State<AppState>, Json(credentials): Json<Credentials>) -> Reply {
    let user = dispatch(&state.session_channel, "session", |response| {
        SessionRequest::SignIn {
            credentials,
            response,
        }
    })
    .await;

    reply(StatusCode::OK, user)
}

pub(super) async fn sign_out(State(state): State<AppState>) -> Reply {
    let result = dispatch(&state.session_channel, "session", |response| {
        SessionRequest::SignOut { response }
    })
    .await;

    match result {
        Ok(()) => (StatusCode::OK, Json(json!({"signed_out": true}))),
        Err(error) => error_reply(error),
    }
}

pub(super) async fn current_session(State(state): State<AppState>) -> Reply {
    let (user_tx, user_rx) = oneshot::channel();

    if let Err(e) = state
        .session_channel
        .send(SessionRequest::Current { response: user_tx })
        .await
    {
        return error_reply(ServiceError::Communication("session".to_string(), e.to_string()));
    }

    match user_rx.await {
        Ok(user) => (StatusCode::OK, Json(json!({"user": user}))),
        Err(e) => error_reply(ServiceError::Communication("session".to_string(), e.to_string())),
    }
}
