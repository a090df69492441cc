use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{dispatch, error_reply, reply, AppState, Reply};
use crate::services::ledger::{LedgerTable, TableRequest};

#[derive(Debug, Deserialize)]
pub(super) struct ListParams {
    family_member_id: Option<String>,
}

pub(super) async fn list<T: LedgerTable>(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Reply {
    fetch::<T>(&state, params.family_member_id).await
}

pub(super) async fn list_for_member<T: LedgerTable>(
    State(state): State<AppState>,
    Path(family_member_id): Path<String>,
) -> Reply {
    fetch::<T>(&state, Some(family_member_id)).await
}

async fn fetch<T: LedgerTable>(state: &AppState, family_member_id: Option<String>) -> Reply {
    let rows = dispatch(&state.ledger_channel, "ledger", |response| {
        T::wrap(TableRequest::List {
            family_member_id,
            response,
        })
    })
    .await;

    reply(StatusCode::OK, rows)
}

pub(super) async fn create<T: LedgerTable>(
    State(state): State<AppState>,
    Json(fields): Json<T::Insert>,
) -> Reply {
    let row = dispatch(&state.ledger_channel, "ledger", |response| {
        T::wrap(TableRequest::Create { fields, response })
    })
    .await;

    reply(StatusCode::CREATED, row)
}

pub(super) async fn update<T: LedgerTable>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<T::Patch>,
) -> Reply {
    let row = dispatch(&state.ledger_channel, "ledger", |response| {
        T::wrap(TableRequest::Update {
            id,
            patch,
            response,
        })
    })
    .await;

    reply(StatusCode::OK, row)
}

pub(super) async fn delete<T: LedgerTable>(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    let deleted = dispatch(&state.ledger_channel, "ledger", |response| {
        T::wrap(TableRequest::Delete { id, response })
    })
    .await;

    match deleted {
        Ok(id) => (StatusCode::OK, Json(json!({"id": id}))),
        Err(error) => error_reply(error),
    }
}
