use axum::{extract::State, http::StatusCode};

use super::{dispatch, reply, AppState, Reply};
use crate::services::ledger::LedgerRequest;

pub(super) async fn financial_summary(State(state): State<AppState>) -> Reply {
    let summary = dispatch(&state.ledger_channel, "ledger", |response| {
        LedgerRequest::Summary { response }
    })
    .await;

    reply(StatusCode::OK, summary)
}

pub(super) async fn family_overview(State(state): State<AppState>) -> Reply {
    let overview = dispatch(&state.ledger_channel, "ledger", |response| {
        LedgerRequest::FamilyOverview { response }
    })
    .await;

    reply(StatusCode::OK, overview)
}
