use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::admin::AdminState;
use crate::ledger::types::{Transaction, TransactionStatus, TransactionType};
use crate::payments::prize::{reconcile_annotations, ReconcileReport};
use crate::queue::job::JobKind;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "Admin request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub signer_configured: bool,
    /// Provider reachability keyed by chain.
    pub chains: BTreeMap<String, bool>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let chains = state
        .providers
        .health_check()
        .await
        .into_iter()
        .map(|(chain, healthy)| (chain.to_string(), healthy))
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        signer_configured: state.signer_configured,
        chains,
    })
}

pub async fn get_queues(State(state): State<AdminState>) -> Json<BTreeMap<&'static str, usize>> {
    Json(
        JobKind::ALL
            .iter()
            .map(|kind| (kind.name(), state.queue.depth(*kind)))
            .collect(),
    )
}

/// Outbound payments whose funds may or may not have left the platform wallet: every
/// FAILED row, and PROCESSING rows stuck longer than `review_after`.
pub async fn get_review(State(state): State<AdminState>) -> Result<Json<Vec<Transaction>>, ApiError> {
    let rows = state
        .ledger
        .transactions_with(
            &[TransactionType::Withdrawal, TransactionType::PrizeWin],
            &[TransactionStatus::Failed, TransactionStatus::Processing],
        )
        .await
        .map_err(internal)?;

    let now = Utc::now();
    let mut review: Vec<Transaction> = rows
        .into_iter()
        .filter(|tx| match tx.status {
            TransactionStatus::Processing => (now - tx.created_at)
                .to_std()
                .is_ok_and(|age| age >= state.review_after),
            _ => true,
        })
        .collect();
    review.sort_by_key(|tx| tx.created_at);
    Ok(Json(review))
}

pub async fn get_transaction(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    match state.ledger.get_transaction(id).await.map_err(internal)? {
        Some(tx) => Ok(Json(tx)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("transaction {} not found", id) })),
        )),
    }
}

pub async fn post_reconcile(State(state): State<AdminState>) -> Result<Json<ReconcileReport>, ApiError> {
    reconcile_annotations(state.ledger.as_ref())
        .await
        .map(Json)
        .map_err(internal)
}
