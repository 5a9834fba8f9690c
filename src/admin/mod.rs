//! Operations API.
//!
//! Bearer-key protected. Surfaces queue depth, provider health, and the rows that
//! need manual review, and triggers the annotation read-repair pass.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;

use crate::chain::registry::ProviderRegistry;
use crate::ledger::store::LedgerStore;
use crate::queue::memory::JobQueue;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared handles for the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub ledger: Arc<dyn LedgerStore>,
    pub queue: Arc<dyn JobQueue>,
    pub providers: ProviderRegistry,
    pub signer_configured: bool,
    pub api_key: Arc<str>,
    pub started_at: Instant,
    /// PROCESSING payouts older than this are listed for review.
    pub review_after: Duration,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/queues", get(get_queues))
        .route("/admin/review", get(get_review))
        .route("/admin/transactions/{id}", get(get_transaction))
        .route("/admin/reconcile", post(post_reconcile))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
