//! Shared handler state.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    db::DbPool, feed::SettlementFeed, gateway::PaymentGateway, models::withdrawal::FeePolicy,
};

/// Everything a handler may need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub gateway: Arc<dyn PaymentGateway>,
    pub fees: FeePolicy,
    pub currency: String,
    pub feed: SettlementFeed,
    /// HMAC key for inbound gateway webhooks.
    pub webhook_secret: String,
}

/// Lets middleware and handlers that only need the pool extract `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
