//! Gateway lookups: payout banks and the platform's gateway balance.

use axum::{Extension, extract::State};
use serde::Serialize;

use crate::{
    error::AppError,
    gateway::{Bank, GatewayBalance},
    middleware::auth::AuthContext,
    money,
    response::ApiResponse,
    state::AppState,
};

/// Banks the gateway can pay out to in the configured currency.
///
/// `GET /api/v1/banks`
pub async fn list_banks(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Bank>>, AppError> {
    let banks = state.gateway.list_banks(&state.currency).await?;
    Ok(ApiResponse::ok("Banks retrieved", banks))
}

/// One currency's balance at the gateway.
#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub currency: String,
    pub balance_minor: i64,
    /// Same figure in major units, for display.
    pub balance: f64,
}

impl From<GatewayBalance> for BalanceView {
    fn from(balance: GatewayBalance) -> Self {
        Self {
            currency: balance.currency,
            balance: money::to_major(balance.balance),
            balance_minor: balance.balance,
        }
    }
}

/// Platform balance held at the gateway (admin only).
///
/// `GET /api/v1/gateway/balance`
pub async fn gateway_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<ApiResponse<Vec<BalanceView>>, AppError> {
    auth.require_admin()?;
    let balances = state.gateway.fetch_balance().await?;
    Ok(ApiResponse::ok(
        "Balance retrieved",
        balances.into_iter().map(BalanceView::from).collect(),
    ))
}
