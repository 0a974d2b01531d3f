//! Platform-wide aggregates for administrators.

use serde::Serialize;
use sqlx::FromRow;

use crate::{db::DbPool, error::AppError, middleware::auth::AuthContext};

/// Totals across every event, computed in one query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlatformStats {
    pub events: i64,
    pub bookings: i64,
    pub unpaid_bookings: i64,
    pub partial_bookings: i64,
    pub paid_bookings: i64,
    pub bookings_needing_reconciliation: i64,
    /// Sum of `amount_paid_minor` over all bookings.
    pub total_collected_minor: i64,
    pub total_outstanding_minor: i64,
    pub total_collection_balance_minor: i64,
    pub pending_withdrawals: i64,
    pub pending_withdrawal_minor: i64,
    pub processing_withdrawals: i64,
    pub processing_withdrawal_minor: i64,
    pub completed_withdrawal_minor: i64,
    pub platform_fees_minor: i64,
    /// Transfers the gateway paid out that the ledger could not fully cover.
    pub withdrawals_needing_reconciliation: i64,
    pub pending_refunds: i64,
}

pub async fn platform_stats(
    pool: &DbPool,
    auth: &AuthContext,
) -> Result<PlatformStats, AppError> {
    auth.require_admin()?;

    let stats = sqlx::query_as::<_, PlatformStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM events) AS events,
            b.bookings,
            b.unpaid_bookings,
            b.partial_bookings,
            b.paid_bookings,
            b.bookings_needing_reconciliation,
            b.total_collected_minor,
            b.total_outstanding_minor,
            (SELECT COALESCE(SUM(collection_balance_minor), 0)::BIGINT FROM events)
                AS total_collection_balance_minor,
            w.pending_withdrawals,
            w.pending_withdrawal_minor,
            w.processing_withdrawals,
            w.processing_withdrawal_minor,
            w.completed_withdrawal_minor,
            w.platform_fees_minor,
            w.withdrawals_needing_reconciliation,
            (SELECT COUNT(*) FROM refunds WHERE status = 'pending') AS pending_refunds
        FROM
            (
                SELECT
                    COUNT(*) AS bookings,
                    COUNT(*) FILTER (WHERE payment_status = 'unpaid') AS unpaid_bookings,
                    COUNT(*) FILTER (WHERE payment_status = 'partial') AS partial_bookings,
                    COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid_bookings,
                    COUNT(*) FILTER (WHERE needs_reconciliation) AS bookings_needing_reconciliation,
                    COALESCE(SUM(amount_paid_minor), 0)::BIGINT AS total_collected_minor,
                    COALESCE(SUM(amount_due_minor), 0)::BIGINT AS total_outstanding_minor
                FROM bookings
            ) b,
            (
                SELECT
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending_withdrawals,
                    COALESCE(SUM(amount_minor) FILTER (WHERE status = 'pending'), 0)::BIGINT
                        AS pending_withdrawal_minor,
                    COUNT(*) FILTER (WHERE status = 'processing') AS processing_withdrawals,
                    COALESCE(SUM(amount_minor) FILTER (WHERE status = 'processing'), 0)::BIGINT
                        AS processing_withdrawal_minor,
                    COALESCE(SUM(amount_minor) FILTER (WHERE status = 'completed'), 0)::BIGINT
                        AS completed_withdrawal_minor,
                    COALESCE(SUM(platform_fee_minor) FILTER (WHERE status = 'completed'), 0)::BIGINT
                        AS platform_fees_minor,
                    COUNT(*) FILTER (WHERE needs_reconciliation)
                        AS withdrawals_needing_reconciliation
                FROM withdrawals
            ) w
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
