//! Event Settlement Service - Main Application Entry Point
//!
//! REST API that collects event booking payments through a payment gateway,
//! keeps a per-booking payment ledger and a per-event collection balance,
//! and pays organizers out (withdrawals) or customers back (refunds).
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, row locks)
//! - **Gateway**: Paystack-compatible REST API behind the `PaymentGateway` trait
//! - **Authentication**: API key with SHA-256 hashing, plus HMAC-signed gateway webhooks
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Build the gateway client and shared state
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod feed;
mod gateway;
mod handlers;
mod middleware;
mod models;
mod money;
mod response;
mod services;
mod state;

use std::{sync::Arc, time::Duration};

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{feed::SettlementFeed, gateway::paystack::PaystackClient, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity; defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        currency = %config.currency,
        fee_bps = config.platform_fee_bps,
        minimum_fee_minor = config.minimum_fee_minor,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let gateway = PaystackClient::new(
        &config.gateway_base_url,
        &config.gateway_secret_key,
        Duration::from_secs(config.gateway_timeout_secs),
    )?;

    let state = AppState {
        pool,
        gateway: Arc::new(gateway),
        fees: config.fee_policy(),
        currency: config.currency.clone(),
        feed: SettlementFeed::new(),
        webhook_secret: config.gateway_secret_key.clone(),
    };

    let app = router(state).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes, with API-key auth on everything but health and the webhook.
fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Events
        .route("/api/v1/events", post(handlers::events::create_event))
        .route("/api/v1/events/{id}", get(handlers::events::get_event))
        .route(
            "/api/v1/events/{id}/account",
            put(handlers::events::set_account_details),
        )
        .route(
            "/api/v1/events/{id}/balance",
            get(handlers::events::get_balance),
        )
        // Bookings and payments
        .route(
            "/api/v1/events/{id}/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/api/v1/bookings/{id}", get(handlers::bookings::get_booking))
        .route(
            "/api/v1/bookings/{id}/payments",
            post(handlers::payments::initiate_payment),
        )
        .route(
            "/api/v1/payments/{reference}/confirm",
            post(handlers::payments::confirm_payment),
        )
        .route(
            "/api/v1/payments/{reference}/verify",
            get(handlers::payments::verify_payment),
        )
        // Gateway lookups
        .route("/api/v1/banks", get(handlers::banks::list_banks))
        .route(
            "/api/v1/gateway/balance",
            get(handlers::banks::gateway_balance),
        )
        // Withdrawals
        .route(
            "/api/v1/withdrawals",
            post(handlers::withdrawals::create_withdrawal)
                .get(handlers::withdrawals::list_withdrawals),
        )
        .route(
            "/api/v1/withdrawals/{id}/process",
            post(handlers::withdrawals::process_withdrawal),
        )
        // Refunds
        .route("/api/v1/refunds", post(handlers::refunds::create_refund))
        .route(
            "/api/v1/events/{id}/refunds",
            get(handlers::refunds::list_refunds),
        )
        .route(
            "/api/v1/refunds/{id}/approve",
            post(handlers::refunds::approve_refund),
        )
        // Settlement feed and reporting
        .route(
            "/api/v1/settlements/next",
            get(handlers::settlements::next_update),
        )
        .route("/api/v1/admin/stats", get(handlers::admin::platform_stats))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no API key)
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/gateway/webhook",
            post(handlers::webhooks::receive_webhook),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{
        gateway::fake::FakeGateway, models::withdrawal::FeePolicy, services::webhook_service,
    };

    const SECRET: &str = "sk_test_router";

    fn test_app() -> Router {
        router(AppState {
            pool: db::lazy_pool(),
            gateway: Arc::new(FakeGateway::default()),
            fees: FeePolicy {
                rate_bps: 50,
                minimum_fee_minor: 1000,
            },
            currency: "KES".to_string(),
            feed: SettlementFeed::new(),
            webhook_secret: SECRET.to_string(),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn api_routes_require_a_bearer_key() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/withdrawals")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["code"], "invalid_api_key");
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let payload = r#"{"event":"charge.success","data":{"reference":"pay_1","amount":500}}"#;
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/gateway/webhook")
                    .header(webhook_service::SIGNATURE_HEADER, "00ff")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "invalid_signature");
    }

    #[tokio::test]
    async fn signed_webhook_for_unhandled_event_is_acknowledged() {
        let payload = r#"{"event":"customeridentification.success","data":{}}"#;
        let signature = webhook_service::sign(SECRET, payload.as_bytes());

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/gateway/webhook")
                    .header(webhook_service::SIGNATURE_HEADER, signature)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["data"], "ignored");
    }
}
