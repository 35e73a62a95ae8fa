//! Dashboard: a read-only JSON API over the last scan and burn history.
//!
//! CORS allows GET from any origin so a local frontend can poll it.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{AppState, DashboardState};

/// Bind `port` and serve until the process exits.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server listening on http://localhost:{port}");

    axum::serve(listener, app).await.context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/scan", get(routes::get_scan))
        .route("/api/history", get(routes::get_history))
        .route("/api/stats", get(routes::get_stats))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn::{BurnCall, BurnItem, BurnKind, BurnOutcome, BurnStatus, BurnSummary};
    use crate::config::StorageConfig;
    use crate::storage::{self, BurnRecord};
    use crate::types::{Asset, ClassifiedAsset, ScanReport, SpamLevel, SpamSignal, SpamVerdict, TokenHolding};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use ethers::types::{Address, Bytes};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn report() -> ScanReport {
        let mut t = TokenHolding::sample("FREE", "Claim at free-drop.xyz");
        t.apply_price(Some(dec!(0.1)));
        let verdict = SpamVerdict {
            score: 7,
            signals: vec![SpamSignal::EmbeddedUrl, SpamSignal::BaitKeyword],
            level: SpamLevel::Spam,
        };
        ScanReport::new(
            Address::from_low_u64_be(1),
            8453,
            vec![ClassifiedAsset { asset: Asset::Token(t), verdict }],
            Vec::new(),
        )
    }

    fn record(value: rust_decimal::Decimal) -> BurnRecord {
        let item = BurnItem {
            index: 0,
            key: "token:0x1".into(),
            label: "FREE".into(),
            value_usd: Some(value),
            call: BurnCall { to: Address::zero(), data: Bytes::new(), kind: BurnKind::Erc20 },
        };
        let mut outcome = BurnOutcome::pending(&item);
        outcome.status = BurnStatus::Success;
        BurnRecord {
            chain_id: 8453,
            summary: BurnSummary::from_outcomes(Address::from_low_u64_be(1), vec![outcome], Utc::now()),
        }
    }

    fn empty_state() -> AppState {
        Arc::new(DashboardState::new(None, Vec::new()))
    }

    fn full_state() -> AppState {
        Arc::new(DashboardState::new(Some(report()), vec![record(dec!(1)), record(dec!(2))]))
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, _) = get_json(empty_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scan_missing_is_404() {
        let (status, _) = get_json(empty_state(), "/api/scan").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_endpoint() {
        let (status, json) = get_json(full_state(), "/api/scan").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["chain_id"], 8453);
        assert_eq!(json["tokens"][0]["verdict"]["level"], "Spam");
        assert_eq!(json["tokens"][0]["asset"]["kind"], "token");
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (status, json) = get_json(full_state(), "/api/history").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["summary"]["value_burned_usd"].as_f64(), Some(2.0));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (status, json) = get_json(full_state(), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["runs"], 2);
        assert_eq!(json["items_burned"], 2);
        assert_eq!(json["value_burned_usd"].as_f64(), Some(3.0));
        assert_eq!(json["spam_detected"], 1);
        assert!(json["last_scan_at"].is_string());

        let (_, empty) = get_json(empty_state(), "/api/stats").await;
        assert_eq!(empty["runs"], 0);
        assert!(empty["last_scan_at"].is_null());
    }

    #[tokio::test]
    async fn test_storage_backed_state_sees_new_burns() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            history_file: dir.path().join("history.json").to_string_lossy().to_string(),
            last_scan_file: dir.path().join("last_scan.json").to_string_lossy().to_string(),
            max_history: 10,
        };
        let state = Arc::new(DashboardState::from_storage(&config).unwrap());

        let (status, _) = get_json(state.clone(), "/api/scan").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, json) = get_json(state.clone(), "/api/history").await;
        assert_eq!(json.as_array().unwrap().len(), 0);

        // Written after the server started.
        storage::append_burn(record(dec!(4)), &config.history_file, config.max_history).unwrap();
        storage::save_last_scan(&report(), &config.last_scan_file).unwrap();

        let (_, json) = get_json(state.clone(), "/api/history").await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        let (status, _) = get_json(state.clone(), "/api/scan").await;
        assert_eq!(status, StatusCode::OK);
        let (_, stats) = get_json(state, "/api/stats").await;
        assert_eq!(stats["value_burned_usd"].as_f64(), Some(4.0));
    }

    #[tokio::test]
    async fn test_cors_allows_get() {
        let resp = build_router(empty_state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
