//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! When backed by the storage files, every request re-reads them so burns
//! made by other processes show up without a restart.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::StorageConfig;
use crate::storage::{self, BurnRecord, BurnStats};
use crate::types::ScanReport;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub last_scan: RwLock<Option<ScanReport>>,
    pub history: RwLock<Vec<BurnRecord>>,
    source: Option<StorageConfig>,
}

impl DashboardState {
    /// Fixed in-memory state.
    pub fn new(last_scan: Option<ScanReport>, history: Vec<BurnRecord>) -> Self {
        Self {
            last_scan: RwLock::new(last_scan),
            history: RwLock::new(history),
            source: None,
        }
    }

    /// State backed by the storage files. Fails if they exist but are unreadable.
    pub fn from_storage(config: &StorageConfig) -> Result<Self> {
        let last_scan = storage::load_last_scan(&config.last_scan_file)?;
        let history = storage::load_history(&config.history_file)?;
        Ok(Self {
            source: Some(config.clone()),
            ..Self::new(last_scan, history)
        })
    }

    /// Re-read the storage files. On a read error the previous copy is kept.
    pub async fn refresh(&self) {
        let Some(source) = &self.source else {
            return;
        };

        match storage::load_history(&source.history_file) {
            Ok(history) => *self.history.write().await = history,
            Err(e) => warn!(error = %e, "Failed to reload burn history, serving cached copy"),
        }
        match storage::load_last_scan(&source.last_scan_file) {
            Ok(scan) => *self.last_scan.write().await = scan,
            Err(e) => warn!(error = %e, "Failed to reload last scan, serving cached copy"),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub burns: BurnStats,
    pub last_scan_at: Option<String>,
    pub spam_detected: usize,
    pub spam_value_usd: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/scan
pub async fn get_scan(State(state): State<AppState>) -> Result<Json<ScanReport>, StatusCode> {
    state.refresh().await;
    let scan = state.last_scan.read().await;
    scan.clone().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/history (newest first)
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<BurnRecord>> {
    state.refresh().await;
    let history = state.history.read().await;
    Json(history.iter().rev().cloned().collect())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    state.refresh().await;
    let burns = BurnStats::from_history(&state.history.read().await);
    let scan = state.last_scan.read().await;

    Json(StatsResponse {
        burns,
        last_scan_at: scan.as_ref().map(|s| s.scanned_at.to_rfc3339()),
        spam_detected: scan.as_ref().map_or(0, |s| s.spam_count()),
        spam_value_usd: scan.as_ref().map_or(Decimal::ZERO, |s| s.spam_value_usd),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
