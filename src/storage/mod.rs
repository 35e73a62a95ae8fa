//! Persistence layer.
//!
//! Burn history and the most recent scan report live in plain JSON files.
//! History is append-only from the caller's point of view and trimmed to
//! the newest `max_history` records on every write.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::burn::BurnSummary;
use crate::types::{BaseCleanError, ScanReport};

/// One completed burn run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRecord {
    pub chain_id: u64,
    pub summary: BurnSummary,
}

/// Lifetime totals over the burn history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnStats {
    pub runs: usize,
    pub items_burned: usize,
    pub items_failed: usize,
    pub items_rejected: usize,
    pub items_cancelled: usize,
    pub value_burned_usd: Decimal,
}

impl BurnStats {
    pub fn from_history(history: &[BurnRecord]) -> Self {
        history.iter().fold(Self::default(), |mut acc, r| {
            let s = &r.summary;
            acc.runs += 1;
            acc.items_burned += s.succeeded;
            acc.items_failed += s.failed;
            acc.items_rejected += s.rejected;
            acc.items_cancelled += s.cancelled;
            acc.value_burned_usd = acc.value_burned_usd.saturating_add(s.value_burned_usd);
            acc
        })
    }
}

fn ensure_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &str) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialise")?;
    std::fs::write(path, json).context(format!("Failed to write {path}"))
}

/// Load the burn history. A missing file is an empty history.
pub fn load_history(path: &str) -> Result<Vec<BurnRecord>> {
    if !Path::new(path).exists() {
        debug!(path, "No burn history yet");
        return Ok(Vec::new());
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read history from {path}"))?;
    let history: Vec<BurnRecord> = serde_json::from_str(&json)
        .map_err(|e| BaseCleanError::Storage(format!("Failed to parse history from {path}: {e}")))?;

    debug!(path, records = history.len(), "Burn history loaded");
    Ok(history)
}

/// Append a record, keeping at most `max_history` of the newest.
pub fn append_burn(record: BurnRecord, path: &str, max_history: usize) -> Result<Vec<BurnRecord>> {
    let mut history = load_history(path)?;
    history.push(record);
    if history.len() > max_history {
        let excess = history.len() - max_history;
        history.drain(..excess);
    }

    write_json(&history, path)?;
    info!(path, records = history.len(), "Burn recorded");
    Ok(history)
}

pub fn save_last_scan(report: &ScanReport, path: &str) -> Result<()> {
    write_json(report, path)?;
    debug!(path, owner = ?report.owner, "Scan report saved");
    Ok(())
}

/// Load the last scan. Returns None if no scan was saved yet.
pub fn load_last_scan(path: &str) -> Result<Option<ScanReport>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read scan from {path}"))?;
    let report: ScanReport = serde_json::from_str(&json)
        .map_err(|e| BaseCleanError::Storage(format!("Failed to parse scan from {path}: {e}")))?;
    Ok(Some(report))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn::{BurnCall, BurnItem, BurnKind, BurnOutcome, BurnStatus};
    use crate::types::{Asset, ClassifiedAsset, SpamVerdict, TokenHolding};
    use chrono::Utc;
    use ethers::types::{Address, Bytes};
    use rust_decimal_macros::dec;

    fn temp_file(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().to_string()
    }

    fn record(burned: usize) -> BurnRecord {
        let item = BurnItem {
            index: 0,
            key: "token:0x1".into(),
            label: "SPAM (Spam)".into(),
            value_usd: Some(dec!(0.5)),
            call: BurnCall { to: Address::zero(), data: Bytes::new(), kind: BurnKind::Erc20 },
        };
        let outcomes = (0..burned)
            .map(|_| {
                let mut o = BurnOutcome::pending(&item);
                o.status = BurnStatus::Success;
                o
            })
            .collect();
        BurnRecord {
            chain_id: 8453,
            summary: BurnSummary::from_outcomes(Address::from_low_u64_be(1), outcomes, Utc::now()),
        }
    }

    #[test]
    fn test_missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_history(&temp_file(&dir, "none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_append_and_cap() {
        let dir = tempfile::tempdir().unwrap();
        // Nested path exercises parent creation.
        let path = temp_file(&dir, "state/history.json");

        for n in 1..=4 {
            append_burn(record(n), &path, 3).unwrap();
        }
        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 3);
        // Oldest record (1 item) was dropped.
        let burned: Vec<usize> = history.iter().map(|r| r.summary.succeeded).collect();
        assert_eq!(burned, vec![2, 3, 4]);
    }

    #[test]
    fn test_stats_from_history() {
        let stats = BurnStats::from_history(&[record(2), record(3)]);
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.items_burned, 5);
        assert_eq!(stats.value_burned_usd, dec!(2.5));
        assert_eq!(BurnStats::from_history(&[]), BurnStats::default());
    }

    #[test]
    fn test_stats_value_saturates() {
        let mut huge = record(1);
        huge.summary.value_burned_usd = Decimal::MAX;
        let stats = BurnStats::from_history(&[huge.clone(), huge]);
        assert_eq!(stats.value_burned_usd, Decimal::MAX);
        assert_eq!(stats.items_burned, 2);
    }

    #[test]
    fn test_last_scan_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "last_scan.json");
        assert!(load_last_scan(&path).unwrap().is_none());

        let mut t = TokenHolding::sample("SPAM", "Spam");
        t.apply_price(Some(dec!(2)));
        let report = ScanReport::new(
            Address::from_low_u64_be(1),
            8453,
            vec![ClassifiedAsset { asset: Asset::Token(t), verdict: SpamVerdict::clean() }],
            Vec::new(),
        );
        save_last_scan(&report, &path).unwrap();

        let loaded = load_last_scan(&path).unwrap().unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.tokens.len(), 1);
        assert_eq!(loaded.total_value_usd, dec!(10));
    }

    #[test]
    fn test_corrupt_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "history.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_history(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<BaseCleanError>(), Some(BaseCleanError::Storage(_))));
    }
}
