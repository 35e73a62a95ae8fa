//! Burning.
//!
//! Converts a heterogeneous [`BurnSelection`] of tokens and NFTs into an ordered
//! list of burn items, each a direct transfer to the dead address, and
//! runs them through the [`orchestrator`].

pub mod calldata;
pub mod failure;
pub mod orchestrator;
pub mod sender;

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::config::BurnConfig;
use crate::types::{nft_key, sum_usd, token_key, Asset, BaseCleanError, ClassifiedAsset, NftStandard, ScanReport, SpamLevel};

pub use failure::BurnFailure;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnKind {
    Erc20,
    Erc721,
    Erc1155,
}

/// A contract call that moves one asset to the dead address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnCall {
    pub to: Address,
    pub data: Bytes,
    pub kind: BurnKind,
}

/// One unit of work for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnItem {
    pub index: usize,
    pub key: String,
    pub label: String,
    pub value_usd: Option<Decimal>,
    pub call: BurnCall,
}

/// Lifecycle of a burn item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum BurnStatus {
    Pending,
    Submitted,
    Success,
    Failed(BurnFailure),
    UserRejected,
    Cancelled,
    Simulated,
}

impl BurnStatus {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BurnStatus::Pending | BurnStatus::Submitted)
    }
}

impl fmt::Display for BurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurnStatus::Pending => write!(f, "pending"),
            BurnStatus::Submitted => write!(f, "submitted"),
            BurnStatus::Success => write!(f, "burned"),
            BurnStatus::Failed(reason) => write!(f, "failed ({reason})"),
            BurnStatus::UserRejected => write!(f, "rejected"),
            BurnStatus::Cancelled => write!(f, "cancelled"),
            BurnStatus::Simulated => write!(f, "simulated"),
        }
    }
}

/// Build the transfer call for one asset. `None` for empty balances.
pub fn build_call(asset: &Asset, owner: Address, dead: Address, config: &BurnConfig) -> Option<BurnCall> {
    match asset {
        Asset::Token(t) => {
            if t.raw_balance.is_zero() {
                return None;
            }
            Some(BurnCall {
                to: t.contract,
                data: calldata::erc20_transfer(dead, t.raw_balance),
                kind: BurnKind::Erc20,
            })
        }
        Asset::Nft(n) => match n.standard {
            NftStandard::Erc721 => Some(BurnCall {
                to: n.contract,
                data: calldata::erc721_transfer(owner, dead, n.token_id, !config.erc721_unsafe_transfer),
                kind: BurnKind::Erc721,
            }),
            NftStandard::Erc1155 => {
                if n.amount.is_zero() {
                    return None;
                }
                Some(BurnCall {
                    to: n.contract,
                    data: calldata::erc1155_transfer(owner, dead, n.token_id, n.amount),
                    kind: BurnKind::Erc1155,
                })
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Asset keys the user picked, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnSelection {
    keys: Vec<String>,
}

impl BurnSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every asset the scan classified as spam.
    pub fn all_spam(report: &ScanReport) -> Self {
        let mut selection = Self::new();
        for c in report.spam_tokens().chain(report.spam_nfts()) {
            selection.insert(c.asset.key());
        }
        selection
    }

    fn insert(&mut self, key: String) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn add_token(&mut self, contract: Address) {
        self.insert(token_key(contract));
    }

    pub fn add_nft(&mut self, contract: Address, token_id: U256) {
        self.insert(nft_key(contract, token_id));
    }

    /// Add an NFT written as `ADDRESS:TOKEN_ID` (decimal or 0x-hex id).
    pub fn add_nft_str(&mut self, value: &str) -> Result<(), BaseCleanError> {
        let (addr, id) = value
            .rsplit_once(':')
            .ok_or_else(|| BaseCleanError::InvalidAddress(format!("{value}: expected ADDRESS:TOKEN_ID")))?;
        let contract = crate::types::parse_address(addr)?;
        let token_id = crate::data::parse_token_id(id)
            .ok_or_else(|| BaseCleanError::InvalidAddress(format!("{value}: invalid token id")))?;
        self.add_nft(contract, token_id);
        Ok(())
    }

    pub fn merge(&mut self, other: BurnSelection) {
        for key in other.keys {
            self.insert(key);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Look every key up in `report`. Fails on the first key the scan
    /// does not contain.
    pub fn resolve(&self, report: &ScanReport) -> Result<Vec<ClassifiedAsset>, BaseCleanError> {
        self.keys
            .iter()
            .map(|key| {
                report
                    .find(key)
                    .cloned()
                    .ok_or_else(|| BaseCleanError::NotInScan(key.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Burn flow context
// ---------------------------------------------------------------------------

/// Something the user should look at before confirming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BurnWarning {
    NotSpam { key: String, label: String, level: SpamLevel },
    HighValue { key: String, label: String, value_usd: Decimal },
}

impl fmt::Display for BurnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurnWarning::NotSpam { label, level, .. } => {
                write!(f, "{label} is classified {level}, not spam")
            }
            BurnWarning::HighValue { label, value_usd, .. } => {
                write!(f, "{label} is worth about ${value_usd:.2}")
            }
        }
    }
}

/// Aggregated view of a selection, ready for confirmation and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnFlowContext {
    pub owner: Address,
    pub dead_address: Address,
    pub items: Vec<BurnItem>,
    pub token_count: usize,
    pub nft_count: usize,
    pub total_value_usd: Decimal,
    pub warnings: Vec<BurnWarning>,
    /// Keys dropped because there was nothing to transfer.
    pub skipped: Vec<String>,
}

impl BurnFlowContext {
    /// Order the selection (ERC-20s by ascending value, then NFTs in
    /// selection order), build calls and collect warnings.
    pub fn prepare(
        selection: Vec<ClassifiedAsset>,
        owner: Address,
        config: &BurnConfig,
        high_value_usd: Decimal,
    ) -> Result<Self, BaseCleanError> {
        if selection.is_empty() {
            return Err(BaseCleanError::EmptySelection);
        }
        let dead_address = crate::types::parse_address(&config.dead_address)?;

        let (mut tokens, nfts): (Vec<_>, Vec<_>) = selection
            .into_iter()
            .partition(|c| matches!(c.asset, Asset::Token(_)));
        tokens.sort_by_key(|c| c.asset.value_usd().unwrap_or(Decimal::ZERO));

        let mut items = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = Vec::new();
        let mut token_count = 0;
        let mut nft_count = 0;

        for classified in tokens.into_iter().chain(nfts) {
            let asset = &classified.asset;
            let key = asset.key();
            let label = asset.label();

            let Some(call) = build_call(asset, owner, dead_address, config) else {
                debug!(key = %key, "Skipping empty balance");
                skipped.push(key);
                continue;
            };

            if classified.verdict.level != SpamLevel::Spam {
                warnings.push(BurnWarning::NotSpam {
                    key: key.clone(),
                    label: label.clone(),
                    level: classified.verdict.level,
                });
            }
            if let Some(v) = asset.value_usd().filter(|v| *v >= high_value_usd) {
                warnings.push(BurnWarning::HighValue {
                    key: key.clone(),
                    label: label.clone(),
                    value_usd: v,
                });
            }

            match asset {
                Asset::Token(_) => token_count += 1,
                Asset::Nft(_) => nft_count += 1,
            }

            items.push(BurnItem {
                index: items.len(),
                key,
                label,
                value_usd: asset.value_usd(),
                call,
            });
        }

        if items.is_empty() {
            return Err(BaseCleanError::EmptySelection);
        }

        let total_value_usd = sum_usd(items.iter().filter_map(|i| i.value_usd));

        info!(
            tokens = token_count,
            nfts = nft_count,
            skipped = skipped.len(),
            warnings = warnings.len(),
            value = format!("${:.2}", total_value_usd),
            "Burn flow prepared"
        );

        Ok(Self {
            owner,
            dead_address,
            items,
            token_count,
            nft_count,
            total_value_usd,
            warnings,
            skipped,
        })
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnOutcome {
    pub index: usize,
    pub key: String,
    pub label: String,
    pub value_usd: Option<Decimal>,
    pub status: BurnStatus,
    pub tx_hash: Option<H256>,
    pub gas_used: Option<U256>,
    pub error: Option<String>,
}

impl BurnOutcome {
    pub fn pending(item: &BurnItem) -> Self {
        Self {
            index: item.index,
            key: item.key.clone(),
            label: item.label.clone(),
            value_usd: item.value_usd,
            status: BurnStatus::Pending,
            tx_hash: None,
            gas_used: None,
            error: None,
        }
    }
}

/// Aggregate result of one burn run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnSummary {
    pub id: uuid::Uuid,
    pub owner: Address,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<BurnOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub simulated: usize,
    pub gas_used: U256,
    pub value_burned_usd: Decimal,
}

impl BurnSummary {
    pub fn from_outcomes(owner: Address, outcomes: Vec<BurnOutcome>, started_at: DateTime<Utc>) -> Self {
        let count = |pred: fn(&BurnStatus) -> bool| outcomes.iter().filter(|o| pred(&o.status)).count();

        let succeeded = count(|s| *s == BurnStatus::Success);
        let failed = count(|s| matches!(s, BurnStatus::Failed(_)));
        let rejected = count(|s| *s == BurnStatus::UserRejected);
        let cancelled = count(|s| *s == BurnStatus::Cancelled);
        let simulated = count(|s| *s == BurnStatus::Simulated);

        let gas_used = outcomes
            .iter()
            .filter_map(|o| o.gas_used)
            .fold(U256::zero(), |acc, g| acc.saturating_add(g));
        let value_burned_usd = sum_usd(
            outcomes
                .iter()
                .filter(|o| o.status == BurnStatus::Success)
                .filter_map(|o| o.value_usd),
        );

        Self {
            id: uuid::Uuid::new_v4(),
            owner,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            succeeded,
            failed,
            rejected,
            cancelled,
            simulated,
            gas_used,
            value_burned_usd,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total()
    }

    /// Failure counts per category, for reporting.
    pub fn failures_by_category(&self) -> Vec<(BurnFailure, usize)> {
        let mut counts: Vec<(BurnFailure, usize)> = Vec::new();
        for o in &self.outcomes {
            if let BurnStatus::Failed(reason) = o.status {
                match counts.iter_mut().find(|(r, _)| *r == reason) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((reason, 1)),
                }
            }
        }
        counts
    }
}

impl fmt::Display for BurnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} burned, {} failed, {} rejected, {} cancelled",
            self.succeeded, self.failed, self.rejected, self.cancelled
        )?;
        if self.simulated > 0 {
            write!(f, ", {} simulated", self.simulated)?;
        }
        write!(f, " | ${:.2} burned, gas {}", self.value_burned_usd, self.gas_used)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
