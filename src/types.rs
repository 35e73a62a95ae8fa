//! Shared types for BaseClean.
//!
//! These types form the data model used across all modules: holdings
//! returned by the data providers, verdicts produced by the spam
//! classifier, and the reports handed to storage and the dashboard.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// An ERC-20 balance held by the scanned address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHolding {
    pub contract: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Balance in base units, exactly as reported on-chain.
    pub raw_balance: U256,
    /// Balance scaled by `decimals`. Saturates for absurd supplies.
    pub balance: Decimal,
    pub price_usd: Option<Decimal>,
    pub value_usd: Option<Decimal>,
    pub logo: Option<String>,
    /// Whether the metadata provider returned complete metadata.
    pub verified: bool,
}

impl TokenHolding {
    /// Recompute `value_usd` from the current balance and price.
    pub fn apply_price(&mut self, price: Option<Decimal>) {
        self.price_usd = price;
        self.value_usd = price.and_then(|p| p.checked_mul(self.balance));
    }

    /// Helper to build a test/sample token with sensible defaults.
    #[cfg(test)]
    pub fn sample(symbol: &str, name: &str) -> Self {
        TokenHolding {
            contract: Address::from_low_u64_be(0xbeef),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals: 18,
            raw_balance: U256::exp10(18) * 5,
            balance: Decimal::from(5),
            price_usd: None,
            value_usd: None,
            logo: Some("https://static.alchemyapi.io/logo.png".to_string()),
            verified: true,
        }
    }
}

impl fmt::Display for TokenHolding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {} ", self.symbol, self.name, self.balance.normalize())?;
        match self.value_usd {
            Some(v) => write!(f, "${:.2}", v),
            None => write!(f, "$?"),
        }
    }
}

/// NFT token standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NftStandard {
    Erc721,
    Erc1155,
}

impl fmt::Display for NftStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NftStandard::Erc721 => write!(f, "ERC-721"),
            NftStandard::Erc1155 => write!(f, "ERC-1155"),
        }
    }
}

impl std::str::FromStr for NftStandard {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "").as_str() {
            "ERC721" => Ok(NftStandard::Erc721),
            "ERC1155" => Ok(NftStandard::Erc1155),
            other => anyhow::bail!("Unsupported NFT standard: {other}"),
        }
    }
}

/// An NFT (or ERC-1155 quantity) held by the scanned address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftHolding {
    pub contract: Address,
    pub token_id: U256,
    pub standard: NftStandard,
    /// Always 1 for ERC-721.
    pub amount: U256,
    pub name: String,
    pub collection_name: String,
    pub image: Option<String>,
    /// Collection floor in the chain's native currency.
    pub floor_price_eth: Option<Decimal>,
    pub floor_price_usd: Option<Decimal>,
    /// Spam flag reported by the NFT provider itself.
    pub provider_spam: bool,
    pub provider_spam_reasons: Vec<String>,
}

impl NftHolding {
    #[cfg(test)]
    pub fn sample(name: &str, collection: &str) -> Self {
        NftHolding {
            contract: Address::from_low_u64_be(0xcafe),
            token_id: U256::from(7),
            standard: NftStandard::Erc721,
            amount: U256::one(),
            name: name.to_string(),
            collection_name: collection.to_string(),
            image: Some("ipfs://bafy/7.png".to_string()),
            floor_price_eth: None,
            floor_price_usd: None,
            provider_spam: false,
            provider_spam_reasons: Vec::new(),
        }
    }
}

impl NftHolding {
    /// Floor-based value of the whole holding. ERC-1155 quantities count
    /// every unit at the collection floor.
    pub fn value_usd(&self) -> Option<Decimal> {
        let floor = self.floor_price_usd?;
        match self.standard {
            NftStandard::Erc721 => Some(floor),
            NftStandard::Erc1155 => Some(floor.saturating_mul(amount_to_decimal(self.amount))),
        }
    }
}

fn amount_to_decimal(amount: U256) -> Decimal {
    if amount > U256::from(u64::MAX) {
        Decimal::MAX
    } else {
        Decimal::from(amount.low_u64())
    }
}

impl fmt::Display for NftHolding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} [{}] {}",
            self.collection_name, self.token_id, self.standard, self.name
        )?;
        if self.standard == NftStandard::Erc1155 && self.amount > U256::one() {
            write!(f, " x{}", self.amount)?;
        }
        Ok(())
    }
}

/// Any asset that can be scanned, classified and burned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Asset {
    Token(TokenHolding),
    Nft(NftHolding),
}

impl Asset {
    /// Stable identifier used for selections and history records.
    pub fn key(&self) -> String {
        match self {
            Asset::Token(t) => token_key(t.contract),
            Asset::Nft(n) => nft_key(n.contract, n.token_id),
        }
    }

    pub fn contract(&self) -> Address {
        match self {
            Asset::Token(t) => t.contract,
            Asset::Nft(n) => n.contract,
        }
    }

    /// Estimated USD value (token value or NFT floor times quantity).
    pub fn value_usd(&self) -> Option<Decimal> {
        match self {
            Asset::Token(t) => t.value_usd,
            Asset::Nft(n) => n.value_usd(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Asset::Token(t) => format!("{} ({})", t.symbol, t.name),
            Asset::Nft(n) => format!("{} #{}", n.collection_name, n.token_id),
        }
    }
}

/// Sum USD amounts, saturating at `Decimal::MAX` instead of overflowing.
pub fn sum_usd(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

pub fn token_key(contract: Address) -> String {
    format!("token:{contract:?}")
}

pub fn nft_key(contract: Address, token_id: U256) -> String {
    format!("nft:{contract:?}:{token_id}")
}

// ---------------------------------------------------------------------------
// Spam verdicts
// ---------------------------------------------------------------------------

/// A single heuristic that fired during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamSignal {
    // Naming
    EmbeddedUrl,
    BaitKeyword,
    NonAsciiName,
    OverlongName,
    MissingName,
    ImpersonatesBlueChip,
    // Value
    NoPrice,
    DustValue,
    ZeroDecimalsHugeBalance,
    // Airdrop
    RoundBalance,
    ImplausibleBalance,
    UnsolicitedQuantity,
    // Risk
    ProviderFlagged,
    UnverifiedMetadata,
    MissingImage,
    Blocklisted,
}

impl SpamSignal {
    pub fn family(&self) -> SignalFamily {
        use SpamSignal::*;
        match self {
            EmbeddedUrl | BaitKeyword | NonAsciiName | OverlongName | MissingName
            | ImpersonatesBlueChip => SignalFamily::Naming,
            NoPrice | DustValue | ZeroDecimalsHugeBalance => SignalFamily::Value,
            RoundBalance | ImplausibleBalance | UnsolicitedQuantity => SignalFamily::Airdrop,
            ProviderFlagged | UnverifiedMetadata | MissingImage | Blocklisted => {
                SignalFamily::Risk
            }
        }
    }
}

impl fmt::Display for SpamSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpamSignal::EmbeddedUrl => "embedded URL",
            SpamSignal::BaitKeyword => "bait keyword",
            SpamSignal::NonAsciiName => "non-ASCII name",
            SpamSignal::OverlongName => "overlong name",
            SpamSignal::MissingName => "missing name",
            SpamSignal::ImpersonatesBlueChip => "impersonates blue-chip",
            SpamSignal::NoPrice => "no price",
            SpamSignal::DustValue => "dust value",
            SpamSignal::ZeroDecimalsHugeBalance => "zero decimals, huge balance",
            SpamSignal::RoundBalance => "round airdrop balance",
            SpamSignal::ImplausibleBalance => "implausible balance",
            SpamSignal::UnsolicitedQuantity => "unsolicited quantity",
            SpamSignal::ProviderFlagged => "provider flagged",
            SpamSignal::UnverifiedMetadata => "unverified metadata",
            SpamSignal::MissingImage => "missing image",
            SpamSignal::Blocklisted => "blocklisted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalFamily {
    Naming,
    Value,
    Airdrop,
    Risk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpamLevel {
    Clean,
    Suspicious,
    Spam,
}

impl fmt::Display for SpamLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpamLevel::Clean => write!(f, "clean"),
            SpamLevel::Suspicious => write!(f, "suspicious"),
            SpamLevel::Spam => write!(f, "SPAM"),
        }
    }
}

/// Result of classifying one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamVerdict {
    pub score: u32,
    pub signals: Vec<SpamSignal>,
    pub level: SpamLevel,
}

impl SpamVerdict {
    pub fn clean() -> Self {
        Self {
            score: 0,
            signals: Vec::new(),
            level: SpamLevel::Clean,
        }
    }

    pub fn is_spam(&self) -> bool {
        self.level == SpamLevel::Spam
    }

    pub fn has(&self, signal: SpamSignal) -> bool {
        self.signals.contains(&signal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedAsset {
    pub asset: Asset,
    pub verdict: SpamVerdict,
}

// ---------------------------------------------------------------------------
// Scan report
// ---------------------------------------------------------------------------

/// Everything one scan of an address produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: uuid::Uuid,
    pub owner: Address,
    pub chain_id: u64,
    pub scanned_at: DateTime<Utc>,
    pub tokens: Vec<ClassifiedAsset>,
    pub nfts: Vec<ClassifiedAsset>,
    pub total_value_usd: Decimal,
    pub spam_value_usd: Decimal,
}

impl ScanReport {
    pub fn new(
        owner: Address,
        chain_id: u64,
        tokens: Vec<ClassifiedAsset>,
        nfts: Vec<ClassifiedAsset>,
    ) -> Self {
        let value_of = |spam_only: bool| -> Decimal {
            sum_usd(
                tokens
                    .iter()
                    .chain(nfts.iter())
                    .filter(|c| !spam_only || c.verdict.is_spam())
                    .filter_map(|c| c.asset.value_usd()),
            )
        };
        let total_value_usd = value_of(false);
        let spam_value_usd = value_of(true);

        Self {
            id: uuid::Uuid::new_v4(),
            owner,
            chain_id,
            scanned_at: Utc::now(),
            tokens,
            nfts,
            total_value_usd,
            spam_value_usd,
        }
    }

    pub fn spam_tokens(&self) -> impl Iterator<Item = &ClassifiedAsset> {
        self.tokens.iter().filter(|c| c.verdict.is_spam())
    }

    pub fn spam_nfts(&self) -> impl Iterator<Item = &ClassifiedAsset> {
        self.nfts.iter().filter(|c| c.verdict.is_spam())
    }

    pub fn spam_count(&self) -> usize {
        self.spam_tokens().count() + self.spam_nfts().count()
    }

    /// Look up an asset in the report by its key.
    pub fn find(&self, key: &str) -> Option<&ClassifiedAsset> {
        self.tokens
            .iter()
            .chain(self.nfts.iter())
            .find(|c| c.asset.key() == key)
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan {:?} on chain {}: {} tokens, {} NFTs, {} spam | value ${:.2} (spam ${:.2})",
            self.owner,
            self.chain_id,
            self.tokens.len(),
            self.nfts.len(),
            self.spam_count(),
            self.total_value_usd,
            self.spam_value_usd,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for BaseClean.
#[derive(Debug, thiserror::Error)]
pub enum BaseCleanError {
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Nothing selected to burn")]
    EmptySelection,

    #[error("Not found in the scan: {0}")]
    NotInScan(String),

    #[error("Signer error: {0}")]
    Signer(String),
}

/// Parse a hex address, mapping failures to `BaseCleanError::InvalidAddress`.
pub fn parse_address(s: &str) -> Result<Address, BaseCleanError> {
    s.trim()
        .parse::<Address>()
        .map_err(|e| BaseCleanError::InvalidAddress(format!("{s}: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
