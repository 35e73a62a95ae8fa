//! Signal functions for the spam classifier.
//!
//! Each family function inspects one aspect of a holding and returns the
//! signals that fired. They are pure so the classifier can combine them
//! freely and tests can exercise them in isolation.

use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::config::SpamConfig;
use crate::types::{NftHolding, NftStandard, SpamSignal, TokenHolding};

/// Symbols longer than this are almost always promotional text.
const MAX_SYMBOL_LEN: usize = 12;

/// Zero-decimal tokens holding at least this many units look like airdrops.
const ZERO_DECIMALS_HUGE: Decimal = dec!(10000);

/// Round-number balances below this are too common to mean anything.
const ROUND_BALANCE_MIN: Decimal = dec!(1000);

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(https?://|www\.|t\.me/|\b[a-z0-9-]+\.(com|io|xyz|org|net|app|finance|site|online|top|vip|cc|live|gift|claim|fun|pro|club|info)\b)",
    )
    .expect("static regex")
});

static BAIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(claim|claimable|reward|rewards|airdrop|visit|voucher|bonus|free|gift|redeem|giveaway|eligible|activate)\b",
    )
    .expect("static regex")
});

/// Canonical contracts for symbols scammers like to impersonate, per chain.
static BLUE_CHIPS: Lazy<HashMap<(u64, String), Vec<Address>>> = Lazy::new(|| {
    let parse = |s: &str| s.parse::<Address>().expect("static address");
    let mut m: HashMap<(u64, &str), Vec<Address>> = HashMap::new();
    // Ethereum mainnet
    m.insert((1, "USDC"), vec![parse("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")]);
    m.insert((1, "USDT"), vec![parse("0xdAC17F958D2ee523a2206206994597C13D831ec7")]);
    m.insert((1, "WETH"), vec![parse("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")]);
    m.insert((1, "DAI"), vec![parse("0x6B175474E89094C44Da98b954EedeAC495271d0F")]);
    m.insert((1, "ETH"), Vec::new());
    // Base
    m.insert(
        (8453, "USDC"),
        vec![
            parse("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            parse("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"),
        ],
    );
    m.insert((8453, "USDT"), vec![parse("0xfde4C96c8593536E31F229EA8f37b2ADa2699bb2")]);
    m.insert((8453, "WETH"), vec![parse("0x4200000000000000000000000000000000000006")]);
    m.insert((8453, "DAI"), vec![parse("0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb")]);
    m.insert((8453, "ETH"), Vec::new());
    m.into_iter()
        .map(|((chain, symbol), addrs)| ((chain, symbol.to_string()), addrs))
        .collect()
});

/// True if `symbol` names a blue-chip on `chain_id` but `contract` is not
/// one of its canonical deployments. `ETH` as an ERC-20 is always fake.
pub fn impersonates_blue_chip(chain_id: u64, symbol: &str, contract: Address) -> bool {
    let normalized = symbol.trim().trim_start_matches('$').to_uppercase();
    match BLUE_CHIPS.get(&(chain_id, normalized)) {
        Some(canonical) => !canonical.contains(&contract),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Naming signals over any set of display strings (name, symbol,
/// collection name). Empty strings only count toward `MissingName`.
pub fn naming_signals(texts: &[&str], max_name_len: usize) -> Vec<SpamSignal> {
    let mut signals = Vec::new();

    if texts.iter().any(|t| t.trim().is_empty()) {
        signals.push(SpamSignal::MissingName);
    }
    if texts.iter().any(|t| URL_RE.is_match(t)) {
        signals.push(SpamSignal::EmbeddedUrl);
    }
    if texts.iter().any(|t| BAIT_RE.is_match(t)) {
        signals.push(SpamSignal::BaitKeyword);
    }
    if texts.iter().any(|t| !t.is_ascii()) {
        signals.push(SpamSignal::NonAsciiName);
    }
    if texts.iter().any(|t| t.chars().count() > max_name_len) {
        signals.push(SpamSignal::OverlongName);
    }

    signals
}

pub fn token_naming_signals(
    token: &TokenHolding,
    chain_id: u64,
    config: &SpamConfig,
) -> Vec<SpamSignal> {
    let mut signals = naming_signals(&[token.name.as_str(), token.symbol.as_str()], config.max_name_len);

    if token.symbol.chars().count() > MAX_SYMBOL_LEN && !signals.contains(&SpamSignal::OverlongName) {
        signals.push(SpamSignal::OverlongName);
    }
    if impersonates_blue_chip(chain_id, &token.symbol, token.contract) {
        signals.push(SpamSignal::ImpersonatesBlueChip);
    }

    signals
}

pub fn nft_naming_signals(nft: &NftHolding, config: &SpamConfig) -> Vec<SpamSignal> {
    // Individual NFT names are often blank for legitimate collections, so
    // only the collection name is required.
    let mut texts: Vec<&str> = vec![nft.collection_name.as_str()];
    if !nft.name.trim().is_empty() {
        texts.push(nft.name.as_str());
    }
    naming_signals(&texts, config.max_name_len)
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

pub fn token_value_signals(token: &TokenHolding, config: &SpamConfig) -> Vec<SpamSignal> {
    let mut signals = Vec::new();

    match token.value_usd {
        None => signals.push(SpamSignal::NoPrice),
        Some(v) if v < config.dust_value_usd => signals.push(SpamSignal::DustValue),
        Some(_) => {}
    }
    if token.decimals == 0 && token.balance >= ZERO_DECIMALS_HUGE {
        signals.push(SpamSignal::ZeroDecimalsHugeBalance);
    }

    signals
}

pub fn nft_value_signals(nft: &NftHolding, config: &SpamConfig) -> Vec<SpamSignal> {
    match nft.value_usd() {
        Some(v) if v < config.dust_value_usd => vec![SpamSignal::DustValue],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Airdrop
// ---------------------------------------------------------------------------

/// A whole multiple of 1000, e.g. 1000, 25_000, 2_000_000.
pub fn is_round_balance(balance: Decimal) -> bool {
    balance >= ROUND_BALANCE_MIN
        && balance.checked_rem(ROUND_BALANCE_MIN).is_some_and(|r| r.is_zero())
}

pub fn token_airdrop_signals(token: &TokenHolding, config: &SpamConfig) -> Vec<SpamSignal> {
    let mut signals = Vec::new();
    if is_round_balance(token.balance) {
        signals.push(SpamSignal::RoundBalance);
    }
    if token.balance >= config.implausible_balance {
        signals.push(SpamSignal::ImplausibleBalance);
    }
    signals
}

pub fn nft_airdrop_signals(nft: &NftHolding) -> Vec<SpamSignal> {
    if nft.standard == NftStandard::Erc1155
        && nft.amount > U256::one()
        && nft.floor_price_usd.is_none()
        && nft.floor_price_eth.is_none()
    {
        vec![SpamSignal::UnsolicitedQuantity]
    } else {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

pub fn token_risk_signals(token: &TokenHolding) -> Vec<SpamSignal> {
    let mut signals = Vec::new();
    if !token.verified {
        signals.push(SpamSignal::UnverifiedMetadata);
    }
    if token.logo.is_none() {
        signals.push(SpamSignal::MissingImage);
    }
    signals
}

pub fn nft_risk_signals(nft: &NftHolding) -> Vec<SpamSignal> {
    let mut signals = Vec::new();
    if nft.provider_spam {
        signals.push(SpamSignal::ProviderFlagged);
    }
    if nft.image.as_deref().map_or(true, |i| i.trim().is_empty()) {
        signals.push(SpamSignal::MissingImage);
    }
    signals
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
