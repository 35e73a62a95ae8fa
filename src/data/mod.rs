//! Data providers.
//!
//! Defines the provider traits the scanner depends on and the HTTP
//! implementations behind them:
//! - Alchemy: ERC-20 balances, token metadata, NFTs with spam flags
//! - DeFiLlama: current USD prices by contract address

pub mod alchemy;
pub mod defillama;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::NftHolding;

/// Largest number of integer digits a `Decimal` can hold safely.
const MAX_DECIMAL_DIGITS: usize = 28;

/// One non-zero ERC-20 balance before metadata is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokenBalance {
    pub contract: Address,
    pub raw_balance: U256,
}

/// Token metadata as reported by the provider. Every field may be absent
/// for broken or malicious contracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub logo: Option<String>,
}

impl TokenMetadata {
    pub fn is_complete(&self) -> bool {
        self.name.as_deref().is_some_and(|s| !s.is_empty())
            && self.symbol.as_deref().is_some_and(|s| !s.is_empty())
            && self.decimals.is_some()
    }
}

/// Source of fungible token balances and metadata.
#[async_trait]
pub trait TokenBalanceProvider: Send + Sync {
    /// All non-zero ERC-20 balances of `owner`.
    async fn token_balances(&self, owner: Address) -> Result<Vec<RawTokenBalance>>;

    async fn token_metadata(&self, contract: Address) -> Result<TokenMetadata>;

    fn name(&self) -> &str;
}

/// Source of NFT holdings.
#[async_trait]
pub trait NftProvider: Send + Sync {
    async fn nfts_for_owner(&self, owner: Address) -> Result<Vec<NftHolding>>;

    fn name(&self) -> &str;
}

/// Source of USD prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Prices for the given contracts. Unknown tokens are simply absent.
    async fn prices_usd(&self, contracts: &[Address]) -> Result<HashMap<Address, Decimal>>;

    /// Price of the chain's native currency.
    async fn native_price_usd(&self) -> Result<Option<Decimal>>;

    fn name(&self) -> &str;
}

/// Scale a base-unit balance into human units.
///
/// Fractional digits beyond what `Decimal` can represent are truncated;
/// integer parts wider than 28 digits saturate to `Decimal::MAX`.
pub fn scale_balance(raw: U256, decimals: u8) -> Decimal {
    let digits = raw.to_string();
    let d = decimals as usize;

    let (int_part, frac_part) = if digits.len() > d {
        let (i, f) = digits.split_at(digits.len() - d);
        (i.to_string(), f.to_string())
    } else {
        ("0".to_string(), format!("{}{}", "0".repeat(d - digits.len()), digits))
    };

    if int_part.len() > MAX_DECIMAL_DIGITS {
        return Decimal::MAX;
    }

    let keep = MAX_DECIMAL_DIGITS.saturating_sub(int_part.len());
    let frac: String = frac_part.chars().take(keep).collect();
    let frac = frac.trim_end_matches('0');

    let text = if frac.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac}")
    };

    Decimal::from_str(&text).unwrap_or(Decimal::MAX)
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u256(s: &str) -> Option<U256> {
    let hex = s.trim().trim_start_matches("0x");
    if hex.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(hex, 16).ok()
}

/// Parse a token id that may come as decimal or `0x` hex.
pub fn parse_token_id(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.starts_with("0x") {
        parse_hex_u256(s)
    } else {
        U256::from_dec_str(s).ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale_balance_basic() {
        let raw = U256::from(1_500_000u64);
        assert_eq!(scale_balance(raw, 6), dec!(1.5));
        assert_eq!(scale_balance(U256::exp10(18) * 3, 18), dec!(3));
    }

    #[test]
    fn test_scale_balance_small_value() {
        assert_eq!(scale_balance(U256::from(1), 18), dec!(0.000000000000000001));
        assert_eq!(scale_balance(U256::zero(), 18), Decimal::ZERO);
    }

    #[test]
    fn test_scale_balance_zero_decimals() {
        assert_eq!(scale_balance(U256::from(42), 0), dec!(42));
    }

    #[test]
    fn test_scale_balance_saturates() {
        assert_eq!(scale_balance(U256::MAX, 0), Decimal::MAX);
    }

    #[test]
    fn test_parse_hex_and_ids() {
        assert_eq!(parse_hex_u256("0x0de0b6b3a7640000"), Some(U256::exp10(18)));
        assert_eq!(parse_hex_u256("0x"), Some(U256::zero()));
        assert_eq!(parse_hex_u256("0xzz"), None);
        assert_eq!(parse_token_id("1234"), Some(U256::from(1234)));
        assert_eq!(parse_token_id("0x10"), Some(U256::from(16)));
    }

    #[test]
    fn test_metadata_completeness() {
        let mut m = TokenMetadata {
            name: Some("Token".into()),
            symbol: Some("TKN".into()),
            decimals: Some(18),
            logo: None,
        };
        assert!(m.is_complete());
        m.symbol = Some(String::new());
        assert!(!m.is_complete());
    }
}
