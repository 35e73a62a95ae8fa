//! Scanner behaviour against degraded providers and configured lists.

use std::sync::Arc;

use baseclean::config::SpamConfig;
use baseclean::engine::Scanner;
use baseclean::spam::SpamClassifier;
use baseclean::types::{token_key, SpamLevel, SpamSignal};
use ethers::types::Address;

use crate::mock_chain::{addr, cluttered_wallet, FakeWallet};

const BASE: u64 = 8453;

fn scanner(wallet: FakeWallet, spam: SpamConfig) -> Scanner {
    let wallet = Arc::new(wallet);
    Scanner::new(
        wallet.clone(),
        wallet.clone(),
        Some(wallet),
        SpamClassifier::new(spam, BASE),
        BASE,
    )
}

fn owner() -> Address {
    addr(0xa11ce)
}

#[tokio::test]
async fn test_failed_balance_source_fails_the_scan() {
    let mut wallet = cluttered_wallet();
    wallet.failing.push("balances");
    let err = scanner(wallet, SpamConfig::default()).scan(owner()).await.unwrap_err();
    assert!(format!("{err:#}").contains("503"));
}

#[tokio::test]
async fn test_failed_nft_and_price_sources_degrade() {
    let mut wallet = cluttered_wallet();
    wallet.failing.extend(["nfts", "prices"]);
    let report = scanner(wallet, SpamConfig::default()).scan(owner()).await.unwrap();

    assert!(report.nfts.is_empty());
    assert_eq!(report.tokens.len(), 3);
    assert!(report.tokens.iter().all(|c| c.verdict.has(SpamSignal::NoPrice)));
    // Unpriced but otherwise clean tokens stay clean.
    let aero = report.find(&token_key(addr(1))).unwrap();
    assert_eq!(aero.verdict.level, SpamLevel::Clean);
}

#[tokio::test]
async fn test_allowlist_and_blocklist() {
    let spam = SpamConfig {
        allowlist: vec![format!("{:?}", addr(3))],
        blocklist: vec![format!("{:?}", addr(1)), "not-an-address".to_string()],
        ..SpamConfig::default()
    };
    let report = scanner(cluttered_wallet(), spam).scan(owner()).await.unwrap();

    let free = report.find(&token_key(addr(3))).unwrap();
    assert_eq!(free.verdict.level, SpamLevel::Clean);
    assert_eq!(free.verdict.score, 0);

    let aero = report.find(&token_key(addr(1))).unwrap();
    assert!(aero.verdict.is_spam());
    assert!(aero.verdict.has(SpamSignal::Blocklisted));
}

#[tokio::test]
async fn test_report_totals() {
    let report = scanner(cluttered_wallet(), SpamConfig::default()).scan(owner()).await.unwrap();
    // AERO 120 x $1.25 plus the punk at 0.2 ETH x $3000.
    assert_eq!(report.total_value_usd, rust_decimal::Decimal::from(750));
    assert_eq!(report.spam_value_usd, rust_decimal::Decimal::ZERO);
    assert_eq!(report.chain_id, BASE);
}
