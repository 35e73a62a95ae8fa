//! End-to-end: scan a cluttered wallet, select the spam, burn it against
//! the mock chain and record the result.

use std::sync::Arc;

use baseclean::burn::calldata;
use baseclean::burn::orchestrator::{BurnEvent, BurnOrchestrator};
use baseclean::burn::sender::AutoApprove;
use baseclean::burn::{BurnFailure, BurnFlowContext, BurnKind, BurnSelection, BurnStatus};
use baseclean::config::{BurnConfig, SpamConfig, DEFAULT_DEAD_ADDRESS};
use baseclean::engine::Scanner;
use baseclean::spam::SpamClassifier;
use baseclean::storage::{self, BurnRecord, BurnStats};
use baseclean::types::{nft_key, ScanReport};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use tokio_test::assert_ok;

use crate::mock_chain::{addr, cluttered_wallet, MockChain, GAS_PER_TX};

const BASE: u64 = 8453;

fn owner() -> Address {
    addr(0xa11ce)
}

fn burn_config() -> BurnConfig {
    BurnConfig {
        batch_size: 2,
        delay_between_batches_ms: 0,
        ..BurnConfig::default()
    }
}

async fn scan() -> ScanReport {
    let wallet = Arc::new(cluttered_wallet());
    let scanner = Scanner::new(
        wallet.clone(),
        wallet.clone(),
        Some(wallet),
        SpamClassifier::new(SpamConfig::default(), BASE),
        BASE,
    );
    assert_ok!(scanner.scan(owner()).await)
}

async fn spam_context() -> BurnFlowContext {
    let report = scan().await;
    let selection = BurnSelection::all_spam(&report);
    let resolved = selection.resolve(&report).unwrap();
    BurnFlowContext::prepare(resolved, owner(), &burn_config(), SpamConfig::default().high_value_usd).unwrap()
}

#[tokio::test]
async fn test_scan_finds_exactly_the_spam() {
    let report = scan().await;
    assert_eq!(report.tokens.len(), 3);
    assert_eq!(report.nfts.len(), 2);
    assert_eq!(report.spam_count(), 3);

    let spam: Vec<Address> = report
        .spam_tokens()
        .chain(report.spam_nfts())
        .map(|c| c.asset.contract())
        .collect();
    assert_eq!(spam, vec![addr(2), addr(3), addr(21)]);

    // Punk floor: 0.2 ETH at $3000.
    let punk = report.find(&nft_key(addr(20), U256::from(42))).unwrap();
    assert_eq!(punk.asset.value_usd(), Some(Decimal::from(600)));
    assert!(!punk.verdict.is_spam());
}

#[tokio::test]
async fn test_burn_spam_end_to_end() {
    let ctx = spam_context().await;
    assert_eq!(ctx.token_count, 2);
    assert_eq!(ctx.nft_count, 1);
    assert!(ctx.warnings.is_empty());

    let chain = Arc::new(MockChain::new(owner()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = BurnOrchestrator::new(chain.clone(), Arc::new(AutoApprove), &burn_config()).with_events(tx);
    let summary = orchestrator.execute(&ctx).await;

    assert!(summary.all_succeeded());
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.gas_used, U256::from(GAS_PER_TX * 3));

    // Every transfer goes straight to the dead address, in nonce order.
    let dead: Address = DEFAULT_DEAD_ADDRESS.parse().unwrap();
    let sent = chain.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent.iter().map(|t| t.nonce).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(sent[0].call.kind, BurnKind::Erc20);
    assert_eq!(sent[0].call.data, calldata::erc20_transfer(dead, U256::exp10(18) * 1_000_000u64));
    assert_eq!(sent[2].call.kind, BurnKind::Erc1155);
    assert_eq!(
        sent[2].call.data,
        calldata::erc1155_transfer(owner(), dead, U256::one(), U256::from(50))
    );

    let mut submitted = 0;
    let mut finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            BurnEvent::ItemSubmitted { .. } => submitted += 1,
            BurnEvent::Finished { succeeded, .. } => {
                assert_eq!(succeeded, 3);
                finished = true;
            }
            _ => {}
        }
    }
    assert_eq!(submitted, 3);
    assert!(finished);

    // Record and read back.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json").to_string_lossy().to_string();
    storage::append_burn(BurnRecord { chain_id: BASE, summary }, &path, 10).unwrap();
    let history = storage::load_history(&path).unwrap();
    let stats = BurnStats::from_history(&history);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.items_burned, 3);
}

#[tokio::test]
async fn test_partial_failures_do_not_stop_the_run() {
    let ctx = spam_context().await;

    let chain = Arc::new(MockChain::new(owner()));
    chain.fail_send(addr(2), "(code: -32000, message: insufficient funds for gas * price + value)");
    chain.revert_on(addr(21));

    let orchestrator = BurnOrchestrator::new(chain.clone(), Arc::new(AutoApprove), &burn_config());
    let summary = orchestrator.execute(&ctx).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.outcomes[0].status, BurnStatus::Failed(BurnFailure::InsufficientFunds));
    assert_eq!(summary.outcomes[1].status, BurnStatus::Success);
    assert_eq!(summary.outcomes[2].status, BurnStatus::Failed(BurnFailure::Reverted));

    let mut by_category = summary.failures_by_category();
    by_category.sort_by_key(|(f, _)| f.to_string());
    assert_eq!(
        by_category,
        vec![(BurnFailure::InsufficientFunds, 1), (BurnFailure::Reverted, 1)]
    );
    // The failed submission never consumed a nonce.
    assert_eq!(chain.sent().len(), 2);
}

#[tokio::test]
async fn test_dry_run_leaves_chain_untouched() {
    let ctx = spam_context().await;
    let chain = Arc::new(MockChain::new(owner()));
    let config = BurnConfig {
        dry_run: true,
        ..burn_config()
    };

    let summary = BurnOrchestrator::new(chain.clone(), Arc::new(AutoApprove), &config)
        .execute(&ctx)
        .await;

    assert_eq!(summary.simulated, 3);
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn test_selecting_a_valuable_asset_warns() {
    let report = scan().await;
    let mut selection = BurnSelection::new();
    selection.add_nft(addr(20), U256::from(42));

    let resolved = selection.resolve(&report).unwrap();
    let ctx = BurnFlowContext::prepare(resolved, owner(), &burn_config(), SpamConfig::default().high_value_usd).unwrap();
    assert_eq!(ctx.warnings.len(), 2);
}
