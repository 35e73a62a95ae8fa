//! Mock chain and data providers for integration testing.
//!
//! `MockChain` is a deterministic `TransactionSender` that accepts every
//! call, hands out sequential nonces and records what was sent. Contracts
//! can be told to revert or to fail at submission. `FakeWallet` serves a
//! fixed set of holdings through all three provider traits.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use baseclean::burn::sender::{ReceiptOutcome, TransactionSender};
use baseclean::burn::BurnCall;
use baseclean::data::{NftProvider, PriceProvider, RawTokenBalance, TokenBalanceProvider, TokenMetadata};
use baseclean::types::{NftHolding, NftStandard};

pub const GAS_PER_TX: u64 = 45_000;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub nonce: u64,
    pub hash: H256,
    pub call: BurnCall,
}

pub struct MockChain {
    owner: Address,
    sent: Arc<Mutex<Vec<SentTx>>>,
    reverts: Arc<Mutex<Vec<Address>>>,
    send_errors: Arc<Mutex<HashMap<Address, String>>>,
}

impl MockChain {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            sent: Arc::new(Mutex::new(Vec::new())),
            reverts: Arc::new(Mutex::new(Vec::new())),
            send_errors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Transactions to `contract` are mined but revert.
    pub fn revert_on(&self, contract: Address) {
        self.reverts.lock().unwrap().push(contract);
    }

    /// Submissions to `contract` fail with `message`.
    pub fn fail_send(&self, contract: Address, message: &str) {
        self.send_errors.lock().unwrap().insert(contract, message.to_string());
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSender for MockChain {
    fn sender_address(&self) -> Address {
        self.owner
    }

    async fn send(&self, call: &BurnCall) -> Result<H256> {
        if let Some(msg) = self.send_errors.lock().unwrap().get(&call.to) {
            return Err(anyhow!("{msg}"));
        }
        let mut sent = self.sent.lock().unwrap();
        let nonce = sent.len() as u64;
        let hash = H256::from_low_u64_be(nonce + 1);
        sent.push(SentTx { nonce, hash, call: call.clone() });
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome> {
        let sent = self.sent.lock().unwrap();
        let tx = sent
            .iter()
            .find(|t| t.hash == tx_hash)
            .ok_or_else(|| anyhow!("transaction {tx_hash:?} not found"))?;
        let reverted = self.reverts.lock().unwrap().contains(&tx.call.to);
        Ok(ReceiptOutcome {
            success: !reverted,
            gas_used: Some(U256::from(GAS_PER_TX)),
            block_number: Some(100 + tx.nonce),
        })
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

pub struct FakeToken {
    pub contract: Address,
    pub raw_balance: U256,
    pub metadata: TokenMetadata,
    pub price: Option<Decimal>,
}

#[derive(Default)]
pub struct FakeWallet {
    pub tokens: Vec<FakeToken>,
    pub nfts: Vec<NftHolding>,
    pub native_price: Option<Decimal>,
    /// If set, the named provider fails ("balances", "nfts", "prices").
    pub failing: Vec<&'static str>,
}

impl FakeWallet {
    fn check(&self, which: &str) -> Result<()> {
        if self.failing.contains(&which) {
            Err(anyhow!("{which} provider unavailable (503)"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TokenBalanceProvider for FakeWallet {
    async fn token_balances(&self, _owner: Address) -> Result<Vec<RawTokenBalance>> {
        self.check("balances")?;
        Ok(self
            .tokens
            .iter()
            .map(|t| RawTokenBalance { contract: t.contract, raw_balance: t.raw_balance })
            .collect())
    }

    async fn token_metadata(&self, contract: Address) -> Result<TokenMetadata> {
        self.tokens
            .iter()
            .find(|t| t.contract == contract)
            .map(|t| t.metadata.clone())
            .ok_or_else(|| anyhow!("unknown contract"))
    }

    fn name(&self) -> &str {
        "fake-wallet"
    }
}

#[async_trait]
impl NftProvider for FakeWallet {
    async fn nfts_for_owner(&self, _owner: Address) -> Result<Vec<NftHolding>> {
        self.check("nfts")?;
        Ok(self.nfts.clone())
    }

    fn name(&self) -> &str {
        "fake-wallet"
    }
}

#[async_trait]
impl PriceProvider for FakeWallet {
    async fn prices_usd(&self, contracts: &[Address]) -> Result<HashMap<Address, Decimal>> {
        self.check("prices")?;
        Ok(self
            .tokens
            .iter()
            .filter(|t| contracts.contains(&t.contract))
            .filter_map(|t| t.price.map(|p| (t.contract, p)))
            .collect())
    }

    async fn native_price_usd(&self) -> Result<Option<Decimal>> {
        self.check("prices")?;
        Ok(self.native_price)
    }

    fn name(&self) -> &str {
        "fake-wallet"
    }
}

pub fn token(contract: u64, symbol: &str, name: &str, units: u64, price: Option<Decimal>) -> FakeToken {
    FakeToken {
        contract: addr(contract),
        raw_balance: U256::exp10(18) * units,
        metadata: TokenMetadata {
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            decimals: Some(18),
            logo: Some(format!("https://logos.example/{symbol}.png")),
        },
        price,
    }
}

pub fn nft(contract: u64, token_id: u64, standard: NftStandard, amount: u64, collection: &str) -> NftHolding {
    NftHolding {
        contract: addr(contract),
        token_id: U256::from(token_id),
        standard,
        amount: U256::from(amount),
        name: format!("{collection} #{token_id}"),
        collection_name: collection.to_string(),
        image: Some(format!("ipfs://{collection}/{token_id}.png")),
        floor_price_eth: None,
        floor_price_usd: None,
        provider_spam: false,
        provider_spam_reasons: Vec::new(),
    }
}

/// A wallet with two legitimate holdings and three obvious spam items.
pub fn cluttered_wallet() -> FakeWallet {
    let mut flagged = nft(21, 1, NftStandard::Erc1155, 50, "Voucher Drop");
    flagged.provider_spam = true;
    flagged.image = None;

    let mut punk = nft(20, 42, NftStandard::Erc721, 1, "Based Punks");
    punk.floor_price_eth = Some(Decimal::new(2, 1));

    FakeWallet {
        tokens: vec![
            token(1, "AERO", "Aerodrome", 120, Some(Decimal::new(125, 2))),
            token(2, "USDC", "Claim rewards at usdc-bonus.xyz", 1_000_000, None),
            token(3, "FREE", "Free Airdrop", 5_000, None),
        ],
        nfts: vec![punk, flagged],
        native_price: Some(Decimal::from(3000)),
        failing: Vec::new(),
    }
}
