//! Transaction submission.
//!
//! `TransactionSender` is the seam between the orchestrator and a real
//! chain; `EthersSender` implements it with a local signing key over
//! JSON-RPC. `Approver` lets the caller veto individual items before
//! they are signed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::middleware::{Middleware, SignerMiddleware};
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockNumber, TransactionRequest, H256, U256, U64};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BurnCall, BurnItem};
use crate::types::BaseCleanError;

/// How often to poll for a receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Mined result of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    pub success: bool,
    pub gas_used: Option<U256>,
    pub block_number: Option<u64>,
}

/// Anything that can sign and submit burn transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// The holder whose assets are being burned.
    fn sender_address(&self) -> Address;

    /// Sign and broadcast. Returns once the node accepted the transaction.
    async fn send(&self, call: &BurnCall) -> Result<H256>;

    /// Wait until the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome>;
}

/// Per-item veto before signing.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, item: &BurnItem) -> bool;
}

/// Approves everything (the user confirmed the whole flow up front).
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _item: &BurnItem) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Ethers implementation
// ---------------------------------------------------------------------------

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Signs with a local key and submits over HTTP JSON-RPC.
///
/// Nonces are tracked locally so that a whole batch can be broadcast
/// before any of it is mined. A failed send forces a refetch.
pub struct EthersSender {
    client: SignerClient,
    address: Address,
    next_nonce: Mutex<Option<U256>>,
    receipt_timeout: Duration,
}

impl EthersSender {
    pub fn new(
        rpc_url: &str,
        private_key: &SecretString,
        chain_id: u64,
        receipt_timeout_secs: u64,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| BaseCleanError::Config(format!("Failed to create provider: {e}")))?;

        let wallet = private_key
            .expose_secret()
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| BaseCleanError::Signer(format!("Invalid private key: {e}")))?
            .with_chain_id(chain_id);

        let address = wallet.address();
        info!(address = ?address, chain_id, "Signer ready");

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            address,
            next_nonce: Mutex::new(None),
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
        })
    }

    async fn lookup_receipt(&self, tx_hash: H256) -> Result<Option<ReceiptOutcome>> {
        let receipt = self
            .client
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| anyhow!("Receipt lookup failed: {e}"))?;

        Ok(receipt.map(|r| ReceiptOutcome {
            success: r.status == Some(U64::from(1)),
            gas_used: r.gas_used,
            block_number: r.block_number.map(|b| b.as_u64()),
        }))
    }
}

/// Poll until a receipt shows up. Lookup errors are logged and retried;
/// the caller bounds the wait with a timeout.
async fn poll_until_mined<F, Fut>(tx_hash: H256, interval: Duration, mut lookup: F) -> ReceiptOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ReceiptOutcome>>>,
{
    loop {
        match lookup().await {
            Ok(Some(receipt)) => return receipt,
            Ok(None) => {}
            Err(e) => warn!(tx_hash = ?tx_hash, error = %e, "Receipt lookup failed, still waiting"),
        }
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl TransactionSender for EthersSender {
    fn sender_address(&self) -> Address {
        self.address
    }

    async fn send(&self, call: &BurnCall) -> Result<H256> {
        let mut next_nonce = self.next_nonce.lock().await;

        let nonce = match *next_nonce {
            Some(n) => n,
            None => self
                .client
                .get_transaction_count(self.address, Some(BlockNumber::Pending.into()))
                .await
                .map_err(|e| anyhow!("Nonce lookup failed: {e}"))?,
        };

        let tx = TransactionRequest::new()
            .from(self.address)
            .to(call.to)
            .data(call.data.clone())
            .nonce(nonce);

        match self.client.send_transaction(tx, None).await {
            Ok(pending) => {
                let hash = pending.tx_hash();
                *next_nonce = Some(nonce + 1);
                debug!(tx_hash = ?hash, nonce = %nonce, to = ?call.to, "Transaction broadcast");
                Ok(hash)
            }
            Err(e) => {
                *next_nonce = None;
                Err(anyhow!("{e}"))
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<ReceiptOutcome> {
        let polling = poll_until_mined(tx_hash, RECEIPT_POLL_INTERVAL, || self.lookup_receipt(tx_hash));
        tokio::time::timeout(self.receipt_timeout, polling)
            .await
            .with_context(|| {
                format!(
                    "Receipt wait timed out after {}s for {tx_hash:?}",
                    self.receipt_timeout.as_secs()
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
