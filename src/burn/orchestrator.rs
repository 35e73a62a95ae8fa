//! Burn orchestration.
//!
//! Walks the items of a [`BurnFlowContext`] in batches. Within a batch,
//! approved items are signed and broadcast one after another (nonce
//! order), then the batch's receipts are awaited together. A shared
//! cancellation flag is checked before every item and again once the
//! approver answers; once it is set, every item not yet broadcast ends as
//! `Cancelled`. Items already broadcast are still followed to their receipt.

use chrono::Utc;
use ethers::types::H256;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::failure::{categorize, BurnFailure};
use super::sender::{Approver, TransactionSender};
use super::{BurnFlowContext, BurnOutcome, BurnStatus, BurnSummary};
use crate::config::BurnConfig;

/// Cloneable handle for cancelling a running burn.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BurnEvent {
    Started { total: usize, batches: usize },
    BatchStarted { batch: usize, items: usize },
    ItemSubmitted { index: usize, tx_hash: H256 },
    ItemFinished { index: usize, status: BurnStatus },
    Finished { succeeded: usize, failed: usize, rejected: usize, cancelled: usize },
}

pub struct BurnOrchestrator {
    sender: Arc<dyn TransactionSender>,
    approver: Arc<dyn Approver>,
    batch_size: usize,
    delay_between_batches: Duration,
    dry_run: bool,
    cancel: CancelHandle,
    events: Option<UnboundedSender<BurnEvent>>,
}

impl BurnOrchestrator {
    pub fn new(
        sender: Arc<dyn TransactionSender>,
        approver: Arc<dyn Approver>,
        config: &BurnConfig,
    ) -> Self {
        Self {
            sender,
            approver,
            batch_size: config.batch_size.max(1),
            delay_between_batches: Duration::from_millis(config.delay_between_batches_ms),
            dry_run: config.dry_run,
            cancel: CancelHandle::new(),
            events: None,
        }
    }

    /// Stream progress events to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<BurnEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn emit(&self, event: BurnEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn finish_item(&self, outcome: &mut BurnOutcome, status: BurnStatus) {
        outcome.status = status;
        self.emit(BurnEvent::ItemFinished {
            index: outcome.index,
            status,
        });
    }

    /// Run every item of `ctx` and summarise the results.
    pub async fn execute(&self, ctx: &BurnFlowContext) -> BurnSummary {
        let started_at = Utc::now();
        let total = ctx.items.len();
        let batches = total.div_ceil(self.batch_size);

        let mut outcomes: Vec<BurnOutcome> = ctx.items.iter().map(BurnOutcome::pending).collect();

        info!(total, batches, dry_run = self.dry_run, "Starting burn");
        self.emit(BurnEvent::Started { total, batches });

        for (batch_no, chunk) in ctx.items.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.emit(BurnEvent::BatchStarted {
                batch: batch_no,
                items: chunk.len(),
            });

            let mut submitted: Vec<(usize, H256)> = Vec::new();

            for item in chunk {
                let outcome = &mut outcomes[item.index];

                if self.cancel.is_cancelled() {
                    self.finish_item(outcome, BurnStatus::Cancelled);
                    continue;
                }

                if self.dry_run {
                    info!(item = %item.label, to = ?item.call.to, kind = ?item.call.kind, "[DRY RUN] Would burn");
                    self.finish_item(outcome, BurnStatus::Simulated);
                    continue;
                }

                let approved = self.approver.approve(item).await;
                if self.cancel.is_cancelled() {
                    self.finish_item(outcome, BurnStatus::Cancelled);
                    continue;
                }
                if !approved {
                    info!(item = %item.label, "Burn rejected by user");
                    self.finish_item(outcome, BurnStatus::UserRejected);
                    continue;
                }

                match self.sender.send(&item.call).await {
                    Ok(tx_hash) => {
                        debug!(item = %item.label, tx_hash = ?tx_hash, "Burn submitted");
                        outcome.status = BurnStatus::Submitted;
                        outcome.tx_hash = Some(tx_hash);
                        self.emit(BurnEvent::ItemSubmitted {
                            index: item.index,
                            tx_hash,
                        });
                        submitted.push((item.index, tx_hash));
                    }
                    Err(e) => {
                        let message = e.to_string();
                        let status = match categorize(&message) {
                            BurnFailure::UserRejected => BurnStatus::UserRejected,
                            other => BurnStatus::Failed(other),
                        };
                        warn!(item = %item.label, error = %message, status = %status, "Burn submission failed");
                        outcome.error = Some(message);
                        self.finish_item(outcome, status);
                    }
                }
            }

            let receipts = join_all(submitted.iter().map(|(index, hash)| {
                let sender = Arc::clone(&self.sender);
                let (index, hash) = (*index, *hash);
                async move { (index, sender.wait_for_receipt(hash).await) }
            }))
            .await;

            for (index, result) in receipts {
                let outcome = &mut outcomes[index];
                let status = match result {
                    Ok(receipt) => {
                        outcome.gas_used = receipt.gas_used;
                        if receipt.success {
                            BurnStatus::Success
                        } else {
                            outcome.error = Some("transaction reverted on-chain".to_string());
                            BurnStatus::Failed(BurnFailure::Reverted)
                        }
                    }
                    Err(e) => {
                        let message = e.to_string();
                        let failure = categorize(&message);
                        outcome.error = Some(message);
                        BurnStatus::Failed(failure)
                    }
                };
                debug!(index, status = %status, "Burn finished");
                self.finish_item(outcome, status);
            }

            let is_last = batch_no + 1 == batches;
            if !is_last && !self.dry_run && !self.delay_between_batches.is_zero() {
                tokio::time::sleep(self.delay_between_batches).await;
            }
        }

        // Anything never reached (cancelled between batches) is cancelled.
        for outcome in outcomes.iter_mut().filter(|o| !o.status.is_terminal()) {
            self.finish_item(outcome, BurnStatus::Cancelled);
        }

        let summary = BurnSummary::from_outcomes(ctx.owner, outcomes, started_at);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            rejected = summary.rejected,
            cancelled = summary.cancelled,
            value = format!("${:.2}", summary.value_burned_usd),
            "Burn complete"
        );
        self.emit(BurnEvent::Finished {
            succeeded: summary.succeeded,
            failed: summary.failed,
            rejected: summary.rejected,
            cancelled: summary.cancelled,
        });

        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
