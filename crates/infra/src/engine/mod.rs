//! Order–inventory reconciliation engine.
//!
//! The engine is the application layer over the pure domain crates. Every
//! public operation follows the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Begin a store transaction bound to the command's tenant
//!   ↓
//! 2. Load the documents the operation touches
//!   ↓
//! 3. Apply domain rules (status transitions, counters, FIFO plans)
//!   ↓
//! 4. Write every changed document back
//!   ↓
//! 5. Commit, or roll back on any error
//! ```
//!
//! ## Atomicity
//!
//! Order totals, line subtotals, product stock and lot/serial state change
//! together or not at all. A failed validation anywhere in an operation rolls
//! back every write made before it.
//!
//! ## Concurrency
//!
//! Conflicting transactions fail with [`EngineError::Concurrency`]. The engine
//! re-runs the whole operation under [`crate::retry::RetryPolicy`] and only
//! surfaces the conflict once retries are exhausted. Re-running from scratch
//! means a retried operation sees the winner's writes: two racing
//! `add_purchase_line` calls for the same product end with one line and one
//! `Conflict`.

mod audit;
mod catalog;
mod ledger;
mod outcome;
mod purchasing;
mod sales;
mod serials;
mod transfers;

pub use audit::{AuditReport, Finding};
pub use outcome::{
    LineChange, LineView, OrderOutcome, OrderView, PurchaseOutcome, PurchaseView, SaleOutcome,
    SaleView, StockDelta, TransferView,
};
pub use serials::{AssignPurchaseSerial, AssignSaleSerial};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::store::{Store, StoreTx};

/// Run `$body` inside a fresh transaction for `$tenant`, retrying on conflict.
///
/// `$body` evaluates to the operation's value and may use `?`; it must not
/// move captured state since it can run more than once.
macro_rules! in_transaction {
    ($engine:expr, $tenant:expr, |$tx:ident| $body:block) => {{
        let mut attempt: u32 = 0;
        let seed = $crate::retry::jitter_seed();
        loop {
            let mut $tx = $crate::store::Store::begin(&$engine.store, $tenant).await?;
            let result = async {
                let value = $body;
                Ok::<_, $crate::error::EngineError>(value)
            }
            .await;
            match $crate::engine::settle($tx, result).await {
                Err($crate::error::EngineError::Concurrency(reason))
                    if $engine.config.retry.should_retry(attempt) =>
                {
                    attempt += 1;
                    let delay = $engine.config.retry.delay_for_attempt(attempt, seed);
                    tracing::warn!(attempt, ?delay, %reason, "transaction conflict, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use in_transaction;

/// Reconciliation engine over a [`Store`].
#[derive(Debug, Clone)]
pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Commit on success, roll back on failure.
pub(crate) async fn settle<T: StoreTx, V>(
    tx: T,
    result: Result<V, EngineError>,
) -> Result<V, EngineError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}
