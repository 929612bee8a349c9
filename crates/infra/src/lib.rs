//! Infrastructure layer: stores, sequences, configuration and the
//! reconciliation engine that ties the domain crates together.

pub mod config;
pub mod documents;
pub mod engine;
pub mod error;
pub mod retry;
pub mod sequence;
pub mod store;

pub use config::{ConfigError, EngineConfig, StoreConfig};
pub use engine::{
    AssignPurchaseSerial, AssignSaleSerial, AuditReport, Engine, Finding, LineChange, LineView,
    OrderOutcome, OrderView, PurchaseOutcome, PurchaseView, SaleOutcome, SaleView, StockDelta,
    TransferView,
};
pub use error::{EngineError, ErrorKind};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
