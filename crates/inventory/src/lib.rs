//! Inventory ledgers.
//!
//! Bulk stock lives in FIFO lots, serialized stock in one record per
//! physical unit. Everything here is deterministic domain logic; loading and
//! persisting lots and units is the engine's job.

pub mod fifo;
pub mod lot;
pub mod serial;

pub use fifo::{LotAllocation, plan_fifo, total_available};
pub use lot::{BulkLot, LotEvent, LotOrigin, LotStatus, NewLot};
pub use serial::{
    NewSerial, SerialEvent, SerialHold, SerialStatus, SerialUnit, ensure_distinct,
    normalize_serial,
};
