//! Purchasing domain module (purchase orders and their lines).
//!
//! Pure business rules: status transitions, line validation and total
//! recomputation. Stock side effects are orchestrated by the engine.

pub mod line;
pub mod order;

pub use line::{AddPurchaseLine, NewPurchaseLine, PurchaseLine, UpdatePurchaseLine};
pub use order::{CreatePurchaseOrder, PurchaseOrder, PurchaseOrderEvent, PurchaseOrderStatus};
