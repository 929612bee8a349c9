//! Sales domain module (sale orders and their lines).
//!
//! Pure business rules: status transitions, line validation, total
//! recomputation and the lot allocations recorded when a sale is approved.

pub mod line;
pub mod order;

pub use line::{AddSaleLine, NewSaleLine, SaleLine, UpdateSaleLine};
pub use order::{CreateSaleOrder, SaleOrder, SaleOrderEvent, SaleOrderStatus};
