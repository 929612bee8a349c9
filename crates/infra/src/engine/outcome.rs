//! Structured results returned by engine operations.

use serde::Serialize;

use stockbook_core::ProductId;
use stockbook_products::StockType;
use stockbook_purchasing::{PurchaseLine, PurchaseOrder};
use stockbook_sales::{SaleLine, SaleOrder};
use stockbook_transfers::{Transfer, TransferLine};

/// Change of one product's aggregate stock caused by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockDelta {
    pub product_id: ProductId,
    pub before: i64,
    pub after: i64,
}

impl StockDelta {
    pub fn change(&self) -> i64 {
        self.after - self.before
    }
}

/// Result of approving or deleting an order.
///
/// On deletion `order` and `lines` hold the records as they were just before
/// they were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderOutcome<O, L> {
    pub order: O,
    pub lines: Vec<L>,
    pub stock: Vec<StockDelta>,
}

impl<O, L> OrderOutcome<O, L> {
    /// Stock change recorded for `product_id`, zero if untouched.
    pub fn stock_change(&self, product_id: ProductId) -> i64 {
        self.stock
            .iter()
            .filter(|delta| delta.product_id == product_id)
            .map(StockDelta::change)
            .sum()
    }
}

pub type PurchaseOutcome = OrderOutcome<PurchaseOrder, PurchaseLine>;
pub type SaleOutcome = OrderOutcome<SaleOrder, SaleLine>;

/// Result of a line edit: the line and its order with the resummed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange<O, L> {
    pub order: O,
    pub line: L,
}

/// A line together with its product's stock type and assigned serials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineView<L> {
    pub line: L,
    pub stock_type: StockType,
    pub serials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView<O, L> {
    pub order: O,
    pub lines: Vec<LineView<L>>,
}

pub type PurchaseView = OrderView<PurchaseOrder, PurchaseLine>;
pub type SaleView = OrderView<SaleOrder, SaleLine>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferView {
    pub transfer: Transfer,
    pub lines: Vec<TransferLine>,
}
