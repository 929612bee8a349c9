//! Per-tenant document codes and lot receipt numbers.
//!
//! Counters live in the store and are drawn inside the caller's transaction,
//! so a code is consumed only when the document that carries it commits.

use crate::store::{StoreError, StoreTx};

/// Counters kept per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    PurchaseOrder,
    PurchaseLine,
    SaleOrder,
    SaleLine,
    Transfer,
    /// FIFO ordering key for received lots. Not rendered as a code.
    LotReceipt,
}

impl SequenceKind {
    /// Counter name in the store.
    pub fn name(self) -> &'static str {
        match self {
            SequenceKind::PurchaseOrder => "purchase_order",
            SequenceKind::PurchaseLine => "purchase_line",
            SequenceKind::SaleOrder => "sale_order",
            SequenceKind::SaleLine => "sale_line",
            SequenceKind::Transfer => "transfer",
            SequenceKind::LotReceipt => "lot_receipt",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            SequenceKind::PurchaseOrder => "PO",
            SequenceKind::PurchaseLine => "POL",
            SequenceKind::SaleOrder => "SO",
            SequenceKind::SaleLine => "SOL",
            SequenceKind::Transfer => "TR",
            SequenceKind::LotReceipt => "LOT",
        }
    }
}

/// `PO` + 7 at width 6 renders `PO-000007`. Wider numbers are never truncated.
pub fn format_code(prefix: &str, value: u64, width: usize) -> String {
    format!("{prefix}-{value:0width$}")
}

/// Draw the next code of `kind` for the transaction's tenant.
pub async fn next_code<T: StoreTx>(
    tx: &mut T,
    kind: SequenceKind,
    width: usize,
) -> Result<String, StoreError> {
    let value = tx.next_sequence(kind.name()).await?;
    Ok(format_code(kind.prefix(), value, width))
}

/// Draw the next lot receipt number.
pub async fn next_receipt_no<T: StoreTx>(tx: &mut T) -> Result<u64, StoreError> {
    tx.next_sequence(SequenceKind::LotReceipt.name()).await
}
