use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, LotId, ProductId, PurchaseLineId, TenantId, TransferLineId,
    WarehouseId,
};

/// Bulk lot status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// Created with a draft purchase line or an open transfer; not yet stock.
    Draft,
    Available,
}

/// Events that move a lot between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotEvent {
    /// Parent purchase approved, or the transfer that created it completed.
    Receipted,
}

impl LotStatus {
    pub fn transition(self, event: LotEvent) -> DomainResult<LotStatus> {
        match (self, event) {
            (LotStatus::Draft, LotEvent::Receipted) => Ok(LotStatus::Available),
            (LotStatus::Available, LotEvent::Receipted) => {
                Err(DomainError::invalid_state("lot is already receipted"))
            }
        }
    }
}

/// Where a lot's units came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "line_id", rename_all = "snake_case")]
pub enum LotOrigin {
    Purchase(PurchaseLineId),
    Transfer(TransferLineId),
}

/// Input for [`BulkLot::open`].
#[derive(Debug, Clone)]
pub struct NewLot {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub origin: LotOrigin,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// A FIFO-orderable batch of non-serialized stock at one warehouse.
///
/// `available` is derived as `quantity - reserved - sold` and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLot {
    id: LotId,
    tenant_id: TenantId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    origin: LotOrigin,
    /// FIFO ordering key, issued by the sequence generator on receipt.
    receipt_no: Option<u64>,
    quantity: i64,
    reserved: i64,
    sold: i64,
    status: LotStatus,
    created_at: DateTime<Utc>,
}

impl BulkLot {
    /// Open a new draft lot.
    pub fn open(new: NewLot) -> DomainResult<Self> {
        if new.quantity <= 0 {
            return Err(DomainError::validation("lot quantity must be positive"));
        }
        Ok(Self {
            id: LotId::new(),
            tenant_id: new.tenant_id,
            product_id: new.product_id,
            warehouse_id: new.warehouse_id,
            origin: new.origin,
            receipt_no: None,
            quantity: new.quantity,
            reserved: 0,
            sold: 0,
            status: LotStatus::Draft,
            created_at: new.created_at,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn origin(&self) -> LotOrigin {
        self.origin
    }

    pub fn receipt_no(&self) -> Option<u64> {
        self.receipt_no
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn sold(&self) -> i64 {
        self.sold
    }

    pub fn status(&self) -> LotStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn available(&self) -> i64 {
        self.quantity - self.reserved - self.sold
    }

    /// Units that still count toward the product's aggregate stock.
    pub fn on_hand(&self) -> i64 {
        match self.status {
            LotStatus::Draft => 0,
            LotStatus::Available => self.quantity - self.sold,
        }
    }

    /// True when nothing has been reserved or sold from this lot.
    pub fn is_untouched(&self) -> bool {
        self.reserved == 0 && self.sold == 0
    }

    /// Change the size of a draft lot to follow its purchase line.
    pub fn resize(&mut self, quantity: i64) -> DomainResult<()> {
        if self.status != LotStatus::Draft {
            return Err(DomainError::invalid_state("only draft lots can be resized"));
        }
        if quantity <= 0 {
            return Err(DomainError::validation("lot quantity must be positive"));
        }
        if quantity < self.reserved + self.sold {
            return Err(DomainError::invalid_state(
                "lot cannot shrink below its reserved and sold units",
            ));
        }
        self.quantity = quantity;
        Ok(())
    }

    /// The lot becomes stock. `receipt_no` records the order in which lots
    /// entered stock.
    pub fn receipt(&mut self, receipt_no: u64) -> DomainResult<()> {
        self.status = self.status.transition(LotEvent::Receipted)?;
        self.receipt_no = Some(receipt_no);
        Ok(())
    }

    /// Move `n` units from available into reserved.
    pub fn reserve(&mut self, n: i64) -> DomainResult<()> {
        self.ensure_movable(n, self.available(), "reserve")?;
        self.reserved = counted(self.reserved, n)?;
        Ok(())
    }

    /// Return `n` reserved units to available.
    pub fn release(&mut self, n: i64) -> DomainResult<()> {
        self.ensure_movable(n, self.reserved, "release")?;
        self.reserved -= n;
        Ok(())
    }

    /// Move `n` units from available into sold.
    pub fn sell(&mut self, n: i64) -> DomainResult<()> {
        self.ensure_movable(n, self.available(), "sell")?;
        self.sold = counted(self.sold, n)?;
        Ok(())
    }

    /// Undo a sale of `n` units.
    pub fn unsell(&mut self, n: i64) -> DomainResult<()> {
        self.ensure_movable(n, self.sold, "unsell")?;
        self.sold -= n;
        Ok(())
    }

    /// Reserved units physically leave the lot (transfer completed).
    pub fn ship(&mut self, n: i64) -> DomainResult<()> {
        self.ensure_movable(n, self.reserved, "ship")?;
        self.reserved -= n;
        self.quantity -= n;
        Ok(())
    }

    fn ensure_movable(&self, n: i64, limit: i64, action: &str) -> DomainResult<()> {
        if self.status != LotStatus::Available {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} units of a lot that is not receipted"
            )));
        }
        if n <= 0 {
            return Err(DomainError::validation(format!("{action} quantity must be positive")));
        }
        if n > limit {
            return Err(DomainError::insufficient_stock(
                format!("lot {}", self.id),
                n,
                limit,
            ));
        }
        Ok(())
    }
}

fn counted(counter: i64, n: i64) -> DomainResult<i64> {
    counter
        .checked_add(n)
        .ok_or_else(|| DomainError::validation("lot counter out of range"))
}

impl Entity for BulkLot {
    type Id = LotId;

    fn id(&self) -> LotId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(quantity: i64) -> BulkLot {
        BulkLot::open(NewLot {
            tenant_id: TenantId::new(),
            product_id: ProductId::new(),
            warehouse_id: WarehouseId::new(),
            origin: LotOrigin::Purchase(PurchaseLineId::new()),
            quantity,
            created_at: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn open_starts_as_draft_with_everything_available() {
        let lot = lot(10);
        assert_eq!(lot.status(), LotStatus::Draft);
        assert_eq!(lot.available(), 10);
        assert_eq!(lot.on_hand(), 0);
        assert!(lot.is_untouched());
    }

    #[test]
    fn counters_hold_at_the_integer_limit() {
        let mut lot = lot(i64::MAX);
        lot.receipt(1).unwrap();
        lot.reserve(i64::MAX).unwrap();
        assert_eq!(lot.available(), 0);
        assert!(matches!(lot.sell(1), Err(DomainError::InsufficientStock { .. })));
        lot.release(i64::MAX).unwrap();
        lot.sell(i64::MAX).unwrap();
        assert_eq!(lot.on_hand(), 0);
    }

    #[test]
    fn open_rejects_non_positive_quantity() {
        let err = BulkLot::open(NewLot {
            tenant_id: TenantId::new(),
            product_id: ProductId::new(),
            warehouse_id: WarehouseId::new(),
            origin: LotOrigin::Purchase(PurchaseLineId::new()),
            quantity: 0,
            created_at: Utc::now(),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draft_lots_cannot_move_units() {
        let mut lot = lot(10);
        assert!(matches!(lot.reserve(1), Err(DomainError::InvalidState(_))));
        assert!(matches!(lot.sell(1), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn receipt_only_once() {
        let mut lot = lot(10);
        lot.receipt(1).unwrap();
        assert_eq!(lot.status(), LotStatus::Available);
        assert_eq!(lot.receipt_no(), Some(1));
        assert_eq!(lot.on_hand(), 10);
        assert!(matches!(lot.receipt(2), Err(DomainError::InvalidState(_))));
        assert_eq!(lot.receipt_no(), Some(1));
    }

    #[test]
    fn resize_only_while_draft() {
        let mut lot = lot(10);
        lot.resize(4).unwrap();
        assert_eq!(lot.quantity(), 4);
        lot.receipt(1).unwrap();
        assert!(matches!(lot.resize(6), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn reserve_sell_and_ship_keep_counters_consistent() {
        let mut lot = lot(10);
        lot.receipt(1).unwrap();
        lot.reserve(3).unwrap();
        lot.sell(4).unwrap();
        assert_eq!(lot.available(), 3);
        assert_eq!(lot.on_hand(), 6);

        lot.ship(2).unwrap();
        assert_eq!(lot.quantity(), 8);
        assert_eq!(lot.reserved(), 1);
        assert_eq!(lot.available(), 3);

        lot.release(1).unwrap();
        lot.unsell(4).unwrap();
        assert!(lot.is_untouched());
        assert_eq!(lot.available(), 8);
    }

    #[test]
    fn over_reserve_reports_available() {
        let mut lot = lot(5);
        lot.receipt(1).unwrap();
        let err = lot.reserve(6).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(format!("lot {}", lot.id()), 6, 5));
        assert_eq!(lot.reserved(), 0);
    }
}
