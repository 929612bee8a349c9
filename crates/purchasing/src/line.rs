use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, Money, ProductId, PurchaseLineId, PurchaseOrderId,
    TenantId, WarehouseId,
};
use stockbook_products::StockType;

/// Command: AddPurchaseLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPurchaseLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub warehouse_id: Option<WarehouseId>,
}

/// Command: UpdatePurchaseLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePurchaseLine {
    pub tenant_id: TenantId,
    pub line_id: PurchaseLineId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Input for [`PurchaseLine::new`], resolved against the product.
#[derive(Debug, Clone)]
pub struct NewPurchaseLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub product_id: ProductId,
    pub stock_type: StockType,
    pub warehouse_id: Option<WarehouseId>,
    pub unit_price: Money,
    pub quantity: i64,
}

/// One product on a purchase order.
///
/// `stock_type` is captured from the product when the line is created; the
/// product's type cannot change while the line exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    id: PurchaseLineId,
    tenant_id: TenantId,
    order_id: PurchaseOrderId,
    code: String,
    product_id: ProductId,
    stock_type: StockType,
    warehouse_id: Option<WarehouseId>,
    unit_price: Money,
    quantity: i64,
    serials_assigned: i64,
    subtotal: Money,
}

impl PurchaseLine {
    pub fn new(new: NewPurchaseLine) -> DomainResult<Self> {
        validate_amounts(new.quantity, new.unit_price)?;
        if new.stock_type == StockType::Bulk && new.warehouse_id.is_none() {
            return Err(DomainError::validation("bulk products require a warehouse"));
        }
        let subtotal = new.unit_price.times(new.quantity)?;

        Ok(Self {
            id: PurchaseLineId::new(),
            tenant_id: new.tenant_id,
            order_id: new.order_id,
            code: new.code,
            product_id: new.product_id,
            stock_type: new.stock_type,
            warehouse_id: new.warehouse_id,
            unit_price: new.unit_price,
            quantity: new.quantity,
            serials_assigned: 0,
            subtotal,
        })
    }

    pub fn order_id(&self) -> PurchaseOrderId {
        self.order_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn stock_type(&self) -> StockType {
        self.stock_type
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn serials_assigned(&self) -> i64 {
        self.serials_assigned
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn is_serialized(&self) -> bool {
        self.stock_type == StockType::Serialized
    }

    /// Bulk lines are always complete; serialized lines once every unit has a serial.
    pub fn is_complete(&self) -> bool {
        !self.is_serialized() || self.serials_assigned == self.quantity
    }

    /// Change quantity and price, recomputing the subtotal.
    pub fn update(&mut self, quantity: i64, unit_price: Money) -> DomainResult<()> {
        validate_amounts(quantity, unit_price)?;
        if quantity < self.serials_assigned {
            return Err(DomainError::invalid_state(format!(
                "line {} already has {} serials assigned",
                self.code, self.serials_assigned
            )));
        }
        let subtotal = unit_price.times(quantity)?;
        self.quantity = quantity;
        self.unit_price = unit_price;
        self.subtotal = subtotal;
        Ok(())
    }

    pub fn assign_serial(&mut self) -> DomainResult<()> {
        if !self.is_serialized() {
            return Err(DomainError::validation(format!(
                "line {} is for a bulk product",
                self.code
            )));
        }
        if self.serials_assigned >= self.quantity {
            return Err(DomainError::invalid_state(format!(
                "line {} already has all {} serials",
                self.code, self.quantity
            )));
        }
        self.serials_assigned += 1;
        Ok(())
    }

    pub fn unassign_serial(&mut self) -> DomainResult<()> {
        if self.serials_assigned == 0 {
            return Err(DomainError::invalid_state(format!(
                "line {} has no serials assigned",
                self.code
            )));
        }
        self.serials_assigned -= 1;
        Ok(())
    }
}

impl Entity for PurchaseLine {
    type Id = PurchaseLineId;

    fn id(&self) -> PurchaseLineId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

fn validate_amounts(quantity: i64, unit_price: Money) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    if !unit_price.is_positive() {
        return Err(DomainError::validation("unit price must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_line(stock_type: StockType, warehouse: Option<WarehouseId>) -> NewPurchaseLine {
        NewPurchaseLine {
            tenant_id: TenantId::new(),
            order_id: PurchaseOrderId::new(),
            code: "POL-000001".to_string(),
            product_id: ProductId::new(),
            stock_type,
            warehouse_id: warehouse,
            unit_price: Money::new(dec!(10.00)),
            quantity: 3,
        }
    }

    #[test]
    fn subtotal_is_rounded_product() {
        let mut new = new_line(StockType::Bulk, Some(WarehouseId::new()));
        new.unit_price = Money::new(dec!(3.33));
        let line = PurchaseLine::new(new).unwrap();
        assert_eq!(line.subtotal(), Money::new(dec!(9.99)));
    }

    #[test]
    fn bulk_line_requires_warehouse() {
        let err = PurchaseLine::new(new_line(StockType::Bulk, None)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        PurchaseLine::new(new_line(StockType::Serialized, None)).unwrap();
    }

    #[test]
    fn rejects_non_positive_quantity_and_price() {
        let mut new = new_line(StockType::Bulk, Some(WarehouseId::new()));
        new.quantity = 0;
        assert!(PurchaseLine::new(new).is_err());

        let mut new = new_line(StockType::Bulk, Some(WarehouseId::new()));
        new.unit_price = Money::ZERO;
        assert!(PurchaseLine::new(new).is_err());
    }

    #[test]
    fn subtotal_overflow_is_rejected() {
        let mut new = new_line(StockType::Bulk, Some(WarehouseId::new()));
        new.quantity = i64::MAX;
        new.unit_price = Money::new(dec!(10000000000));
        assert!(matches!(PurchaseLine::new(new), Err(DomainError::Validation(_))));

        let mut line = PurchaseLine::new(new_line(StockType::Bulk, Some(WarehouseId::new()))).unwrap();
        let err = line.update(i64::MAX, Money::new(dec!(10000000000))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(line.quantity(), 3);
        assert_eq!(line.subtotal(), Money::new(dec!(30.00)));
    }

    #[test]
    fn update_cannot_drop_below_assigned_serials() {
        let mut line = PurchaseLine::new(new_line(StockType::Serialized, None)).unwrap();
        line.assign_serial().unwrap();
        line.assign_serial().unwrap();
        let err = line.update(1, Money::new(dec!(10))).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(line.quantity(), 3);

        line.update(2, Money::new(dec!(7.5))).unwrap();
        assert_eq!(line.subtotal(), Money::new(dec!(15.00)));
        assert!(line.is_complete());
    }

    #[test]
    fn serial_assignment_is_bounded_by_quantity() {
        let mut line = PurchaseLine::new(new_line(StockType::Serialized, None)).unwrap();
        for _ in 0..3 {
            line.assign_serial().unwrap();
        }
        assert!(matches!(line.assign_serial(), Err(DomainError::InvalidState(_))));
        line.unassign_serial().unwrap();
        assert_eq!(line.serials_assigned(), 2);
        assert!(!line.is_complete());
    }

    #[test]
    fn bulk_lines_take_no_serials() {
        let mut line = PurchaseLine::new(new_line(StockType::Bulk, Some(WarehouseId::new()))).unwrap();
        assert!(matches!(line.assign_serial(), Err(DomainError::Validation(_))));
        assert!(line.is_complete());
    }
}
