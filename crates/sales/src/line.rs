use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, Money, ProductId, SaleLineId, SaleOrderId, TenantId,
    WarehouseId,
};
use stockbook_inventory::LotAllocation;
use stockbook_products::StockType;

/// Command: AddSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSaleLine {
    pub tenant_id: TenantId,
    pub order_id: SaleOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub warehouse_id: Option<WarehouseId>,
}

/// Command: UpdateSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSaleLine {
    pub tenant_id: TenantId,
    pub line_id: SaleLineId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Input for [`SaleLine::new`], resolved against the product.
#[derive(Debug, Clone)]
pub struct NewSaleLine {
    pub tenant_id: TenantId,
    pub order_id: SaleOrderId,
    pub code: String,
    pub product_id: ProductId,
    pub stock_type: StockType,
    pub warehouse_id: Option<WarehouseId>,
    pub unit_price: Money,
    pub quantity: i64,
}

/// One product on a sale order.
///
/// Bulk lines remember which lots they were sold from so deleting an approved
/// sale puts the units back exactly where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    id: SaleLineId,
    tenant_id: TenantId,
    order_id: SaleOrderId,
    code: String,
    product_id: ProductId,
    stock_type: StockType,
    warehouse_id: Option<WarehouseId>,
    unit_price: Money,
    quantity: i64,
    serials_assigned: i64,
    subtotal: Money,
    #[serde(default)]
    allocations: Vec<LotAllocation>,
}

impl SaleLine {
    pub fn new(new: NewSaleLine) -> DomainResult<Self> {
        validate_amounts(new.quantity, new.unit_price)?;
        if new.stock_type == StockType::Bulk && new.warehouse_id.is_none() {
            return Err(DomainError::validation("bulk products require a warehouse"));
        }
        let subtotal = new.unit_price.times(new.quantity)?;

        Ok(Self {
            id: SaleLineId::new(),
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
            allocations: Vec::new(),
        })
    }

    pub fn order_id(&self) -> SaleOrderId {
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

    pub fn allocations(&self) -> &[LotAllocation] {
        &self.allocations
    }

    pub fn is_serialized(&self) -> bool {
        self.stock_type == StockType::Serialized
    }

    pub fn is_complete(&self) -> bool {
        !self.is_serialized() || self.serials_assigned == self.quantity
    }

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

    /// Fail while serials are still reserved to this line.
    pub fn ensure_removable(&self) -> DomainResult<()> {
        if self.serials_assigned > 0 {
            return Err(DomainError::invalid_state(format!(
                "line {} still has {} serials reserved; release them first",
                self.code, self.serials_assigned
            )));
        }
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

    /// Remember the lots an approved bulk line was sold from.
    pub fn record_allocations(&mut self, allocations: Vec<LotAllocation>) -> DomainResult<()> {
        if self.is_serialized() {
            return Err(DomainError::validation(format!(
                "line {} is for a serialized product",
                self.code
            )));
        }
        let allocated: i64 = allocations.iter().map(|a| a.quantity).sum();
        if allocated != self.quantity {
            return Err(DomainError::invalid_state(format!(
                "line {} needs {} units but {} were allocated",
                self.code, self.quantity, allocated
            )));
        }
        self.allocations = allocations;
        Ok(())
    }

    /// Hand back the recorded allocations, clearing them from the line.
    pub fn take_allocations(&mut self) -> Vec<LotAllocation> {
        std::mem::take(&mut self.allocations)
    }
}

impl Entity for SaleLine {
    type Id = SaleLineId;

    fn id(&self) -> SaleLineId {
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
