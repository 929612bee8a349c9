use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, LotId, ProductId, SerialUnitId, TenantId, TransferId,
    TransferLineId,
};
use stockbook_inventory::LotAllocation;
use stockbook_products::StockType;

/// Command: AddTransferLine. `serials` is required for serialized products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTransferLine {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub serials: Vec<String>,
}

/// What a transfer line holds at the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferStock {
    Bulk {
        allocations: Vec<LotAllocation>,
        destination_lot: LotId,
    },
    Serialized {
        serials: Vec<SerialUnitId>,
    },
}

impl TransferStock {
    pub fn stock_type(&self) -> StockType {
        match self {
            TransferStock::Bulk { .. } => StockType::Bulk,
            TransferStock::Serialized { .. } => StockType::Serialized,
        }
    }

    fn units(&self) -> i64 {
        match self {
            TransferStock::Bulk { allocations, .. } => allocations.iter().map(|a| a.quantity).sum(),
            TransferStock::Serialized { serials } => serials.len() as i64,
        }
    }
}

/// Input for [`TransferLine::new`].
#[derive(Debug, Clone)]
pub struct NewTransferLine {
    pub tenant_id: TenantId,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub stock: TransferStock,
}

/// One product moving on a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    id: TransferLineId,
    tenant_id: TenantId,
    transfer_id: TransferId,
    product_id: ProductId,
    quantity: i64,
    stock: TransferStock,
}

impl TransferLine {
    /// Build a line whose reserved stock covers `quantity` exactly.
    pub fn new(new: NewTransferLine) -> DomainResult<Self> {
        Self::with_id(TransferLineId::new(), new)
    }

    /// Like [`Self::new`] with a pre-allocated id, so reservations can point
    /// at the line before it is stored.
    pub fn with_id(id: TransferLineId, new: NewTransferLine) -> DomainResult<Self> {
        ensure_positive(new.quantity)?;
        let units = new.stock.units();
        if units != new.quantity {
            return Err(DomainError::validation(format!(
                "transfer line for {} units carries {} units of stock",
                new.quantity, units
            )));
        }
        Ok(Self {
            id,
            tenant_id: new.tenant_id,
            transfer_id: new.transfer_id,
            product_id: new.product_id,
            quantity: new.quantity,
            stock: new.stock,
        })
    }

    pub fn transfer_id(&self) -> TransferId {
        self.transfer_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn stock(&self) -> &TransferStock {
        &self.stock
    }

    pub fn stock_type(&self) -> StockType {
        self.stock.stock_type()
    }
}

impl Entity for TransferLine {
    type Id = TransferLineId;

    fn id(&self) -> TransferLineId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Fail unless `quantity` is positive.
pub fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_line(quantity: i64, stock: TransferStock) -> NewTransferLine {
        NewTransferLine {
            tenant_id: TenantId::new(),
            transfer_id: TransferId::new(),
            product_id: ProductId::new(),
            quantity,
            stock,
        }
    }

    #[test]
    fn bulk_line_must_be_fully_allocated() {
        let stock = TransferStock::Bulk {
            allocations: vec![
                LotAllocation { lot_id: LotId::new(), quantity: 3 },
                LotAllocation { lot_id: LotId::new(), quantity: 2 },
            ],
            destination_lot: LotId::new(),
        };
        let line = TransferLine::new(new_line(5, stock.clone())).unwrap();
        assert_eq!(line.stock_type(), StockType::Bulk);
        assert!(TransferLine::new(new_line(6, stock)).is_err());
    }

    #[test]
    fn serialized_line_needs_one_serial_per_unit() {
        let stock = TransferStock::Serialized {
            serials: vec![SerialUnitId::new(), SerialUnitId::new()],
        };
        assert!(TransferLine::new(new_line(3, stock.clone())).is_err());
        let line = TransferLine::new(new_line(2, stock)).unwrap();
        assert_eq!(line.stock_type(), StockType::Serialized);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let stock = TransferStock::Serialized { serials: Vec::new() };
        assert_eq!(
            TransferLine::new(new_line(0, stock)).unwrap_err(),
            DomainError::validation("quantity must be positive")
        );
    }
}
