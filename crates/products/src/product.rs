use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Entity, Money, ProductId, TenantId};

/// How a product's stock is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockType {
    /// Tracked by quantity only, in FIFO lots.
    Bulk,
    /// Every physical unit carries its own serial.
    Serialized,
}

/// Availability of a product for sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Available,
    OutOfStock,
}

/// Product with its aggregate stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    tenant_id: TenantId,
    sku: String,
    name: String,
    sale_price: Money,
    stock_type: StockType,
    stock: i64,
    status: ProductStatus,
    created_at: DateTime<Utc>,
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub sale_price: Money,
    pub stock_type: StockType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStockType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStockType {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub stock_type: StockType,
}

impl Product {
    /// New product with no stock.
    pub fn create(cmd: &CreateProduct) -> DomainResult<Self> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if !cmd.sale_price.is_positive() {
            return Err(DomainError::validation("sale price must be positive"));
        }

        Ok(Self {
            id: cmd.product_id,
            tenant_id: cmd.tenant_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            sale_price: cmd.sale_price,
            stock_type: cmd.stock_type,
            stock: 0,
            status: ProductStatus::OutOfStock,
            created_at: cmd.occurred_at,
        })
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sale_price(&self) -> Money {
        self.sale_price
    }

    pub fn stock_type(&self) -> StockType {
        self.stock_type
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_serialized(&self) -> bool {
        self.stock_type == StockType::Serialized
    }

    /// Switch the tracking regime.
    ///
    /// `in_use` is true when any lot, serial or order/transfer line references
    /// this product; the stock type is frozen from then on.
    pub fn change_stock_type(&mut self, stock_type: StockType, in_use: bool) -> DomainResult<()> {
        if self.stock_type == stock_type {
            return Ok(());
        }
        if in_use {
            return Err(DomainError::conflict(format!(
                "stock type of product {} cannot change once stock records exist",
                self.sku
            )));
        }
        self.stock_type = stock_type;
        Ok(())
    }

    /// Fail unless at least `quantity` units are in stock.
    pub fn ensure_stock_covers(&self, quantity: i64) -> DomainResult<()> {
        if self.stock < quantity {
            return Err(DomainError::insufficient_stock(
                format!("product {}", self.sku),
                quantity,
                self.stock,
            ));
        }
        Ok(())
    }

    /// Add received (or returned) units.
    pub fn receive(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }
        self.stock = self.stock.checked_add(quantity).ok_or_else(|| {
            DomainError::validation(format!("stock of product {} would exceed the supported range", self.sku))
        })?;
        if self.status == ProductStatus::OutOfStock {
            self.status = ProductStatus::Available;
        }
        Ok(())
    }

    /// Remove units (sale or reversal of a receipt). Stock never goes negative.
    pub fn withdraw(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("withdrawn quantity must be positive"));
        }
        self.ensure_stock_covers(quantity)?;
        self.stock -= quantity;
        if self.stock <= 0 {
            self.status = ProductStatus::OutOfStock;
        }
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_cmd(stock_type: StockType) -> CreateProduct {
        CreateProduct {
            tenant_id: TenantId::new(),
            product_id: ProductId::new(),
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            sale_price: Money::new(dec!(10.00)),
            stock_type,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn create_starts_out_of_stock() {
        let product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        assert_eq!(product.stock(), 0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);
        assert_eq!(product.stock_type(), StockType::Bulk);
    }

    #[test]
    fn create_rejects_empty_name_and_sku() {
        let mut cmd = create_cmd(StockType::Bulk);
        cmd.name = "   ".to_string();
        assert!(matches!(Product::create(&cmd), Err(DomainError::Validation(_))));

        let mut cmd = create_cmd(StockType::Bulk);
        cmd.sku = "".to_string();
        assert!(matches!(Product::create(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let mut cmd = create_cmd(StockType::Bulk);
        cmd.sale_price = Money::ZERO;
        assert!(matches!(Product::create(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn receive_marks_available() {
        let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        product.receive(5).unwrap();
        assert_eq!(product.stock(), 5);
        assert_eq!(product.status(), ProductStatus::Available);
    }

    #[test]
    fn receive_rejects_stock_overflow() {
        let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        product.receive(i64::MAX).unwrap();
        assert!(matches!(product.receive(1), Err(DomainError::Validation(_))));
        assert_eq!(product.stock(), i64::MAX);
    }

    #[test]
    fn withdraw_to_zero_marks_out_of_stock() {
        let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        product.receive(3).unwrap();
        product.withdraw(3).unwrap();
        assert_eq!(product.stock(), 0);
        assert_eq!(product.status(), ProductStatus::OutOfStock);
    }

    #[test]
    fn withdraw_never_goes_negative() {
        let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        product.receive(2).unwrap();
        let err = product.withdraw(3).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                subject: "product SKU-001".to_string(),
                requested: 3,
                available: 2,
            }
        );
        assert_eq!(product.stock(), 2);
    }

    #[test]
    fn stock_type_is_frozen_once_in_use() {
        let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
        product.change_stock_type(StockType::Serialized, false).unwrap();
        assert!(product.is_serialized());

        let err = product.change_stock_type(StockType::Bulk, true).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(product.is_serialized());

        // Re-asserting the current type is a no-op even when in use.
        product.change_stock_type(StockType::Serialized, true).unwrap();
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: stock never goes negative and the status tracks it.
            #[test]
            fn stock_and_status_stay_consistent(ops in proptest::collection::vec(-20i64..20, 0..100)) {
                let mut product = Product::create(&create_cmd(StockType::Bulk)).unwrap();
                for op in ops {
                    let before = product.stock();
                    let result = if op >= 0 { product.receive(op) } else { product.withdraw(-op) };
                    if result.is_err() {
                        prop_assert_eq!(product.stock(), before);
                    }
                    prop_assert!(product.stock() >= 0);
                    prop_assert_eq!(
                        product.status() == ProductStatus::Available,
                        product.stock() > 0
                    );
                }
            }
        }
    }
}
