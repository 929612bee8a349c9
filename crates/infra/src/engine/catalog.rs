//! Product registry operations.

use tracing::instrument;

use stockbook_core::{DomainError, ProductId, TenantId};
use stockbook_products::{ChangeStockType, CreateProduct, Product};

use super::ledger::{product_in_use, require};
use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::store::{DocumentTx, Store};

impl<S: Store> Engine<S> {
    /// Register a product with no stock.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, product_id = %cmd.product_id), err)]
    pub async fn create_product(&self, cmd: CreateProduct) -> Result<Product, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            if tx.get::<Product>(cmd.product_id).await?.is_some() {
                return Err(DomainError::conflict(format!(
                    "product {} already exists",
                    cmd.product_id
                ))
                .into());
            }
            let product = Product::create(&cmd)?;
            tx.put(&product).await?;
            tracing::info!(sku = product.sku(), stock_type = ?product.stock_type(), "product created");
            product
        })
    }

    /// Switch a product between bulk and serialized tracking.
    ///
    /// Refused once any lot, serial or order/transfer line references it.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, product_id = %cmd.product_id), err)]
    pub async fn change_stock_type(&self, cmd: ChangeStockType) -> Result<Product, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut product = require::<Product, _>(&mut tx, cmd.product_id).await?;
            let in_use = product_in_use(&mut tx, cmd.product_id).await?;
            product.change_stock_type(cmd.stock_type, in_use)?;
            tx.put(&product).await?;
            product
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Product, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            require::<Product, _>(&mut tx, product_id).await?
        })
    }
}
