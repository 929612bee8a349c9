//! Shared loads and stock bookkeeping used by several engine operations.

use stockbook_core::{DomainError, ProductId, WarehouseId};
use stockbook_inventory::{BulkLot, SerialUnit};
use stockbook_products::Product;
use stockbook_purchasing::PurchaseLine;
use stockbook_sales::SaleLine;
use stockbook_transfers::TransferLine;
use uuid::Uuid;

use super::outcome::StockDelta;
use crate::error::EngineError;
use crate::store::{Document, DocumentTx, Filter, StoreTx};

/// Load a document or fail with `NotFound`.
pub(super) async fn require<D: Document, T: StoreTx>(
    tx: &mut T,
    id: D::Id,
) -> Result<D, EngineError> {
    match tx.get::<D>(id).await? {
        Some(doc) => Ok(doc),
        None => {
            let uuid: Uuid = id.into();
            Err(DomainError::not_found(format!("{} {uuid}", D::LABEL)).into())
        }
    }
}

/// Look up a serial unit by its tenant-unique serial string.
pub(super) async fn serial_by_key<T: StoreTx>(
    tx: &mut T,
    serial: &str,
) -> Result<Option<SerialUnit>, EngineError> {
    let mut units = tx.find::<SerialUnit>(Filter::all().key(serial)).await?;
    Ok(units.pop())
}

/// Serials held by (or sold through) the line with id `line`.
pub(super) async fn serials_linked<T: StoreTx>(
    tx: &mut T,
    line: impl Into<Uuid>,
) -> Result<Vec<SerialUnit>, EngineError> {
    Ok(tx.find::<SerialUnit>(Filter::all().link(line)).await?)
}

/// Every lot of `product` at `warehouse`, in any status.
pub(super) async fn lots_at<T: StoreTx>(
    tx: &mut T,
    product: ProductId,
    warehouse: WarehouseId,
) -> Result<Vec<BulkLot>, EngineError> {
    Ok(tx
        .find::<BulkLot>(Filter::all().product(product).warehouse(warehouse))
        .await?)
}

/// True once any stock record or line references `product`.
pub(super) async fn product_in_use<T: StoreTx>(
    tx: &mut T,
    product: ProductId,
) -> Result<bool, EngineError> {
    let filter = Filter::all().product(product);
    Ok(!tx.find::<BulkLot>(filter.clone()).await?.is_empty()
        || !tx.find::<SerialUnit>(filter.clone()).await?.is_empty()
        || !tx.find::<PurchaseLine>(filter.clone()).await?.is_empty()
        || !tx.find::<SaleLine>(filter.clone()).await?.is_empty()
        || !tx.find::<TransferLine>(filter).await?.is_empty())
}

/// Apply `change` to a product's stock and record the delta.
pub(super) async fn adjust_stock<T: StoreTx>(
    tx: &mut T,
    product_id: ProductId,
    deltas: &mut Vec<StockDelta>,
    change: impl FnOnce(&mut Product) -> Result<(), DomainError>,
) -> Result<Product, EngineError> {
    let mut product = require::<Product, _>(tx, product_id).await?;
    let before = product.stock();
    change(&mut product)?;
    tx.put(&product).await?;
    deltas.push(StockDelta {
        product_id,
        before,
        after: product.stock(),
    });
    Ok(product)
}
