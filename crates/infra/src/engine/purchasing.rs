//! Purchase order lifecycle: draft editing, approval, deletion.
//!
//! Bulk lines own one draft lot each, sized to the line. Serialized lines own
//! the draft serial units registered against them. Approval receipts both into
//! stock; deleting an approved order takes them back out, provided nothing has
//! been reserved, sold or shipped from them since.

use chrono::Utc;
use tracing::instrument;

use stockbook_core::{DomainError, Entity, PurchaseLineId, PurchaseOrderId, TenantId, WarehouseId};
use stockbook_inventory::{BulkLot, LotOrigin, NewLot, SerialStatus, SerialUnit};
use stockbook_products::{Product, StockType};
use stockbook_purchasing::{
    AddPurchaseLine, CreatePurchaseOrder, NewPurchaseLine, PurchaseLine, PurchaseOrder,
    UpdatePurchaseLine,
};

use super::ledger::{adjust_stock, require};
use super::outcome::{LineChange, LineView, PurchaseOutcome, PurchaseView, StockDelta};
use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::sequence::{SequenceKind, next_code, next_receipt_no};
use crate::store::{DocumentTx, Filter, Store, StoreTx};

impl<S: Store> Engine<S> {
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id), err)]
    pub async fn create_purchase_order(
        &self,
        cmd: CreatePurchaseOrder,
    ) -> Result<PurchaseOrder, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let code = next_code(&mut tx, SequenceKind::PurchaseOrder, self.config.code_width).await?;
            let order = PurchaseOrder::create(&cmd, code, Utc::now());
            tx.put(&order).await?;
            tracing::info!(order_id = %order.id(), code = order.code(), "purchase order created");
            order
        })
    }

    /// Add a line for a product not yet on the order.
    ///
    /// Bulk lines open a draft lot of the line's quantity at its warehouse.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, order_id = %cmd.order_id, product_id = %cmd.product_id), err)]
    pub async fn add_purchase_line(
        &self,
        cmd: AddPurchaseLine,
    ) -> Result<LineChange<PurchaseOrder, PurchaseLine>, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut order = require::<PurchaseOrder, _>(&mut tx, cmd.order_id).await?;
            order.ensure_editable()?;
            let product = require::<Product, _>(&mut tx, cmd.product_id).await?;
            let mut lines = order_lines(&mut tx, &order).await?;
            if lines.iter().any(|line| line.product_id() == cmd.product_id) {
                return Err(DomainError::conflict(format!(
                    "product {} is already on purchase order {}",
                    product.sku(),
                    order.code()
                ))
                .into());
            }

            let code = next_code(&mut tx, SequenceKind::PurchaseLine, self.config.code_width).await?;
            let line = PurchaseLine::new(NewPurchaseLine {
                tenant_id: cmd.tenant_id,
                order_id: order.id(),
                code,
                product_id: product.id(),
                stock_type: product.stock_type(),
                warehouse_id: cmd.warehouse_id,
                unit_price: cmd.unit_price,
                quantity: cmd.quantity,
            })?;
            if line.stock_type() == StockType::Bulk {
                let lot = BulkLot::open(NewLot {
                    tenant_id: cmd.tenant_id,
                    product_id: product.id(),
                    warehouse_id: bulk_warehouse(&line)?,
                    origin: LotOrigin::Purchase(line.id()),
                    quantity: line.quantity(),
                    created_at: Utc::now(),
                })?;
                tx.put(&lot).await?;
            }

            tx.put(&line).await?;
            lines.push(line.clone());
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            tracing::info!(line = line.code(), total = %order.total(), "purchase line added");
            LineChange { order, line }
        })
    }

    /// Change quantity and price of a draft line; its draft lot follows.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, line_id = %cmd.line_id), err)]
    pub async fn update_purchase_line(
        &self,
        cmd: UpdatePurchaseLine,
    ) -> Result<LineChange<PurchaseOrder, PurchaseLine>, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut line = require::<PurchaseLine, _>(&mut tx, cmd.line_id).await?;
            let mut order = require::<PurchaseOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            line.update(cmd.quantity, cmd.unit_price)?;
            for mut lot in line_lots(&mut tx, line.id()).await? {
                lot.resize(line.quantity())?;
                tx.put(&lot).await?;
            }
            tx.put(&line).await?;

            let lines = order_lines(&mut tx, &order).await?;
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            LineChange { order, line }
        })
    }

    /// Drop a draft line together with its draft lot and serials.
    #[instrument(skip(self), err)]
    pub async fn remove_purchase_line(
        &self,
        tenant_id: TenantId,
        line_id: PurchaseLineId,
    ) -> Result<PurchaseOrder, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let line = require::<PurchaseLine, _>(&mut tx, line_id).await?;
            let mut order = require::<PurchaseOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            remove_draft_stock(&mut tx, &line).await?;
            tx.delete(&line).await?;

            let lines = order_lines(&mut tx, &order).await?;
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            order
        })
    }

    /// Receive every line into stock.
    ///
    /// Draft lots become available to FIFO, which draws them by creation
    /// time; serial units become available where they were registered.
    #[instrument(skip(self), err)]
    pub async fn approve_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOutcome, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let mut order = require::<PurchaseOrder, _>(&mut tx, order_id).await?;
            let lines = order_lines(&mut tx, &order).await?;
            order.approve(&lines)?;

            let mut stock = Vec::with_capacity(lines.len());
            for line in &lines {
                let quantity = line.quantity();
                adjust_stock(&mut tx, line.product_id(), &mut stock, |product| {
                    product.receive(quantity)
                })
                .await?;
                match line.stock_type() {
                    StockType::Bulk => {
                        for mut lot in line_lots(&mut tx, line.id()).await? {
                            let receipt_no = next_receipt_no(&mut tx).await?;
                            lot.receipt(receipt_no)?;
                            tx.put(&lot).await?;
                        }
                    }
                    StockType::Serialized => {
                        for mut unit in line_serials(&mut tx, line.id()).await? {
                            unit.receipt()?;
                            tx.put(&unit).await?;
                        }
                    }
                }
            }

            tx.put(&order).await?;
            tracing::info!(code = order.code(), lines = lines.len(), "purchase order approved");
            PurchaseOutcome { order, lines, stock }
        })
    }

    /// Delete an order with all of its lines and stock records.
    ///
    /// An approved order is reversed first. That is refused while any of its
    /// units have been reserved, sold or shipped elsewhere, or when taking the
    /// quantities back out would drive a product's stock negative.
    #[instrument(skip(self), err)]
    pub async fn delete_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOutcome, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let order = require::<PurchaseOrder, _>(&mut tx, order_id).await?;
            let lines = order_lines(&mut tx, &order).await?;
            let mut stock = Vec::new();

            for line in &lines {
                if order.is_approved() {
                    reverse_receipt(&mut tx, line, &mut stock).await?;
                } else {
                    remove_draft_stock(&mut tx, line).await?;
                }
                tx.delete(line).await?;
            }
            tx.delete(&order).await?;

            tracing::info!(code = order.code(), approved = order.is_approved(), "purchase order deleted");
            PurchaseOutcome { order, lines, stock }
        })
    }

    /// The order with its lines and the serials registered on each.
    #[instrument(skip(self), err)]
    pub async fn get_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseView, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let order = require::<PurchaseOrder, _>(&mut tx, order_id).await?;
            let mut lines = Vec::new();
            for line in order_lines(&mut tx, &order).await? {
                let serials = line_serials(&mut tx, line.id())
                    .await?
                    .iter()
                    .map(|unit| unit.serial().to_string())
                    .collect();
                lines.push(LineView {
                    stock_type: line.stock_type(),
                    line,
                    serials,
                });
            }
            PurchaseView { order, lines }
        })
    }
}

pub(super) async fn order_lines<T: StoreTx>(
    tx: &mut T,
    order: &PurchaseOrder,
) -> Result<Vec<PurchaseLine>, EngineError> {
    Ok(tx.find::<PurchaseLine>(Filter::all().parent(order.id())).await?)
}

async fn line_lots<T: StoreTx>(tx: &mut T, line: PurchaseLineId) -> Result<Vec<BulkLot>, EngineError> {
    Ok(tx.find::<BulkLot>(Filter::all().parent(line)).await?)
}

/// Serial units registered on a purchase line.
pub(super) async fn line_serials<T: StoreTx>(
    tx: &mut T,
    line: PurchaseLineId,
) -> Result<Vec<SerialUnit>, EngineError> {
    Ok(tx.find::<SerialUnit>(Filter::all().parent(line)).await?)
}

fn bulk_warehouse(line: &PurchaseLine) -> Result<WarehouseId, DomainError> {
    line.warehouse_id()
        .ok_or_else(|| DomainError::validation("bulk products require a warehouse"))
}

async fn remove_draft_stock<T: StoreTx>(tx: &mut T, line: &PurchaseLine) -> Result<(), EngineError> {
    for unit in line_serials(tx, line.id()).await? {
        unit.ensure_removable()?;
        tx.delete(&unit).await?;
    }
    for lot in line_lots(tx, line.id()).await? {
        tx.delete(&lot).await?;
    }
    Ok(())
}

/// Take an approved line's units back out of stock and drop its records.
async fn reverse_receipt<T: StoreTx>(
    tx: &mut T,
    line: &PurchaseLine,
    stock: &mut Vec<StockDelta>,
) -> Result<(), EngineError> {
    let lots = line_lots(tx, line.id()).await?;
    for lot in &lots {
        if !lot.is_untouched() {
            return Err(DomainError::invalid_state(format!(
                "line {} has units reserved or sold from its lot",
                line.code()
            ))
            .into());
        }
        if lot.quantity() != line.quantity() {
            return Err(DomainError::invalid_state(format!(
                "line {} has units shipped out through a transfer",
                line.code()
            ))
            .into());
        }
    }
    let units = line_serials(tx, line.id()).await?;
    if let Some(unit) = units.iter().find(|unit| unit.status() != SerialStatus::Available) {
        return Err(DomainError::invalid_state(format!(
            "serial {} of line {} is {:?}",
            unit.serial(),
            line.code(),
            unit.status()
        ))
        .into());
    }

    let quantity = line.quantity();
    adjust_stock(tx, line.product_id(), stock, |product| product.withdraw(quantity)).await?;
    for lot in &lots {
        tx.delete(lot).await?;
    }
    for unit in &units {
        tx.delete(unit).await?;
    }
    Ok(())
}
