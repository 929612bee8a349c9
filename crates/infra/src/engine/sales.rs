//! Sale order lifecycle: draft editing, approval, deletion.
//!
//! Draft sale lines hold no bulk stock; serialized lines hold the units
//! reserved to them. Approval checks every bulk line against both the
//! product's aggregate stock and FIFO availability at the line's warehouse
//! before anything is written, then sells lots oldest first and
//! records which lots each line drew from so a later deletion can put the
//! units back exactly.

use chrono::Utc;
use tracing::instrument;

use stockbook_core::{DomainError, Entity, SaleLineId, SaleOrderId, TenantId};
use stockbook_inventory::{BulkLot, LotAllocation, SerialHold, plan_fifo};
use stockbook_products::{Product, StockType};
use stockbook_sales::{
    AddSaleLine, CreateSaleOrder, NewSaleLine, SaleLine, SaleOrder, UpdateSaleLine,
};

use super::ledger::{adjust_stock, lots_at, require, serials_linked};
use super::outcome::{LineChange, LineView, SaleOutcome, SaleView, StockDelta};
use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::sequence::{SequenceKind, next_code};
use crate::store::{DocumentTx, Filter, Store, StoreTx};

impl<S: Store> Engine<S> {
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id), err)]
    pub async fn create_sale_order(&self, cmd: CreateSaleOrder) -> Result<SaleOrder, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let code = next_code(&mut tx, SequenceKind::SaleOrder, self.config.code_width).await?;
            let order = SaleOrder::create(&cmd, code, Utc::now());
            tx.put(&order).await?;
            tracing::info!(order_id = %order.id(), code = order.code(), "sale order created");
            order
        })
    }

    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, order_id = %cmd.order_id, product_id = %cmd.product_id), err)]
    pub async fn add_sale_line(
        &self,
        cmd: AddSaleLine,
    ) -> Result<LineChange<SaleOrder, SaleLine>, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut order = require::<SaleOrder, _>(&mut tx, cmd.order_id).await?;
            order.ensure_editable()?;
            let product = require::<Product, _>(&mut tx, cmd.product_id).await?;
            let mut lines = order_lines(&mut tx, &order).await?;
            if lines.iter().any(|line| line.product_id() == cmd.product_id) {
                return Err(DomainError::conflict(format!(
                    "product {} is already on sale order {}",
                    product.sku(),
                    order.code()
                ))
                .into());
            }

            let code = next_code(&mut tx, SequenceKind::SaleLine, self.config.code_width).await?;
            let line = SaleLine::new(NewSaleLine {
                tenant_id: cmd.tenant_id,
                order_id: order.id(),
                code,
                product_id: product.id(),
                stock_type: product.stock_type(),
                warehouse_id: cmd.warehouse_id,
                unit_price: cmd.unit_price,
                quantity: cmd.quantity,
            })?;
            tx.put(&line).await?;
            lines.push(line.clone());
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            tracing::info!(line = line.code(), total = %order.total(), "sale line added");
            LineChange { order, line }
        })
    }

    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, line_id = %cmd.line_id), err)]
    pub async fn update_sale_line(
        &self,
        cmd: UpdateSaleLine,
    ) -> Result<LineChange<SaleOrder, SaleLine>, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut line = require::<SaleLine, _>(&mut tx, cmd.line_id).await?;
            let mut order = require::<SaleOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            line.update(cmd.quantity, cmd.unit_price)?;
            tx.put(&line).await?;

            let lines = order_lines(&mut tx, &order).await?;
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            LineChange { order, line }
        })
    }

    /// Drop a draft line. Serials reserved to it must be released first.
    #[instrument(skip(self), err)]
    pub async fn remove_sale_line(
        &self,
        tenant_id: TenantId,
        line_id: SaleLineId,
    ) -> Result<SaleOrder, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let line = require::<SaleLine, _>(&mut tx, line_id).await?;
            let mut order = require::<SaleOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            line.ensure_removable()?;
            tx.delete(&line).await?;

            let lines = order_lines(&mut tx, &order).await?;
            order.recompute_total(&lines)?;
            tx.put(&order).await?;
            order
        })
    }

    /// Take every line out of stock.
    #[instrument(skip(self), err)]
    pub async fn approve_sale_order(
        &self,
        tenant_id: TenantId,
        order_id: SaleOrderId,
    ) -> Result<SaleOutcome, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let mut order = require::<SaleOrder, _>(&mut tx, order_id).await?;
            let mut lines = order_lines(&mut tx, &order).await?;
            order.approve(&lines)?;

            // Plan every bulk line before touching anything.
            let mut plans: Vec<Vec<LotAllocation>> = Vec::with_capacity(lines.len());
            for line in &lines {
                plans.push(plan_line(&mut tx, line).await?);
            }

            let mut stock = Vec::with_capacity(lines.len());
            for (line, plan) in lines.iter_mut().zip(plans) {
                let quantity = line.quantity();
                adjust_stock(&mut tx, line.product_id(), &mut stock, |product| {
                    product.withdraw(quantity)
                })
                .await?;
                match line.stock_type() {
                    StockType::Bulk => {
                        for allocation in &plan {
                            let mut lot = require::<BulkLot, _>(&mut tx, allocation.lot_id).await?;
                            lot.sell(allocation.quantity)?;
                            tx.put(&lot).await?;
                        }
                        line.record_allocations(plan)?;
                        tx.put(&*line).await?;
                    }
                    StockType::Serialized => {
                        for mut unit in serials_linked(&mut tx, line.id()).await? {
                            unit.sell(line.id())?;
                            tx.put(&unit).await?;
                        }
                    }
                }
            }

            tx.put(&order).await?;
            tracing::info!(code = order.code(), lines = lines.len(), "sale order approved");
            SaleOutcome { order, lines, stock }
        })
    }

    /// Delete an order with all of its lines.
    ///
    /// A draft order releases its reserved serials. An approved order is
    /// reversed exactly: stock returns, lots get back the units each line
    /// drew from them, and sold serials become available again.
    #[instrument(skip(self), err)]
    pub async fn delete_sale_order(
        &self,
        tenant_id: TenantId,
        order_id: SaleOrderId,
    ) -> Result<SaleOutcome, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let order = require::<SaleOrder, _>(&mut tx, order_id).await?;
            let lines = order_lines(&mut tx, &order).await?;
            let mut stock = Vec::new();

            for line in &lines {
                if order.is_approved() {
                    reverse_sale(&mut tx, line.clone(), &mut stock).await?;
                } else {
                    for mut unit in serials_linked(&mut tx, line.id()).await? {
                        unit.release(SerialHold::SaleLine(line.id()))?;
                        tx.put(&unit).await?;
                    }
                }
                tx.delete(line).await?;
            }
            tx.delete(&order).await?;

            tracing::info!(code = order.code(), approved = order.is_approved(), "sale order deleted");
            SaleOutcome { order, lines, stock }
        })
    }

    /// The order with its lines and the serials reserved or sold on each.
    #[instrument(skip(self), err)]
    pub async fn get_sale_order(
        &self,
        tenant_id: TenantId,
        order_id: SaleOrderId,
    ) -> Result<SaleView, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let order = require::<SaleOrder, _>(&mut tx, order_id).await?;
            let mut lines = Vec::new();
            for line in order_lines(&mut tx, &order).await? {
                let serials = serials_linked(&mut tx, line.id())
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
            SaleView { order, lines }
        })
    }
}

pub(super) async fn order_lines<T: StoreTx>(
    tx: &mut T,
    order: &SaleOrder,
) -> Result<Vec<SaleLine>, EngineError> {
    Ok(tx.find::<SaleLine>(Filter::all().parent(order.id())).await?)
}

/// FIFO plan for a bulk line; empty for serialized lines.
async fn plan_line<T: StoreTx>(
    tx: &mut T,
    line: &SaleLine,
) -> Result<Vec<LotAllocation>, EngineError> {
    let Some(warehouse_id) = line.warehouse_id().filter(|_| !line.is_serialized()) else {
        return Ok(Vec::new());
    };
    let product = require::<Product, _>(tx, line.product_id()).await?;
    product.ensure_stock_covers(line.quantity())?;
    let lots = lots_at(tx, line.product_id(), warehouse_id).await?;
    let subject = format!("product {} at warehouse {warehouse_id}", product.sku());
    Ok(plan_fifo(&lots, line.quantity(), &subject)?)
}

/// Put an approved line's units back into stock.
async fn reverse_sale<T: StoreTx>(
    tx: &mut T,
    mut line: SaleLine,
    stock: &mut Vec<StockDelta>,
) -> Result<(), EngineError> {
    let quantity = line.quantity();
    adjust_stock(tx, line.product_id(), stock, |product| product.receive(quantity)).await?;
    for allocation in line.take_allocations() {
        let mut lot = require::<BulkLot, _>(tx, allocation.lot_id).await?;
        lot.unsell(allocation.quantity)?;
        tx.put(&lot).await?;
    }
    for mut unit in serials_linked(tx, line.id()).await? {
        unit.reverse_sale(line.id())?;
        tx.put(&unit).await?;
    }
    Ok(())
}
