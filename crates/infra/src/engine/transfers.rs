//! Inter-warehouse transfers.
//!
//! Adding a line reserves stock at the origin: bulk lines reserve lots oldest
//! receipt first and open a draft lot at the destination, serialized lines
//! reserve the exact units named. Completion ships the reserved units and
//! makes them available at the destination. Aggregate product stock never
//! changes on a transfer.

use chrono::Utc;
use tracing::instrument;

use stockbook_core::{
    DomainError, Entity, SerialUnitId, TenantId, TransferId, TransferLineId, WarehouseId,
};
use stockbook_inventory::{
    BulkLot, LotOrigin, NewLot, SerialHold, SerialStatus, SerialUnit, ensure_distinct,
    normalize_serial, plan_fifo,
};
use stockbook_products::{Product, StockType};
use stockbook_transfers::{
    AddTransferLine, CreateTransfer, NewTransferLine, Transfer, TransferLine, TransferStock,
    ensure_positive,
};

use super::ledger::{lots_at, require, serial_by_key};
use super::outcome::TransferView;
use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::sequence::{SequenceKind, next_code, next_receipt_no};
use crate::store::{DocumentTx, Filter, Store, StoreTx};

impl<S: Store> Engine<S> {
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, origin = %cmd.origin_id, destination = %cmd.destination_id), err)]
    pub async fn create_transfer(&self, cmd: CreateTransfer) -> Result<Transfer, EngineError> {
        in_transaction!(self, cmd.tenant_id, |tx| {
            let code = next_code(&mut tx, SequenceKind::Transfer, self.config.code_width).await?;
            let transfer = Transfer::create(&cmd, code, Utc::now())?;
            tx.put(&transfer).await?;
            tracing::info!(transfer_id = %transfer.id(), code = transfer.code(), "transfer created");
            transfer
        })
    }

    /// Reserve stock at the origin for one product.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, transfer_id = %cmd.transfer_id, product_id = %cmd.product_id), err)]
    pub async fn add_transfer_line(&self, cmd: AddTransferLine) -> Result<TransferLine, EngineError> {
        ensure_positive(cmd.quantity)?;
        let serials = cmd
            .serials
            .iter()
            .map(|raw| normalize_serial(raw))
            .collect::<Result<Vec<_>, _>>()?;
        ensure_distinct(serials.iter().map(String::as_str))?;

        in_transaction!(self, cmd.tenant_id, |tx| {
            let transfer = require::<Transfer, _>(&mut tx, cmd.transfer_id).await?;
            transfer.ensure_editable()?;
            let product = require::<Product, _>(&mut tx, cmd.product_id).await?;
            let siblings = transfer_lines(&mut tx, transfer.id()).await?;
            if siblings.iter().any(|line| line.product_id() == cmd.product_id) {
                return Err(DomainError::conflict(format!(
                    "product {} is already on transfer {}",
                    product.sku(),
                    transfer.code()
                ))
                .into());
            }

            let line_id = TransferLineId::new();
            let stock = match product.stock_type() {
                StockType::Bulk => {
                    if !serials.is_empty() {
                        return Err(DomainError::validation(format!(
                            "product {} is bulk and takes no serials",
                            product.sku()
                        ))
                        .into());
                    }
                    reserve_lots(&mut tx, &transfer, &product, line_id, cmd.quantity).await?
                }
                StockType::Serialized => {
                    reserve_serials(&mut tx, &transfer, &product, line_id, cmd.quantity, &serials)
                        .await?
                }
            };

            let line = TransferLine::with_id(
                line_id,
                NewTransferLine {
                    tenant_id: cmd.tenant_id,
                    transfer_id: transfer.id(),
                    product_id: product.id(),
                    quantity: cmd.quantity,
                    stock,
                },
            )?;
            tx.put(&line).await?;
            tracing::info!(code = transfer.code(), quantity = line.quantity(), "transfer line added");
            line
        })
    }

    /// Drop a line from a draft transfer, releasing what it reserved.
    #[instrument(skip(self), err)]
    pub async fn remove_transfer_line(
        &self,
        tenant_id: TenantId,
        line_id: TransferLineId,
    ) -> Result<Transfer, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let line = require::<TransferLine, _>(&mut tx, line_id).await?;
            let transfer = require::<Transfer, _>(&mut tx, line.transfer_id()).await?;
            transfer.ensure_editable()?;
            release_line(&mut tx, &line).await?;
            tx.delete(&line).await?;
            transfer
        })
    }

    /// Ship every reserved unit to the destination.
    #[instrument(skip(self), err)]
    pub async fn complete_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<TransferView, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let mut transfer = require::<Transfer, _>(&mut tx, transfer_id).await?;
            let lines = transfer_lines(&mut tx, transfer.id()).await?;
            transfer.complete(lines.len())?;

            for line in &lines {
                match line.stock() {
                    TransferStock::Bulk {
                        allocations,
                        destination_lot,
                    } => {
                        for allocation in allocations {
                            let mut lot = require::<BulkLot, _>(&mut tx, allocation.lot_id).await?;
                            lot.ship(allocation.quantity)?;
                            tx.put(&lot).await?;
                        }
                        let mut lot = require::<BulkLot, _>(&mut tx, *destination_lot).await?;
                        let receipt_no = next_receipt_no(&mut tx).await?;
                        lot.receipt(receipt_no)?;
                        tx.put(&lot).await?;
                    }
                    TransferStock::Serialized { serials } => {
                        for serial_id in serials {
                            let mut unit = require::<SerialUnit, _>(&mut tx, *serial_id).await?;
                            unit.complete_transfer(line.id(), transfer.destination_id())?;
                            tx.put(&unit).await?;
                        }
                    }
                }
            }

            tx.put(&transfer).await?;
            tracing::info!(code = transfer.code(), lines = lines.len(), "transfer completed");
            TransferView { transfer, lines }
        })
    }

    /// Delete a draft transfer, releasing every reservation it holds.
    #[instrument(skip(self), err)]
    pub async fn delete_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<TransferView, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let transfer = require::<Transfer, _>(&mut tx, transfer_id).await?;
            transfer.ensure_editable()?;
            let lines = transfer_lines(&mut tx, transfer.id()).await?;
            for line in &lines {
                release_line(&mut tx, line).await?;
                tx.delete(line).await?;
            }
            tx.delete(&transfer).await?;
            tracing::info!(code = transfer.code(), "transfer deleted");
            TransferView { transfer, lines }
        })
    }

    #[instrument(skip(self), err)]
    pub async fn get_transfer(
        &self,
        tenant_id: TenantId,
        transfer_id: TransferId,
    ) -> Result<TransferView, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let transfer = require::<Transfer, _>(&mut tx, transfer_id).await?;
            let lines = transfer_lines(&mut tx, transfer.id()).await?;
            TransferView { transfer, lines }
        })
    }
}

async fn transfer_lines<T: StoreTx>(
    tx: &mut T,
    transfer_id: TransferId,
) -> Result<Vec<TransferLine>, EngineError> {
    Ok(tx.find::<TransferLine>(Filter::all().parent(transfer_id)).await?)
}

/// Reserve `quantity` units FIFO at the origin and open the destination lot.
async fn reserve_lots<T: StoreTx>(
    tx: &mut T,
    transfer: &Transfer,
    product: &Product,
    line_id: TransferLineId,
    quantity: i64,
) -> Result<TransferStock, EngineError> {
    let origin = transfer.origin_id();
    let lots = lots_at(tx, product.id(), origin).await?;
    let subject = format!("product {} at warehouse {origin}", product.sku());
    let allocations = plan_fifo(&lots, quantity, &subject)?;
    for allocation in &allocations {
        if let Some(lot) = lots.iter().find(|lot| lot.id() == allocation.lot_id) {
            let mut lot = lot.clone();
            lot.reserve(allocation.quantity)?;
            tx.put(&lot).await?;
        }
    }

    let destination = BulkLot::open(NewLot {
        tenant_id: transfer.tenant_id(),
        product_id: product.id(),
        warehouse_id: transfer.destination_id(),
        origin: LotOrigin::Transfer(line_id),
        quantity,
        created_at: Utc::now(),
    })?;
    tx.put(&destination).await?;
    Ok(TransferStock::Bulk {
        allocations,
        destination_lot: destination.id(),
    })
}

/// Reserve exactly the named units at the origin.
async fn reserve_serials<T: StoreTx>(
    tx: &mut T,
    transfer: &Transfer,
    product: &Product,
    line_id: TransferLineId,
    quantity: i64,
    serials: &[String],
) -> Result<TransferStock, EngineError> {
    let origin = transfer.origin_id();
    let available = available_serials(tx, product, origin).await?;
    if available < quantity {
        return Err(DomainError::insufficient_stock(
            format!("product {} at warehouse {origin}", product.sku()),
            quantity,
            available,
        )
        .into());
    }
    if serials.len() as i64 != quantity {
        return Err(DomainError::validation(format!(
            "transfer of {quantity} units of product {} names {} serials",
            product.sku(),
            serials.len()
        ))
        .into());
    }

    let mut reserved: Vec<SerialUnitId> = Vec::with_capacity(serials.len());
    for serial in serials {
        let mut unit = serial_by_key(tx, serial)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("serial {serial}")))?;
        unit.ensure_product(product.id())?;
        if unit.warehouse_id() != origin {
            return Err(DomainError::validation(format!(
                "serial {serial} is not stocked at warehouse {origin}"
            ))
            .into());
        }
        unit.reserve(SerialHold::TransferLine(line_id))?;
        tx.put(&unit).await?;
        reserved.push(unit.id());
    }
    Ok(TransferStock::Serialized { serials: reserved })
}

async fn available_serials<T: StoreTx>(
    tx: &mut T,
    product: &Product,
    warehouse: WarehouseId,
) -> Result<i64, EngineError> {
    let units = tx
        .find::<SerialUnit>(Filter::all().product(product.id()).warehouse(warehouse))
        .await?;
    Ok(units
        .iter()
        .filter(|unit| unit.status() == SerialStatus::Available)
        .count() as i64)
}

/// Undo the reservations a draft line holds and drop its destination lot.
async fn release_line<T: StoreTx>(tx: &mut T, line: &TransferLine) -> Result<(), EngineError> {
    match line.stock() {
        TransferStock::Bulk {
            allocations,
            destination_lot,
        } => {
            for allocation in allocations {
                let mut lot = require::<BulkLot, _>(tx, allocation.lot_id).await?;
                lot.release(allocation.quantity)?;
                tx.put(&lot).await?;
            }
            if let Some(lot) = tx.get::<BulkLot>(*destination_lot).await? {
                tx.delete(&lot).await?;
            }
        }
        TransferStock::Serialized { serials } => {
            for serial_id in serials {
                let mut unit = require::<SerialUnit, _>(tx, *serial_id).await?;
                unit.release(SerialHold::TransferLine(line.id()))?;
                tx.put(&unit).await?;
            }
        }
    }
    Ok(())
}
