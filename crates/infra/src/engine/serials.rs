//! Serial registration on purchase lines and reservation on sale lines.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockbook_core::{
    DomainError, Entity, PurchaseLineId, SaleLineId, SerialUnitId, TenantId, WarehouseId,
};
use stockbook_inventory::{NewSerial, SerialHold, SerialUnit, normalize_serial};
use stockbook_purchasing::{PurchaseLine, PurchaseOrder};
use stockbook_sales::{SaleLine, SaleOrder};

use super::ledger::{require, serial_by_key};
use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::store::{DocumentTx, Store};

/// Command: register a new serial on a draft purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPurchaseSerial {
    pub tenant_id: TenantId,
    pub line_id: PurchaseLineId,
    pub serial: String,
    /// Where the unit will be stocked. Defaults to the line's warehouse.
    pub warehouse_id: Option<WarehouseId>,
}

/// Command: reserve an available serial for a draft sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignSaleSerial {
    pub tenant_id: TenantId,
    pub line_id: SaleLineId,
    pub serial: String,
}

impl<S: Store> Engine<S> {
    /// Register a draft unit against a purchase line.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, line_id = %cmd.line_id), err)]
    pub async fn assign_purchase_serial(
        &self,
        cmd: AssignPurchaseSerial,
    ) -> Result<SerialUnit, EngineError> {
        let serial = normalize_serial(&cmd.serial)?;
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut line = require::<PurchaseLine, _>(&mut tx, cmd.line_id).await?;
            let order = require::<PurchaseOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            if !line.is_serialized() {
                return Err(DomainError::validation(format!(
                    "line {} is for a bulk product",
                    line.code()
                ))
                .into());
            }
            if serial_by_key(&mut tx, &serial).await?.is_some() {
                return Err(DomainError::conflict(format!("serial {serial} already exists")).into());
            }
            line.assign_serial()?;
            let warehouse_id = cmd.warehouse_id.or(line.warehouse_id()).ok_or_else(|| {
                DomainError::validation(format!("serial {serial} needs a warehouse"))
            })?;

            let unit = SerialUnit::register(NewSerial {
                tenant_id: cmd.tenant_id,
                serial: serial.clone(),
                product_id: line.product_id(),
                warehouse_id,
                purchase_line_id: line.id(),
                registered_at: Utc::now(),
            })?;
            tx.put(&unit).await?;
            tx.put(&line).await?;
            tracing::info!(serial = unit.serial(), line = line.code(), "serial registered");
            unit
        })
    }

    /// Remove a draft unit from its purchase line.
    #[instrument(skip(self), err)]
    pub async fn release_purchase_serial(
        &self,
        tenant_id: TenantId,
        serial_id: SerialUnitId,
    ) -> Result<PurchaseLine, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let unit = require::<SerialUnit, _>(&mut tx, serial_id).await?;
            unit.ensure_removable()?;
            let mut line = require::<PurchaseLine, _>(&mut tx, unit.purchase_line_id()).await?;
            let order = require::<PurchaseOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            line.unassign_serial()?;
            tx.delete(&unit).await?;
            tx.put(&line).await?;
            tracing::info!(serial = unit.serial(), line = line.code(), "serial unregistered");
            line
        })
    }

    /// Reserve an available unit for a sale line.
    ///
    /// When the line names a warehouse the unit must be stocked there.
    #[instrument(skip(self, cmd), fields(tenant_id = %cmd.tenant_id, line_id = %cmd.line_id), err)]
    pub async fn assign_sale_serial(&self, cmd: AssignSaleSerial) -> Result<SerialUnit, EngineError> {
        let serial = normalize_serial(&cmd.serial)?;
        in_transaction!(self, cmd.tenant_id, |tx| {
            let mut line = require::<SaleLine, _>(&mut tx, cmd.line_id).await?;
            let order = require::<SaleOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            let mut unit = serial_by_key(&mut tx, &serial)
                .await?
                .ok_or_else(|| DomainError::not_found(format!("serial {serial}")))?;
            unit.ensure_product(line.product_id())?;
            if let Some(warehouse_id) = line.warehouse_id() {
                if unit.warehouse_id() != warehouse_id {
                    return Err(DomainError::validation(format!(
                        "serial {serial} is not stocked at warehouse {warehouse_id}"
                    ))
                    .into());
                }
            }
            unit.reserve(SerialHold::SaleLine(line.id()))?;
            line.assign_serial()?;
            tx.put(&unit).await?;
            tx.put(&line).await?;
            tracing::info!(serial = unit.serial(), line = line.code(), "serial reserved");
            unit
        })
    }

    /// Return a reserved unit to stock and unlink it from its draft sale line.
    #[instrument(skip(self), err)]
    pub async fn release_sale_serial(
        &self,
        tenant_id: TenantId,
        serial_id: SerialUnitId,
    ) -> Result<SaleLine, EngineError> {
        in_transaction!(self, tenant_id, |tx| {
            let mut unit = require::<SerialUnit, _>(&mut tx, serial_id).await?;
            let Some(SerialHold::SaleLine(line_id)) = unit.hold() else {
                return Err(DomainError::invalid_state(format!(
                    "serial {} is not reserved by a sale line",
                    unit.serial()
                ))
                .into());
            };
            let mut line = require::<SaleLine, _>(&mut tx, line_id).await?;
            let order = require::<SaleOrder, _>(&mut tx, line.order_id()).await?;
            order.ensure_editable()?;
            unit.release(SerialHold::SaleLine(line_id))?;
            line.unassign_serial()?;
            tx.put(&unit).await?;
            tx.put(&line).await?;
            tracing::info!(serial = unit.serial(), line = line.code(), "serial released");
            line
        })
    }
}
