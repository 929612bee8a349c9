use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, ProductId, PurchaseLineId, SaleLineId, SerialUnitId,
    TenantId, TransferLineId, WarehouseId,
};

/// Serial unit status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialStatus {
    /// Registered on a draft purchase line.
    Draft,
    Available,
    /// Held by a draft sale line or an open transfer line.
    Reserved,
    Sold,
}

/// Events that move a serial unit between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEvent {
    PurchaseApproved,
    Reserved,
    Released,
    Sold,
    SaleReversed,
    TransferCompleted,
}

impl SerialStatus {
    pub fn transition(self, event: SerialEvent) -> DomainResult<SerialStatus> {
        use SerialEvent as E;
        use SerialStatus as S;

        match (self, event) {
            (S::Draft, E::PurchaseApproved) => Ok(S::Available),
            (S::Available, E::Reserved) => Ok(S::Reserved),
            (S::Reserved, E::Released) => Ok(S::Available),
            (S::Reserved, E::Sold) => Ok(S::Sold),
            (S::Reserved, E::TransferCompleted) => Ok(S::Available),
            (S::Sold, E::SaleReversed) => Ok(S::Available),
            (status, event) => Err(DomainError::invalid_state(format!(
                "serial unit in status {status:?} cannot accept {event:?}"
            ))),
        }
    }
}

/// The document line currently holding a serial unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "line_id", rename_all = "snake_case")]
pub enum SerialHold {
    SaleLine(SaleLineId),
    TransferLine(TransferLineId),
}

/// Input for [`SerialUnit::register`].
#[derive(Debug, Clone)]
pub struct NewSerial {
    pub tenant_id: TenantId,
    pub serial: String,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub purchase_line_id: PurchaseLineId,
    pub registered_at: DateTime<Utc>,
}

/// One physical unit of a serialized product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialUnit {
    id: SerialUnitId,
    tenant_id: TenantId,
    serial: String,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    purchase_line_id: PurchaseLineId,
    hold: Option<SerialHold>,
    status: SerialStatus,
    registered_at: DateTime<Utc>,
}

impl SerialUnit {
    /// Register a draft unit under a purchase line. The serial is trimmed.
    pub fn register(new: NewSerial) -> DomainResult<Self> {
        let serial = normalize_serial(&new.serial)?;
        Ok(Self {
            id: SerialUnitId::new(),
            tenant_id: new.tenant_id,
            serial,
            product_id: new.product_id,
            warehouse_id: new.warehouse_id,
            purchase_line_id: new.purchase_line_id,
            hold: None,
            status: SerialStatus::Draft,
            registered_at: new.registered_at,
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn purchase_line_id(&self) -> PurchaseLineId {
        self.purchase_line_id
    }

    pub fn hold(&self) -> Option<SerialHold> {
        self.hold
    }

    pub fn status(&self) -> SerialStatus {
        self.status
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// True while the unit counts toward product stock.
    pub fn is_on_hand(&self) -> bool {
        matches!(self.status, SerialStatus::Available | SerialStatus::Reserved)
    }

    /// Fail unless this unit belongs to `product_id`.
    pub fn ensure_product(&self, product_id: ProductId) -> DomainResult<()> {
        if self.product_id != product_id {
            return Err(DomainError::validation(format!(
                "serial {} belongs to another product",
                self.serial
            )));
        }
        Ok(())
    }

    /// Purchase approved: the unit becomes sellable stock.
    pub fn receipt(&mut self) -> DomainResult<()> {
        self.status = self.status.transition(SerialEvent::PurchaseApproved)?;
        Ok(())
    }

    /// Hold the unit for `hold`.
    ///
    /// Reports the exact reason a unit cannot be taken: not yet receipted,
    /// already sold, already held by this line, or held elsewhere.
    pub fn reserve(&mut self, hold: SerialHold) -> DomainResult<()> {
        match self.status {
            SerialStatus::Available => {}
            SerialStatus::Draft => {
                return Err(DomainError::invalid_state(format!(
                    "serial {} has not been received yet",
                    self.serial
                )));
            }
            SerialStatus::Sold => {
                return Err(DomainError::invalid_state(format!(
                    "serial {} is already sold",
                    self.serial
                )));
            }
            SerialStatus::Reserved if self.hold == Some(hold) => {
                return Err(DomainError::conflict(format!(
                    "serial {} is already assigned to this line",
                    self.serial
                )));
            }
            SerialStatus::Reserved => {
                let holder = match self.hold {
                    Some(SerialHold::TransferLine(_)) => "a transfer",
                    _ => "another draft sale",
                };
                return Err(DomainError::conflict(format!(
                    "serial {} is reserved by {holder}",
                    self.serial
                )));
            }
        }
        self.status = self.status.transition(SerialEvent::Reserved)?;
        self.hold = Some(hold);
        Ok(())
    }

    /// Release a hold placed by `hold`.
    pub fn release(&mut self, hold: SerialHold) -> DomainResult<()> {
        self.ensure_held_by(hold)?;
        self.status = self.status.transition(SerialEvent::Released)?;
        self.hold = None;
        Ok(())
    }

    /// Sale approved. The unit stays linked to its sale line.
    pub fn sell(&mut self, line: SaleLineId) -> DomainResult<()> {
        self.ensure_held_by(SerialHold::SaleLine(line))?;
        self.status = self.status.transition(SerialEvent::Sold)?;
        Ok(())
    }

    /// Approved sale deleted: the unit returns to stock.
    pub fn reverse_sale(&mut self, line: SaleLineId) -> DomainResult<()> {
        if self.hold != Some(SerialHold::SaleLine(line)) {
            return Err(DomainError::invalid_state(format!(
                "serial {} was not sold by this line",
                self.serial
            )));
        }
        self.status = self.status.transition(SerialEvent::SaleReversed)?;
        self.hold = None;
        Ok(())
    }

    /// Transfer completed: the unit arrives at `destination`.
    pub fn complete_transfer(
        &mut self,
        line: TransferLineId,
        destination: WarehouseId,
    ) -> DomainResult<()> {
        self.ensure_held_by(SerialHold::TransferLine(line))?;
        self.status = self.status.transition(SerialEvent::TransferCompleted)?;
        self.hold = None;
        self.warehouse_id = destination;
        Ok(())
    }

    /// Only draft units may be deleted along with their purchase line.
    pub fn ensure_removable(&self) -> DomainResult<()> {
        if self.status != SerialStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "serial {} is {:?} and cannot be removed",
                self.serial, self.status
            )));
        }
        Ok(())
    }

    fn ensure_held_by(&self, hold: SerialHold) -> DomainResult<()> {
        if self.status != SerialStatus::Reserved || self.hold != Some(hold) {
            return Err(DomainError::invalid_state(format!(
                "serial {} is not reserved by this line",
                self.serial
            )));
        }
        Ok(())
    }
}

impl Entity for SerialUnit {
    type Id = SerialUnitId;

    fn id(&self) -> SerialUnitId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Trim a serial string and reject blanks.
pub fn normalize_serial(raw: &str) -> DomainResult<String> {
    let serial = raw.trim();
    if serial.is_empty() {
        return Err(DomainError::validation("serial cannot be empty"));
    }
    Ok(serial.to_string())
}

/// Fail on the first serial that appears more than once in `serials`.
pub fn ensure_distinct<'a>(serials: impl IntoIterator<Item = &'a str>) -> DomainResult<()> {
    let mut seen = std::collections::HashSet::new();
    for serial in serials {
        if !seen.insert(serial) {
            return Err(DomainError::conflict(format!("duplicate serial {serial}")));
        }
    }
    Ok(())
}
