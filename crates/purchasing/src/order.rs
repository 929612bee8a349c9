use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, Money, PartyId, PurchaseOrderId, TenantId, UserId,
};

use crate::line::PurchaseLine;

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
}

/// Events that a purchase order's status must accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOrderEvent {
    /// Any change to the line set, a line, or a serial assignment.
    LinesEdited,
    Approved,
}

impl PurchaseOrderStatus {
    pub fn transition(self, event: PurchaseOrderEvent) -> DomainResult<PurchaseOrderStatus> {
        match (self, event) {
            (PurchaseOrderStatus::Draft, PurchaseOrderEvent::LinesEdited) => {
                Ok(PurchaseOrderStatus::Draft)
            }
            (PurchaseOrderStatus::Draft, PurchaseOrderEvent::Approved) => {
                Ok(PurchaseOrderStatus::Approved)
            }
            (PurchaseOrderStatus::Approved, PurchaseOrderEvent::LinesEdited) => Err(
                DomainError::invalid_state("purchase order is approved and cannot be edited"),
            ),
            (PurchaseOrderStatus::Approved, PurchaseOrderEvent::Approved) => {
                Err(DomainError::invalid_state("purchase order is already approved"))
            }
        }
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub provider_id: PartyId,
    pub date: NaiveDate,
    pub created_by: UserId,
}

/// Purchase order header. Lines are separate records keyed by order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: TenantId,
    code: String,
    date: NaiveDate,
    provider_id: PartyId,
    total: Money,
    status: PurchaseOrderStatus,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// New draft order with a zero total.
    pub fn create(cmd: &CreatePurchaseOrder, code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: PurchaseOrderId::new(),
            tenant_id: cmd.tenant_id,
            code,
            date: cmd.date,
            provider_id: cmd.provider_id,
            total: Money::ZERO,
            status: PurchaseOrderStatus::Draft,
            created_by: cmd.created_by,
            created_at: now,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn provider_id(&self) -> PartyId {
        self.provider_id
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_approved(&self) -> bool {
        self.status == PurchaseOrderStatus::Approved
    }

    /// Fail unless lines may still be added, changed or removed.
    pub fn ensure_editable(&self) -> DomainResult<()> {
        self.status.transition(PurchaseOrderEvent::LinesEdited)?;
        Ok(())
    }

    /// Resum the total from the complete current line set.
    pub fn recompute_total(&mut self, lines: &[PurchaseLine]) -> DomainResult<()> {
        self.total = Money::total(lines.iter().map(PurchaseLine::subtotal))?;
        Ok(())
    }

    /// Approve the order given its complete line set.
    ///
    /// Requires at least one line and every serialized line fully assigned.
    pub fn approve(&mut self, lines: &[PurchaseLine]) -> DomainResult<()> {
        let next = self.status.transition(PurchaseOrderEvent::Approved)?;
        if lines.is_empty() {
            return Err(DomainError::invalid_state(format!(
                "purchase order {} has no lines",
                self.code
            )));
        }
        if let Some(line) = lines.iter().find(|line| !line.is_complete()) {
            return Err(DomainError::invalid_state(format!(
                "line {} has {} of {} serials assigned",
                line.code(),
                line.serials_assigned(),
                line.quantity()
            )));
        }
        self.status = next;
        Ok(())
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> PurchaseOrderId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
