use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Entity, Money, PartyId, SaleOrderId, TenantId, UserId};

use crate::line::SaleLine;

/// Sale order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleOrderStatus {
    Draft,
    Approved,
}

/// Events that a sale order's status must accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleOrderEvent {
    LinesEdited,
    Approved,
}

impl SaleOrderStatus {
    pub fn transition(self, event: SaleOrderEvent) -> DomainResult<SaleOrderStatus> {
        match (self, event) {
            (SaleOrderStatus::Draft, SaleOrderEvent::LinesEdited) => Ok(SaleOrderStatus::Draft),
            (SaleOrderStatus::Draft, SaleOrderEvent::Approved) => Ok(SaleOrderStatus::Approved),
            (SaleOrderStatus::Approved, SaleOrderEvent::LinesEdited) => Err(
                DomainError::invalid_state("sale order is approved and cannot be edited"),
            ),
            (SaleOrderStatus::Approved, SaleOrderEvent::Approved) => {
                Err(DomainError::invalid_state("sale order is already approved"))
            }
        }
    }
}

/// Command: CreateSaleOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSaleOrder {
    pub tenant_id: TenantId,
    pub client_id: PartyId,
    pub date: NaiveDate,
    pub created_by: UserId,
}

/// Sale order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOrder {
    id: SaleOrderId,
    tenant_id: TenantId,
    code: String,
    date: NaiveDate,
    client_id: PartyId,
    total: Money,
    status: SaleOrderStatus,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl SaleOrder {
    pub fn create(cmd: &CreateSaleOrder, code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: SaleOrderId::new(),
            tenant_id: cmd.tenant_id,
            code,
            date: cmd.date,
            client_id: cmd.client_id,
            total: Money::ZERO,
            status: SaleOrderStatus::Draft,
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

    pub fn client_id(&self) -> PartyId {
        self.client_id
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> SaleOrderStatus {
        self.status
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_approved(&self) -> bool {
        self.status == SaleOrderStatus::Approved
    }

    pub fn ensure_editable(&self) -> DomainResult<()> {
        self.status.transition(SaleOrderEvent::LinesEdited)?;
        Ok(())
    }

    /// Resum the total from the complete current line set.
    pub fn recompute_total(&mut self, lines: &[SaleLine]) -> DomainResult<()> {
        self.total = Money::total(lines.iter().map(SaleLine::subtotal))?;
        Ok(())
    }

    /// Check everything approval needs that the order alone can decide.
    ///
    /// Stock coverage is checked separately by the caller before [`Self::approve`].
    pub fn ensure_approvable(&self, lines: &[SaleLine]) -> DomainResult<()> {
        self.status.transition(SaleOrderEvent::Approved)?;
        if lines.is_empty() {
            return Err(DomainError::invalid_state(format!(
                "sale order {} has no lines",
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
        Ok(())
    }

    pub fn approve(&mut self, lines: &[SaleLine]) -> DomainResult<()> {
        self.ensure_approvable(lines)?;
        self.status = self.status.transition(SaleOrderEvent::Approved)?;
        Ok(())
    }
}

impl Entity for SaleOrder {
    type Id = SaleOrderId;

    fn id(&self) -> SaleOrderId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
