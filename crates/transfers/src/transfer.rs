use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Entity, TenantId, TransferId, WarehouseId};

/// Transfer status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    LinesEdited,
    Completed,
}

impl TransferStatus {
    pub fn transition(self, event: TransferEvent) -> DomainResult<TransferStatus> {
        match (self, event) {
            (TransferStatus::Draft, TransferEvent::LinesEdited) => Ok(TransferStatus::Draft),
            (TransferStatus::Draft, TransferEvent::Completed) => Ok(TransferStatus::Completed),
            (TransferStatus::Completed, _) => {
                Err(DomainError::invalid_state("transfer is already completed"))
            }
        }
    }
}

/// Command: CreateTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub tenant_id: TenantId,
    pub origin_id: WarehouseId,
    pub destination_id: WarehouseId,
    pub date: NaiveDate,
}

/// Transfer header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    id: TransferId,
    tenant_id: TenantId,
    code: String,
    date: NaiveDate,
    origin_id: WarehouseId,
    destination_id: WarehouseId,
    status: TransferStatus,
    created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn create(cmd: &CreateTransfer, code: String, now: DateTime<Utc>) -> DomainResult<Self> {
        if cmd.origin_id == cmd.destination_id {
            return Err(DomainError::validation(
                "origin and destination warehouses must differ",
            ));
        }
        Ok(Self {
            id: TransferId::new(),
            tenant_id: cmd.tenant_id,
            code,
            date: cmd.date,
            origin_id: cmd.origin_id,
            destination_id: cmd.destination_id,
            status: TransferStatus::Draft,
            created_at: now,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn origin_id(&self) -> WarehouseId {
        self.origin_id
    }

    pub fn destination_id(&self) -> WarehouseId {
        self.destination_id
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ensure_editable(&self) -> DomainResult<()> {
        self.status.transition(TransferEvent::LinesEdited)?;
        Ok(())
    }

    /// Mark the transfer completed; it must carry at least one line.
    pub fn complete(&mut self, line_count: usize) -> DomainResult<()> {
        let next = self.status.transition(TransferEvent::Completed)?;
        if line_count == 0 {
            return Err(DomainError::invalid_state(format!(
                "transfer {} has no lines",
                self.code
            )));
        }
        self.status = next;
        Ok(())
    }
}

impl Entity for Transfer {
    type Id = TransferId;

    fn id(&self) -> TransferId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
