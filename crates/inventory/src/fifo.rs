//! FIFO allocation planning over bulk lots.
//!
//! Planning is pure: it decides how many units to take from which lot and
//! either covers the whole request or fails, so callers mutate nothing unless
//! the full quantity is available.

use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Entity, LotId};

use crate::lot::{BulkLot, LotStatus};

/// Units taken from one lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: LotId,
    pub quantity: i64,
}

/// Total units available across receipted lots.
pub fn total_available<'a>(lots: impl IntoIterator<Item = &'a BulkLot>) -> i64 {
    lots.into_iter()
        .filter(|lot| lot.status() == LotStatus::Available)
        .map(|lot| lot.available().max(0))
        .sum()
}

/// Plan taking `quantity` units oldest-first from `lots`.
///
/// Only receipted lots with available units participate; ordering is by
/// creation time, ties broken by lot id. Fails with
/// [`DomainError::InsufficientStock`] carrying the actual available total.
pub fn plan_fifo<'a>(
    lots: impl IntoIterator<Item = &'a BulkLot>,
    quantity: i64,
    subject: &str,
) -> DomainResult<Vec<LotAllocation>> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }

    let mut candidates: Vec<&BulkLot> = lots
        .into_iter()
        .filter(|lot| lot.status() == LotStatus::Available && lot.available() > 0)
        .collect();
    candidates.sort_by_key(|lot| (lot.created_at(), lot.id()));

    let available: i64 = candidates.iter().map(|lot| lot.available()).sum();
    if available < quantity {
        return Err(DomainError::insufficient_stock(subject, quantity, available));
    }

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for lot in candidates {
        if remaining == 0 {
            break;
        }
        let take = lot.available().min(remaining);
        plan.push(LotAllocation {
            lot_id: lot.id(),
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}
