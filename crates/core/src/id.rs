//! Strongly-typed identifiers used across the domain.
//!
//! Every entity id lives here (rather than in its domain crate) because the
//! stock ledger references order lines and the order crates reference lots and
//! serials; keeping ids in the leaf crate avoids dependency cycles.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a tenant (multi-tenant boundary).
    TenantId,
    "TenantId"
);
uuid_newtype!(
    /// Identifier of a user (actor identity).
    UserId,
    "UserId"
);
uuid_newtype!(ProductId, "ProductId");
uuid_newtype!(
    /// Warehouse owned by the tenancy collaborator; the engine only references it.
    WarehouseId,
    "WarehouseId"
);
uuid_newtype!(
    /// Provider or client of an order; owned outside the engine.
    PartyId,
    "PartyId"
);
uuid_newtype!(PurchaseOrderId, "PurchaseOrderId");
uuid_newtype!(PurchaseLineId, "PurchaseLineId");
uuid_newtype!(SaleOrderId, "SaleOrderId");
uuid_newtype!(SaleLineId, "SaleLineId");
uuid_newtype!(SerialUnitId, "SerialUnitId");
uuid_newtype!(LotId, "LotId");
uuid_newtype!(TransferId, "TransferId");
uuid_newtype!(TransferLineId, "TransferLineId");
