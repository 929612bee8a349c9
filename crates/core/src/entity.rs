//! Entity trait: identity + continuity across state changes.

use uuid::Uuid;

use crate::id::TenantId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + Into<Uuid> + 'static;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Tenant owning this entity. Every entity is scoped to exactly one.
    fn tenant_id(&self) -> TenantId;
}
