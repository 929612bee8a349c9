//! `stockbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, money arithmetic and the optimistic
//! version check shared by every store.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    LotId, PartyId, ProductId, PurchaseLineId, PurchaseOrderId, SaleLineId,
    SaleOrderId, SerialUnitId, TenantId, TransferId, TransferLineId, UserId, WarehouseId,
};
pub use money::Money;
pub use value_object::ValueObject;
pub use version::ExpectedVersion;
