//! Products domain module.
//!
//! This crate contains the product catalog rules the reconciliation engine
//! relies on: the stock tracking regime and the aggregate stock counter,
//! implemented purely as deterministic domain logic (no IO, no storage).

pub mod product;

pub use product::{ChangeStockType, CreateProduct, Product, ProductStatus, StockType};
