//! Transactional document store boundary.
//!
//! Every engine operation runs inside one [`StoreTx`] bound to a single
//! tenant. Records are JSON documents grouped into collections, each carrying
//! a few indexed columns ([`DocIndex`]) so related records can be found
//! without loading a whole collection. Conflicting concurrent transactions
//! fail at commit (or earlier) with [`StoreError::Concurrency`].

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockbook_core::{Entity, TenantId};

/// Errors surfaced by a store implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another transaction changed data this one depends on. Retriable.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Record collections. One table per collection in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Products,
    PurchaseOrders,
    PurchaseLines,
    SaleOrders,
    SaleLines,
    SerialUnits,
    BulkLots,
    Transfers,
    TransferLines,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::PurchaseOrders => "purchase_orders",
            Collection::PurchaseLines => "purchase_lines",
            Collection::SaleOrders => "sale_orders",
            Collection::SaleLines => "sale_lines",
            Collection::SerialUnits => "serial_units",
            Collection::BulkLots => "bulk_lots",
            Collection::Transfers => "transfers",
            Collection::TransferLines => "transfer_lines",
        }
    }
}

/// Indexed columns of a record.
///
/// `parent` is the owning document (order, purchase line, transfer), `link`
/// an optional secondary reference (the line currently holding a serial) and
/// `key` a tenant-unique natural key (serial string).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocIndex {
    pub parent: Option<Uuid>,
    pub link: Option<Uuid>,
    pub product: Option<Uuid>,
    pub warehouse: Option<Uuid>,
    pub key: Option<String>,
}

/// Conjunction of equality conditions over [`DocIndex`] columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub parent: Option<Uuid>,
    pub link: Option<Uuid>,
    pub product: Option<Uuid>,
    pub warehouse: Option<Uuid>,
    pub key: Option<String>,
}

impl Filter {
    /// Matches every record in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parent(mut self, id: impl Into<Uuid>) -> Self {
        self.parent = Some(id.into());
        self
    }

    pub fn link(mut self, id: impl Into<Uuid>) -> Self {
        self.link = Some(id.into());
        self
    }

    pub fn product(mut self, id: impl Into<Uuid>) -> Self {
        self.product = Some(id.into());
        self
    }

    pub fn warehouse(mut self, id: impl Into<Uuid>) -> Self {
        self.warehouse = Some(id.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn matches(&self, index: &DocIndex) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            want.is_none() || want == have
        }
        eq(&self.parent, &index.parent)
            && eq(&self.link, &index.link)
            && eq(&self.product, &index.product)
            && eq(&self.warehouse, &index.warehouse)
            && eq(&self.key, &index.key)
    }
}

/// A domain type persisted as a document.
pub trait Document: Entity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human-readable name used in not-found errors.
    const LABEL: &'static str;

    fn index(&self) -> DocIndex;
}

/// Opens tenant-bound transactions.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    async fn begin(&self, tenant_id: TenantId) -> Result<Self::Tx, StoreError>;
}

/// One unit of work against a single tenant's records.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    fn tenant_id(&self) -> TenantId;

    async fn get_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError>;

    /// Records matching `filter`, ordered by id.
    async fn find_raw(
        &mut self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<JsonValue>, StoreError>;

    async fn put_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
        index: DocIndex,
        body: JsonValue,
    ) -> Result<(), StoreError>;

    async fn delete_raw(&mut self, collection: Collection, id: Uuid) -> Result<(), StoreError>;

    /// Increment and return the named per-tenant counter (first value is 1).
    async fn next_sequence(&mut self, name: &str) -> Result<u64, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Typed access on top of [`StoreTx`].
#[async_trait]
pub trait DocumentTx: StoreTx {
    async fn get<D: Document>(&mut self, id: D::Id) -> Result<Option<D>, StoreError> {
        let tenant_id = self.tenant_id();
        match self.get_raw(D::COLLECTION, id.into()).await? {
            Some(body) => decode::<D>(tenant_id, body).map(Some),
            None => Ok(None),
        }
    }

    async fn find<D: Document>(&mut self, filter: Filter) -> Result<Vec<D>, StoreError> {
        let tenant_id = self.tenant_id();
        self.find_raw(D::COLLECTION, &filter)
            .await?
            .into_iter()
            .map(|body| decode::<D>(tenant_id, body))
            .collect()
    }

    async fn put<D: Document>(&mut self, doc: &D) -> Result<(), StoreError> {
        if doc.tenant_id() != self.tenant_id() {
            return Err(StoreError::TenantIsolation(format!(
                "{} belongs to tenant {}",
                D::LABEL,
                doc.tenant_id()
            )));
        }
        let body = serde_json::to_value(doc)
            .map_err(|e| StoreError::Serialization(format!("encode {}: {e}", D::LABEL)))?;
        self.put_raw(D::COLLECTION, doc.id().into(), doc.index(), body)
            .await
    }

    async fn delete<D: Document>(&mut self, doc: &D) -> Result<(), StoreError> {
        self.delete_raw(D::COLLECTION, doc.id().into()).await
    }
}

impl<T: StoreTx> DocumentTx for T {}

fn decode<D: Document>(tenant_id: TenantId, body: JsonValue) -> Result<D, StoreError> {
    let doc: D = serde_json::from_value(body)
        .map_err(|e| StoreError::Serialization(format!("decode {}: {e}", D::LABEL)))?;
    if doc.tenant_id() != tenant_id {
        let id: Uuid = doc.id().into();
        return Err(StoreError::TenantIsolation(format!(
            "{} {id} is owned by another tenant",
            D::LABEL
        )));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let index = DocIndex {
            parent: Some(Uuid::now_v7()),
            key: Some("S1".into()),
            ..DocIndex::default()
        };
        assert!(Filter::all().matches(&index));
        assert!(Filter::all().matches(&DocIndex::default()));
    }

    #[test]
    fn filter_requires_every_condition() {
        let parent = Uuid::now_v7();
        let product = Uuid::now_v7();
        let index = DocIndex {
            parent: Some(parent),
            product: Some(product),
            ..DocIndex::default()
        };
        assert!(Filter::all().parent(parent).product(product).matches(&index));
        assert!(!Filter::all().parent(parent).warehouse(Uuid::now_v7()).matches(&index));
        assert!(!Filter::all().key("S1").matches(&index));
    }
}
