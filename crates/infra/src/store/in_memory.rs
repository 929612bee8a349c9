//! In-memory store for tests and development.
//!
//! Transactions buffer their writes and record the version of everything they
//! read: each record, each collection they scanned, each sequence they drew
//! from. Commit takes the write lock, re-checks those versions and either
//! applies the whole write set or fails with [`StoreError::Concurrency`]. A
//! scan is invalidated by any write to its collection, so phantom rows are
//! caught as well as lost updates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockbook_core::{ExpectedVersion, TenantId};

use super::{Collection, DocIndex, Filter, Store, StoreError, StoreTx};

#[derive(Debug, Clone)]
struct Record {
    version: u64,
    index: DocIndex,
    body: JsonValue,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<(TenantId, Collection, Uuid), Record>,
    collections: HashMap<(TenantId, Collection), u64>,
    sequences: HashMap<(TenantId, String), u64>,
}

impl State {
    fn record_version(&self, tenant_id: TenantId, collection: Collection, id: Uuid) -> u64 {
        self.records
            .get(&(tenant_id, collection, id))
            .map(|r| r.version)
            .unwrap_or(0)
    }

    fn collection_version(&self, tenant_id: TenantId, collection: Collection) -> u64 {
        self.collections
            .get(&(tenant_id, collection))
            .copied()
            .unwrap_or(0)
    }

    fn sequence(&self, tenant_id: TenantId, name: &str) -> u64 {
        self.sequences
            .get(&(tenant_id, name.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Shared in-memory store. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self, tenant_id: TenantId) -> Result<InMemoryTx, StoreError> {
        Ok(InMemoryTx {
            tenant_id,
            inner: Arc::clone(&self.inner),
            reads: HashMap::new(),
            scans: HashMap::new(),
            sequences: HashMap::new(),
            writes: HashMap::new(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct SequenceDraw {
    observed: u64,
    current: u64,
}

/// Transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    tenant_id: TenantId,
    inner: Arc<RwLock<State>>,
    reads: HashMap<(Collection, Uuid), u64>,
    scans: HashMap<Collection, u64>,
    sequences: HashMap<String, SequenceDraw>,
    /// `None` marks a deletion.
    writes: HashMap<(Collection, Uuid), Option<(DocIndex, JsonValue)>>,
}

impl InMemoryTx {
    fn read_state(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    /// Remember the version of a record the first time it is observed.
    fn observe(&mut self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        if self.reads.contains_key(&(collection, id)) {
            return Ok(());
        }
        let version = self
            .read_state()?
            .record_version(self.tenant_id, collection, id);
        self.reads.insert((collection, id), version);
        Ok(())
    }

    fn validate(&self, state: &State) -> Result<(), StoreError> {
        for ((collection, id), seen) in &self.reads {
            let actual = state.record_version(self.tenant_id, *collection, *id);
            if let Some(msg) = ExpectedVersion::observed(*seen).mismatch(actual) {
                return Err(StoreError::Concurrency(format!(
                    "{} record {id}: {msg}",
                    collection.table()
                )));
            }
        }
        for (collection, seen) in &self.scans {
            let actual = state.collection_version(self.tenant_id, *collection);
            if let Some(msg) = ExpectedVersion::Exact(*seen).mismatch(actual) {
                return Err(StoreError::Concurrency(format!(
                    "{} changed since it was read: {msg}",
                    collection.table()
                )));
            }
        }
        for (name, draw) in &self.sequences {
            if state.sequence(self.tenant_id, name) != draw.observed {
                return Err(StoreError::Concurrency(format!(
                    "sequence {name} advanced concurrently"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn get_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError> {
        if let Some(pending) = self.writes.get(&(collection, id)) {
            return Ok(pending.as_ref().map(|(_, body)| body.clone()));
        }
        let (version, body) = {
            let state = self.read_state()?;
            match state.records.get(&(self.tenant_id, collection, id)) {
                Some(record) => (record.version, Some(record.body.clone())),
                None => (0, None),
            }
        };
        self.reads.entry((collection, id)).or_insert(version);
        Ok(body)
    }

    async fn find_raw(
        &mut self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let (scan_version, stored) = {
            let state = self.read_state()?;
            let stored: Vec<(Uuid, u64, JsonValue)> = state
                .records
                .iter()
                .filter(|((tenant, coll, _), record)| {
                    *tenant == self.tenant_id && *coll == collection && filter.matches(&record.index)
                })
                .map(|((_, _, id), record)| (*id, record.version, record.body.clone()))
                .collect();
            (state.collection_version(self.tenant_id, collection), stored)
        };
        self.scans.entry(collection).or_insert(scan_version);

        let mut rows: HashMap<Uuid, JsonValue> = HashMap::new();
        for (id, version, body) in stored {
            self.reads.entry((collection, id)).or_insert(version);
            rows.insert(id, body);
        }
        for ((coll, id), pending) in &self.writes {
            if *coll != collection {
                continue;
            }
            match pending {
                Some((index, body)) if filter.matches(index) => {
                    rows.insert(*id, body.clone());
                }
                _ => {
                    rows.remove(id);
                }
            }
        }

        let mut rows: Vec<(Uuid, JsonValue)> = rows.into_iter().collect();
        rows.sort_by_key(|(id, _)| *id);
        Ok(rows.into_iter().map(|(_, body)| body).collect())
    }

    async fn put_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
        index: DocIndex,
        body: JsonValue,
    ) -> Result<(), StoreError> {
        self.observe(collection, id)?;
        self.writes.insert((collection, id), Some((index, body)));
        Ok(())
    }

    async fn delete_raw(&mut self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.observe(collection, id)?;
        self.writes.insert((collection, id), None);
        Ok(())
    }

    async fn next_sequence(&mut self, name: &str) -> Result<u64, StoreError> {
        if let Some(draw) = self.sequences.get_mut(name) {
            draw.current += 1;
            return Ok(draw.current);
        }
        let observed = self.read_state()?.sequence(self.tenant_id, name);
        let draw = SequenceDraw {
            observed,
            current: observed + 1,
        };
        self.sequences.insert(name.to_string(), draw);
        Ok(draw.current)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        self.validate(&state)?;

        for ((collection, id), pending) in &self.writes {
            let key = (self.tenant_id, *collection, *id);
            match pending {
                Some((index, body)) => {
                    let version = state.record_version(self.tenant_id, *collection, *id) + 1;
                    state.records.insert(
                        key,
                        Record {
                            version,
                            index: index.clone(),
                            body: body.clone(),
                        },
                    );
                }
                None => {
                    state.records.remove(&key);
                }
            }
            *state
                .collections
                .entry((self.tenant_id, *collection))
                .or_insert(0) += 1;
        }
        for (name, draw) in &self.sequences {
            state
                .sequences
                .insert((self.tenant_id, name.clone()), draw.current);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
