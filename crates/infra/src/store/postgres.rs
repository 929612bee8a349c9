//! Postgres-backed store.
//!
//! Each collection is a table of JSONB documents keyed by `(tenant_id, id)`
//! with the [`DocIndex`] columns alongside. Transactions run at SERIALIZABLE
//! isolation, so conflicting concurrent work aborts instead of interleaving.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `40001` | `Concurrency` | Serialization failure under SERIALIZABLE |
//! | `40P01` | `Concurrency` | Deadlock detected |
//! | `23505` | `Concurrency` | Unique violation (racing serial or sequence insert) |
//! | Any other | `Backend` | Other database errors |

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockbook_core::TenantId;

use super::{Collection, DocIndex, Filter, Store, StoreError, StoreTx};

const SCHEMA: &str = include_str!("../../migrations/0001_stockbook.sql");

/// Postgres store. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self, tenant_id: TenantId) -> Result<PostgresTx, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        Ok(PostgresTx { tenant_id, tx })
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTx {
    tenant_id: TenantId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn get_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<JsonValue>, StoreError> {
        let sql = format!(
            "SELECT body FROM {} WHERE tenant_id = $1 AND id = $2",
            collection.table()
        );
        let row = sqlx::query(&sql)
            .bind(*self.tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.map(|r| r.try_get::<JsonValue, _>("body"))
            .transpose()
            .map_err(|e| map_sqlx_error("get", e))
    }

    async fn find_raw(
        &mut self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let sql = format!(
            r#"
            SELECT body FROM {}
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR parent_id = $2)
              AND ($3::uuid IS NULL OR link_id = $3)
              AND ($4::uuid IS NULL OR product_id = $4)
              AND ($5::uuid IS NULL OR warehouse_id = $5)
              AND ($6::text IS NULL OR lookup_key = $6)
            ORDER BY id ASC
            "#,
            collection.table()
        );
        let rows = sqlx::query(&sql)
            .bind(*self.tenant_id.as_uuid())
            .bind(filter.parent)
            .bind(filter.link)
            .bind(filter.product)
            .bind(filter.warehouse)
            .bind(filter.key.as_deref())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;
        rows.iter()
            .map(|r| r.try_get::<JsonValue, _>("body"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("find", e))
    }

    async fn put_raw(
        &mut self,
        collection: Collection,
        id: Uuid,
        index: DocIndex,
        body: JsonValue,
    ) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {table} (
                tenant_id, id, parent_id, link_id, product_id, warehouse_id, lookup_key, body
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, id) DO UPDATE SET
                parent_id = EXCLUDED.parent_id,
                link_id = EXCLUDED.link_id,
                product_id = EXCLUDED.product_id,
                warehouse_id = EXCLUDED.warehouse_id,
                lookup_key = EXCLUDED.lookup_key,
                body = EXCLUDED.body,
                version = {table}.version + 1,
                updated_at = now()
            "#,
            table = collection.table()
        );
        sqlx::query(&sql)
            .bind(*self.tenant_id.as_uuid())
            .bind(id)
            .bind(index.parent)
            .bind(index.link)
            .bind(index.product)
            .bind(index.warehouse)
            .bind(index.key)
            .bind(body)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("put", e))?;
        Ok(())
    }

    async fn delete_raw(&mut self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND id = $2",
            collection.table()
        );
        sqlx::query(&sql)
            .bind(*self.tenant_id.as_uuid())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(())
    }

    async fn next_sequence(&mut self, name: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sequences (tenant_id, name, value)
            VALUES ($1, $2, 1)
            ON CONFLICT (tenant_id, name) DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(*self.tenant_id.as_uuid())
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_sequence", e))?;
        let value: i64 = row
            .try_get("value")
            .map_err(|e| map_sqlx_error("next_sequence", e))?;
        u64::try_from(value)
            .map_err(|_| StoreError::Backend(format!("sequence {name} holds negative value {value}")))
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("decode error in {}: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
