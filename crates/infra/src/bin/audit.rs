//! `stockbook-audit <tenant-id>`: reconcile one tenant's persisted records.
//!
//! Prints the report as JSON and exits non-zero when drift is found.

use std::process::ExitCode;

use anyhow::{Context, bail};

use stockbook_core::TenantId;
use stockbook_infra::{Engine, EngineConfig, PostgresStore, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    stockbook_observability::init();

    let raw = std::env::args()
        .nth(1)
        .context("usage: stockbook-audit <tenant-id>")?;
    let tenant_id: TenantId = raw
        .parse()
        .with_context(|| format!("invalid tenant id {raw:?}"))?;

    let database_url = match StoreConfig::from_env()? {
        StoreConfig::Postgres { database_url } => database_url,
        StoreConfig::InMemory => {
            bail!("auditing needs persisted data; set USE_PERSISTENT_STORES=true and DATABASE_URL")
        }
    };

    let store = PostgresStore::connect(&database_url)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to apply schema")?;

    let engine = Engine::with_config(store, EngineConfig::from_env()?);
    let report = engine.audit(tenant_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(findings = report.findings.len(), "drift detected");
        Ok(ExitCode::FAILURE)
    }
}
