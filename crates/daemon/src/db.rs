use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_core::error::StoreError;
use warden_core::model::{ServerStatus, StatusRecord};
use warden_core::{now_ms, EpochMs};

use surrealdb::engine::local::SurrealKv;
use surrealdb::Surreal;

pub type SurrealConn = surrealdb::engine::local::Db;
pub type SurrealDb = Surreal<SurrealConn>;

const TABLE: &str = "status";
const STATUS_KEY: &str = "server_status";
const COUNT_KEY: &str = "players_count";

/// Embedded status store: one table, two records, each carrying its own
/// write timestamp so a status write never touches the count's clock.
#[derive(Clone)]
pub struct StatusDb {
    inner: SurrealDb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRow {
    value: String,
    updated_at_ms: EpochMs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CountRow {
    value: u32,
    updated_at_ms: EpochMs,
}

impl StatusDb {
    pub async fn connect(db_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(db_dir)
            .with_context(|| format!("creating db_dir {}", db_dir.display()))?;

        let db_path = db_dir
            .to_str()
            .context("db_dir must be valid utf-8")?
            .to_string();

        let inner = Surreal::new::<SurrealKv>(db_path)
            .await
            .context("connecting to embedded SurrealKV")?;

        inner
            .use_ns("warden")
            .use_db("status")
            .await
            .context("selecting namespace/database")?;

        Ok(Self { inner })
    }

    /// Seeds missing records: a fresh deployment starts as stopped/empty.
    pub async fn bootstrap(&self) -> Result<()> {
        let status: Option<StatusRow> = self.inner.select((TABLE, STATUS_KEY)).await?;
        if status.is_none() {
            let _: Option<StatusRow> = self
                .inner
                .create((TABLE, STATUS_KEY))
                .content(StatusRow {
                    value: ServerStatus::Stopped.as_str().into(),
                    updated_at_ms: now_ms(),
                })
                .await?;
        }

        let count: Option<CountRow> = self.inner.select((TABLE, COUNT_KEY)).await?;
        if count.is_none() {
            let _: Option<CountRow> = self
                .inner
                .create((TABLE, COUNT_KEY))
                .content(CountRow {
                    value: 0,
                    updated_at_ms: now_ms(),
                })
                .await?;
        }

        Ok(())
    }
}

fn store_err(e: surrealdb::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl warden_core::provider::StatusStore for StatusDb {
    async fn load(&self) -> Result<StatusRecord, StoreError> {
        let status: Option<StatusRow> = self
            .inner
            .select((TABLE, STATUS_KEY))
            .await
            .map_err(store_err)?;
        let count: Option<CountRow> = self
            .inner
            .select((TABLE, COUNT_KEY))
            .await
            .map_err(store_err)?;

        let status = status.ok_or(StoreError::Missing(STATUS_KEY))?;
        let count = count.ok_or(StoreError::Missing(COUNT_KEY))?;

        let parsed = ServerStatus::parse(&status.value)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", status.value)))?;

        Ok(StatusRecord {
            status: parsed,
            count: count.value,
            status_updated_at_ms: status.updated_at_ms,
            count_updated_at_ms: count.updated_at_ms,
        })
    }

    async fn set_status(&self, status: ServerStatus) -> Result<(), StoreError> {
        let _: Option<StatusRow> = self
            .inner
            .update((TABLE, STATUS_KEY))
            .content(StatusRow {
                value: status.as_str().into(),
                updated_at_ms: now_ms(),
            })
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn set_count(&self, count: u32) -> Result<(), StoreError> {
        let _: Option<CountRow> = self
            .inner
            .update((TABLE, COUNT_KEY))
            .content(CountRow {
                value: count,
                updated_at_ms: now_ms(),
            })
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
