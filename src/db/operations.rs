use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::models::ConnectionRecord;
use crate::db::store::ConnectionStore;
use crate::error::StoreError;

pub struct PgConnectionStore {
    pool: Arc<PgPool>,
}

impl PgConnectionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::new_with_options(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.acquire_timeout_secs),
        )
        .await
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool: Arc::new(pool) };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Connection store migrations applied");
        Ok(())
    }

    pub async fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
        }
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn insert_if_absent(&self, record: &ConnectionRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO connections (connection_id, channel, connected_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (connection_id) DO NOTHING
            "#,
        )
        .bind(&record.connection_id)
        .bind(&record.channel)
        .bind(record.connected_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM connections WHERE connection_id = $1")
            .bind(connection_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_channel(&self, channel: &str) -> Result<Vec<ConnectionRecord>, StoreError> {
        let records = sqlx::query_as::<_, ConnectionRecord>(
            r#"
            SELECT connection_id, channel, connected_at
            FROM connections
            WHERE channel = $1
            ORDER BY connected_at, connection_id
            "#,
        )
        .bind(channel)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }

    async fn get(&self, connection_id: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        let record = sqlx::query_as::<_, ConnectionRecord>(
            "SELECT connection_id, channel, connected_at FROM connections WHERE connection_id = $1",
        )
        .bind(connection_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Debug, Clone)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
