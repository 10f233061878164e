//! Read-only connection to the management server's database
//!
//! Used for out-of-band verification only. Nothing here writes, and nothing
//! orders these reads against the API path.

use crate::config::DatabaseConfig;
use crate::error::Result;
use serde::Serialize;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::info;

/// Persisted state of one async job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsyncJobRecord {
    pub status: i64,
    pub created: Option<String>,
    pub last_updated: Option<String>,
}

pub struct DbConnection {
    pool: AnyPool,
}

impl DbConnection {
    /// Connect to the MySQL database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to database {} on {}:{}",
            config.name, config.host, config.port
        );
        Self::connect_url(&config.url()).await
    }

    /// Connect to any database URL sqlx understands
    pub async fn connect_url(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new().max_connections(4).connect(url).await?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Run a read-only query
    pub async fn fetch_all(&self, sql: &str) -> Result<Vec<AnyRow>> {
        Ok(sqlx::query(sql).fetch_all(&self.pool).await?)
    }

    /// Persisted state of the job with the given uuid
    pub async fn async_job_record(&self, job_id: &str) -> Result<Option<AsyncJobRecord>> {
        let row = sqlx::query(
            "SELECT CAST(job_status AS SIGNED) AS job_status, \
                    CAST(created AS CHAR) AS created, \
                    CAST(last_updated AS CHAR) AS last_updated \
             FROM async_job WHERE uuid = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(AsyncJobRecord {
            status: row.try_get("job_status")?,
            created: row.try_get("created")?,
            last_updated: row.try_get("last_updated")?,
        }))
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}
