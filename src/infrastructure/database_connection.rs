// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS job_listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS jobs_descriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id INTEGER NOT NULL REFERENCES job_listings (id) ON DELETE CASCADE,
        description TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS jobs_companies (
        job_id INTEGER NOT NULL REFERENCES job_listings (id) ON DELETE CASCADE,
        company_id INTEGER NOT NULL REFERENCES companies (id) ON DELETE CASCADE,
        PRIMARY KEY (job_id, company_id)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_companies_name ON companies (name)",
    "CREATE INDEX IF NOT EXISTS idx_job_listings_title ON job_listings (title)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_descriptions_job_id ON jobs_descriptions (job_id)",
];

pub struct DatabaseConnection {
    pool: SqlitePool,
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 1).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_memory_url(database_url) {
            // Every connection to `:memory:` is a separate database, so the
            // pool must hold exactly one connection and never recycle it.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {parent:?}"))?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?
        };

        info!("🗄️ Connected to database: {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the listing schema. Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema statement")?;
        }
        debug!("Schema applied ({} statements)", SCHEMA.len());
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        // second run must be a no-op
        db.migrate().await?;

        for table in ["companies", "job_listings", "jobs_descriptions", "jobs_companies"] {
            let found = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(table)
                .fetch_optional(db.pool())
                .await?;
            assert!(found.is_some(), "missing table {table}");
        }
        Ok(())
    }
}
