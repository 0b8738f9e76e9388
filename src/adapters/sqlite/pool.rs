//! Pool setup for the ledger database.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::models::DatabaseConfig;

static LEDGER_MIGRATIONS: Migrator = sqlx::migrate!("./migrations");

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Invalid database URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Cannot create database directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot open ledger database: {0}")]
    Open(#[source] sqlx::Error),
    #[error("Ledger schema migration failed: {0}")]
    Migration(#[from] MigrateError),
}

/// Open the configured ledger and bring its schema up to date.
///
/// The file and its parent directory are created on first use. File
/// databases run in WAL mode so readers never block the single writer.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let url = config.url();
    prepare_parent_dir(&config.path)?;

    let options = parse_options(&url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(DatabaseError::Open)?;

    migrate(&pool).await?;
    tracing::debug!(path = %config.path, "Ledger database ready");
    Ok(pool)
}

/// Migrated in-memory ledger for tests.
///
/// Pinned to one connection that is never recycled: an in-memory database
/// disappears with the last connection that holds it.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(parse_options(IN_MEMORY_URL)?.foreign_keys(true))
        .await
        .map_err(DatabaseError::Open)?;

    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<(), DatabaseError> {
    LEDGER_MIGRATIONS.run(pool).await?;
    Ok(())
}

fn parse_options(url: &str) -> Result<SqliteConnectOptions, DatabaseError> {
    SqliteConnectOptions::from_str(url).map_err(|source| DatabaseError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

fn prepare_parent_dir(path: &str) -> Result<(), DatabaseError> {
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::Directory {
                path: dir.display().to_string(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nested_ledger_path_is_created_and_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.db");
        let config = DatabaseConfig {
            path: path.display().to_string(),
            max_connections: 2,
        };

        let pool = initialize_database(&config).await.unwrap();
        assert!(path.exists());

        let (tables,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'requirements'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn reinitializing_skips_applied_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("ledger.db").display().to_string(),
            max_connections: 1,
        };

        let first = initialize_database(&config).await.unwrap();
        first.close().await;
        let second = initialize_database(&config).await.unwrap();

        let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&second)
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }
}
