//! Durable ordered lists backing the folder queue and the folder stack.
//!
//! Every list lives in its own named region of the state database: a header
//! record (the origin, never returned as data) plus ordered data records.

mod list;

use std::{fs, path::Path};

use sqlx::{SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions};
use thiserror::Error;

pub use list::SqliteList;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered sequence of string records with a reserved origin.
///
/// `None` stands for "no data record at that end". Every call is durable once
/// it returns.
#[allow(async_fn_in_trait)]
pub trait LinearStore {
    async fn append(&self, value: &str) -> Result<(), StoreError>;

    async fn head_value(&self) -> Result<Option<String>, StoreError>;

    async fn tail_value(&self) -> Result<Option<String>, StoreError>;

    async fn remove_head(&self) -> Result<Option<String>, StoreError>;

    async fn remove_tail(&self) -> Result<Option<String>, StoreError>;

    async fn insert_after_origin(&self, value: &str) -> Result<(), StoreError>;

    /// Overwrites the tail record in place. Returns false when there is none.
    async fn replace_tail(&self, value: &str) -> Result<bool, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    async fn values(&self) -> Result<Vec<String>, StoreError>;

    async fn is_empty_at_head(&self) -> Result<bool, StoreError> {
        Ok(self.head_value().await?.is_none())
    }

    async fn is_empty_at_tail(&self) -> Result<bool, StoreError> {
        Ok(self.tail_value().await?.is_none())
    }
}

#[derive(Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn open_path(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Creates the named list with its header marker if it is absent and
    /// rewrites the marker otherwise. Existing data records are kept.
    pub async fn ensure_list(&self, name: &str, header: &str) -> Result<SqliteList, StoreError> {
        sqlx::query(
            "INSERT INTO lists (name, header) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET header = excluded.header",
        )
        .bind(name)
        .bind(header)
        .execute(&self.pool)
        .await?;
        Ok(self.list(name))
    }

    pub fn list(&self, name: &str) -> SqliteList {
        SqliteList::new(self.pool.clone(), name)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
