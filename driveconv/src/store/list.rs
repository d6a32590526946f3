use sqlx::{Row, SqlitePool};

use super::{LinearStore, StoreError};

/// One named region of the state database.
///
/// Records are ordered by `position`. Appends take the next position past the
/// tail and front insertions take the one before the head, so neither rewrites
/// existing rows.
#[derive(Clone)]
pub struct SqliteList {
    pool: SqlitePool,
    name: String,
}

impl SqliteList {
    pub(super) fn new(pool: SqlitePool, name: &str) -> Self {
        Self {
            pool,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn header(&self) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT header FROM lists WHERE name = ?1")
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("header")?)),
            None => Ok(None),
        }
    }

    async fn value_at_end(&self, newest_first: bool) -> Result<Option<String>, StoreError> {
        let sql = if newest_first {
            "SELECT value FROM list_entries WHERE list_name = ?1 ORDER BY position DESC LIMIT 1"
        } else {
            "SELECT value FROM list_entries WHERE list_name = ?1 ORDER BY position ASC LIMIT 1"
        };
        let row = sqlx::query(sql)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn remove_at_end(&self, newest_first: bool) -> Result<Option<String>, StoreError> {
        let sql = if newest_first {
            "DELETE FROM list_entries
             WHERE list_name = ?1
               AND position = (SELECT MAX(position) FROM list_entries WHERE list_name = ?1)
             RETURNING value"
        } else {
            "DELETE FROM list_entries
             WHERE list_name = ?1
               AND position = (SELECT MIN(position) FROM list_entries WHERE list_name = ?1)
             RETURNING value"
        };
        let row = sqlx::query(sql)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }
}

impl LinearStore for SqliteList {
    async fn append(&self, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO list_entries (list_name, position, value)
             SELECT ?1, COALESCE(MAX(position), 0) + 1, ?2
             FROM list_entries WHERE list_name = ?1",
        )
        .bind(&self.name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn head_value(&self) -> Result<Option<String>, StoreError> {
        self.value_at_end(false).await
    }

    async fn tail_value(&self) -> Result<Option<String>, StoreError> {
        self.value_at_end(true).await
    }

    async fn remove_head(&self) -> Result<Option<String>, StoreError> {
        self.remove_at_end(false).await
    }

    async fn remove_tail(&self) -> Result<Option<String>, StoreError> {
        self.remove_at_end(true).await
    }

    async fn insert_after_origin(&self, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO list_entries (list_name, position, value)
             SELECT ?1, COALESCE(MIN(position), 1) - 1, ?2
             FROM list_entries WHERE list_name = ?1",
        )
        .bind(&self.name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_tail(&self, value: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE list_entries SET value = ?2
             WHERE list_name = ?1
               AND position = (SELECT MAX(position) FROM list_entries WHERE list_name = ?1)",
        )
        .bind(&self.name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM list_entries WHERE list_name = ?1")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(usize::try_from(total).unwrap_or_default())
    }

    async fn values(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT value FROM list_entries WHERE list_name = ?1 ORDER BY position ASC",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.try_get("value")?);
        }
        Ok(out)
    }
}
