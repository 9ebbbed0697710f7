use sqlx::Row;

use soberly_core::domain::journal::{JournalEntry, JournalEntryId};
use soberly_core::domain::user::UserId;

use super::{decode_error, decode_timestamp, encode_timestamp, JournalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlJournalRepository {
    pool: DbPool,
}

impl SqlJournalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<JournalEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let content: String = row.try_get("content").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(JournalEntry {
        id: JournalEntryId(id),
        user_id: UserId(user_id),
        title,
        content,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl JournalRepository for SqlJournalRepository {
    async fn insert(&self, entry: JournalEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO journal_entries (id, user_id, title, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(entry.user_id.as_str())
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(encode_timestamp(entry.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, content, created_at
             FROM journal_entries
             WHERE user_id = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}
