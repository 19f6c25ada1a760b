use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::post_attempt::PostAttempt;
use crate::error::StoreError;

use super::classify_write_error;

pub struct AttemptRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> AttemptRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PostAttempt, StoreError> {
        Ok(PostAttempt {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            post_id: row.try_get("post_id")?,
            bot_id: row.try_get("bot_id")?,
            group_id: row.try_get("group_id")?,
            chat_id: row.try_get("chat_id")?,
            message_id: row.try_get("message_id")?,
            success: row.try_get("success")?,
            deleted: row.try_get("deleted")?,
            error_code: row.try_get("error_code")?,
            error_msg: row.try_get("error_msg")?,
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<PostAttempt>, StoreError> {
        let row = sqlx::query("SELECT * FROM post_attempts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Records one forward attempt. Can fail with
    /// [`StoreError::ForeignKeyViolation`] when the parent `Post` was deleted
    /// concurrently — the scheduler's tie-break (spec §4.3: "the deletion
    /// wins, log a warning and move on").
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &mut self,
        post_id: Uuid,
        bot_id: Uuid,
        group_id: Uuid,
        chat_id: i64,
        message_id: Option<i64>,
        success: bool,
        error_code: Option<&str>,
        error_msg: Option<&str>,
    ) -> Result<PostAttempt, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO post_attempts (
                id, created_at, updated_at, version, post_id, bot_id, group_id,
                chat_id, message_id, success, deleted, error_code, error_msg
            ) VALUES (?,?,?,0,?,?,?,?,?,?,0,?,?)"#,
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(post_id)
        .bind(bot_id)
        .bind(group_id)
        .bind(chat_id)
        .bind(message_id)
        .bind(success)
        .bind(error_code)
        .bind(error_msg)
        .execute(&mut **self.tx)
        .await
        .map_err(classify_write_error)?;

        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    pub async fn list_by_post(&mut self, post_id: Uuid) -> Result<Vec<PostAttempt>, StoreError> {
        let rows = sqlx::query("SELECT * FROM post_attempts WHERE post_id = ? ORDER BY created_at DESC")
            .bind(post_id)
            .fetch_all(&mut **self.tx)
            .await?;
        rows.iter().map(Self::from_row).collect()
    }

    /// The post's most recent non-deleted successful attempt with a chat id
    /// and message id to delete (spec §4.3 step a, `delete_last_attempt`).
    pub async fn get_most_recent_deletable(&mut self, post_id: Uuid) -> Result<Option<PostAttempt>, StoreError> {
        let row = sqlx::query(
            r#"SELECT * FROM post_attempts
               WHERE post_id = ? AND success = 1 AND deleted = 0 AND message_id IS NOT NULL
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(post_id)
        .fetch_optional(&mut **self.tx)
        .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn mark_deleted(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE post_attempts SET deleted = 1, updated_at = ?, version = version + 1 WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }
}
