use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::distribution::{DistributionSummary, PostConfig, SourceRef};
use crate::domain::post::{Post, PostStatus};
use crate::error::StoreError;

use super::classify_write_error;

/// Post statuses that still hold the one-active-post-per-group slot (spec §3).
const ACTIVE_STATUSES: [&str; 3] = ["active", "paused", "error"];

pub struct PostRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> PostRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Post, StoreError> {
        let status_str: String = row.try_get("status")?;
        let status = status_str
            .parse::<PostStatus>()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Post {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            group_id: row.try_get("group_id")?,
            bot_id: row.try_get("bot_id")?,
            status,
            target_chat_id: row.try_get("target_chat_id")?,
            distribution_name: row.try_get("distribution_name")?,
            source_channel_username: row.try_get("source_channel_username")?,
            source_channel_id: row.try_get("source_channel_id")?,
            source_message_id: row.try_get("source_message_id")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
            last_error: row.try_get("last_error")?,
            count_attempts: row.try_get("count_attempts")?,
            target_attempts: row.try_get("target_attempts")?,
            delete_last_attempt: row.try_get("delete_last_attempt")?,
            pin_after_post: row.try_get("pin_after_post")?,
            num_attempt_for_pin_post: row.try_get("num_attempt_for_pin_post")?,
            pause_between_attempts_s: row.try_get("pause_between_attempts_s")?,
            notify_on_failure: row.try_get("notify_on_failure")?,
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Creates a Post for `group_id`/source triple. First deletes any Post
    /// with the same (`group_id`, `source_channel_username`,
    /// `source_message_id`) — the compensating rule for operator
    /// re-submission of the same source (spec §4.1).
    pub async fn create(
        &mut self,
        group_id: Uuid,
        bot_id: Option<Uuid>,
        target_chat_id: i64,
        distribution_name: Option<&str>,
        source: &SourceRef,
        config: &PostConfig,
    ) -> Result<Post, StoreError> {
        sqlx::query(
            "DELETE FROM posts WHERE group_id = ? AND source_channel_username = ? AND source_message_id = ?",
        )
        .bind(group_id)
        .bind(&source.source_channel_username)
        .bind(source.source_message_id)
        .execute(&mut **self.tx)
        .await?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO posts (
                id, created_at, updated_at, version, group_id, bot_id, status,
                target_chat_id, distribution_name, source_channel_username,
                source_channel_id, source_message_id, last_attempt_at, last_error,
                count_attempts, target_attempts, delete_last_attempt, pin_after_post,
                num_attempt_for_pin_post, pause_between_attempts_s, notify_on_failure
            ) VALUES (?,?,?,0,?,?,'active',?,?,?,?,?,NULL,NULL,0,?,?,?,?,?,?)"#,
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(group_id)
        .bind(bot_id)
        .bind(target_chat_id)
        .bind(distribution_name)
        .bind(&source.source_channel_username)
        .bind(source.source_channel_id)
        .bind(source.source_message_id)
        .bind(config.target_attempts)
        .bind(config.delete_last_attempt)
        .bind(config.pin_after_post)
        .bind(config.num_attempt_for_pin_post)
        .bind(config.pause_between_attempts_s)
        .bind(config.notify_on_failure)
        .execute(&mut **self.tx)
        .await
        .map_err(classify_write_error)?;

        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    pub async fn list_by_bot(&mut self, bot_id: Uuid, limit: i64) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query("SELECT * FROM posts WHERE bot_id = ? ORDER BY created_at DESC LIMIT ?")
            .bind(bot_id)
            .bind(limit)
            .fetch_all(&mut **self.tx)
            .await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn list_by_group(&mut self, group_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query("SELECT * FROM posts WHERE group_id = ? ORDER BY created_at DESC")
            .bind(group_id)
            .fetch_all(&mut **self.tx)
            .await?;
        rows.iter().map(Self::from_row).collect()
    }

    /// The group's current non-done post, if any — used by `create` in
    /// `replace` mode and by group-stealing (spec §4.2 "Add groups").
    pub async fn get_active_by_group(&mut self, group_id: Uuid) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM posts WHERE group_id = ? AND status IN ('active','paused','error') LIMIT 1",
        )
        .bind(group_id)
        .fetch_optional(&mut **self.tx)
        .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// For each group, the distribution name of its current non-done post,
    /// if any (spec §4.1 `groups_distribution_usage`).
    pub async fn groups_distribution_usage(&mut self, group_ids: &[Uuid]) -> Result<HashMap<Uuid, Option<String>>, StoreError> {
        let mut out = HashMap::new();
        for &group_id in group_ids {
            if let Some(post) = self.get_active_by_group(group_id).await? {
                out.insert(group_id, post.distribution_name);
            }
        }
        Ok(out)
    }

    /// Deletes the non-done posts (`active`/`paused`/`error`) for exactly
    /// these groups — the `replace`-mode and group-stealing primitive (spec
    /// §4.2). Attempts cascade via `ON DELETE CASCADE`.
    pub async fn delete_active_by_groups(&mut self, group_ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut affected = 0u64;
        for &group_id in group_ids {
            let result = sqlx::query(
                "DELETE FROM posts WHERE group_id = ? AND status IN ('active','paused','error')",
            )
            .bind(group_id)
            .execute(&mut **self.tx)
            .await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    /// Deletes every post for `name` (`NULL`-aware equality per spec §3),
    /// cascading to attempts (spec §4.1 `delete_distribution`).
    pub async fn delete_distribution(&mut self, name: Option<&str>) -> Result<u64, StoreError> {
        let result = match name {
            Some(n) => sqlx::query("DELETE FROM posts WHERE distribution_name = ?").bind(n).execute(&mut **self.tx).await?,
            None => sqlx::query("DELETE FROM posts WHERE distribution_name IS NULL").execute(&mut **self.tx).await?,
        };
        Ok(result.rows_affected())
    }

    /// Deletes posts for `name` restricted to `group_ids` (spec §4.2 "Remove
    /// groups from distribution").
    pub async fn delete_distribution_groups(&mut self, name: Option<&str>, group_ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut affected = 0u64;
        for &group_id in group_ids {
            let result = match name {
                Some(n) => {
                    sqlx::query("DELETE FROM posts WHERE distribution_name = ? AND group_id = ?")
                        .bind(n)
                        .bind(group_id)
                        .execute(&mut **self.tx)
                        .await?
                }
                None => {
                    sqlx::query("DELETE FROM posts WHERE distribution_name IS NULL AND group_id = ?")
                        .bind(group_id)
                        .execute(&mut **self.tx)
                        .await?
                }
            };
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    pub async fn bulk_pause_by_distribution(&mut self, name: Option<&str>) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = match name {
            Some(n) => {
                sqlx::query(
                    "UPDATE posts SET status = 'paused', updated_at = ?, version = version + 1 WHERE distribution_name = ? AND status = 'active'",
                )
                .bind(now)
                .bind(n)
                .execute(&mut **self.tx)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE posts SET status = 'paused', updated_at = ?, version = version + 1 WHERE distribution_name IS NULL AND status = 'active'",
                )
                .bind(now)
                .execute(&mut **self.tx)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    pub async fn bulk_resume_by_distribution(&mut self, name: Option<&str>) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = match name {
            Some(n) => {
                sqlx::query(
                    "UPDATE posts SET status = 'active', last_error = NULL, updated_at = ?, version = version + 1 WHERE distribution_name = ? AND status = 'paused'",
                )
                .bind(now)
                .bind(n)
                .execute(&mut **self.tx)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE posts SET status = 'active', last_error = NULL, updated_at = ?, version = version + 1 WHERE distribution_name IS NULL AND status = 'paused'",
                )
                .bind(now)
                .execute(&mut **self.tx)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    pub async fn bulk_set_notify_by_distribution(&mut self, name: Option<&str>, notify: bool) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = match name {
            Some(n) => {
                sqlx::query(
                    "UPDATE posts SET notify_on_failure = ?, updated_at = ?, version = version + 1 WHERE distribution_name = ?",
                )
                .bind(notify)
                .bind(now)
                .bind(n)
                .execute(&mut **self.tx)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE posts SET notify_on_failure = ?, updated_at = ?, version = version + 1 WHERE distribution_name IS NULL",
                )
                .bind(notify)
                .bind(now)
                .execute(&mut **self.tx)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// Grouped query producing the Distribution view (spec §3, §4.1), sorted
    /// by earliest-member `created_at` descending, nulls last.
    pub async fn list_distributions(&mut self, limit: i64, offset: i64) -> Result<Vec<DistributionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT
                distribution_name,
                COUNT(*) as total_posts,
                SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END) as active_count,
                SUM(CASE WHEN status = 'paused' THEN 1 ELSE 0 END) as paused_count,
                SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END) as error_count,
                SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END) as done_count,
                MIN(created_at) as earliest_created_at,
                MAX(updated_at) as latest_updated_at,
                SUM(CASE WHEN notify_on_failure = 0 THEN 1 ELSE 0 END) as notify_off_count
               FROM posts
               GROUP BY distribution_name
               ORDER BY (distribution_name IS NULL) ASC, earliest_created_at DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut **self.tx)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.try_get("distribution_name")?;
            let member_ids = self.member_ids(name.as_deref()).await?;
            let representative = self.representative_source(name.as_deref()).await?;
            let notify_off_count: i64 = row.try_get("notify_off_count")?;
            out.push(DistributionSummary {
                distribution_id: DistributionSummary::derive_id(&member_ids),
                name,
                active_count: row.try_get("active_count")?,
                paused_count: row.try_get("paused_count")?,
                error_count: row.try_get("error_count")?,
                done_count: row.try_get("done_count")?,
                total_posts: row.try_get("total_posts")?,
                earliest_created_at: row.try_get("earliest_created_at")?,
                latest_updated_at: row.try_get("latest_updated_at")?,
                source_channel_username: representative.0,
                source_channel_id: representative.1,
                source_message_id: representative.2,
                notify_on_failure: notify_off_count == 0,
            });
        }
        Ok(out)
    }

    pub async fn count_distributions(&mut self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(DISTINCT distribution_name) as n FROM posts WHERE distribution_name IS NOT NULL")
            .fetch_one(&mut **self.tx)
            .await?;
        let named: i64 = row.try_get("n")?;
        let unnamed_row = sqlx::query("SELECT COUNT(*) as n FROM posts WHERE distribution_name IS NULL LIMIT 1")
            .fetch_one(&mut **self.tx)
            .await?;
        let unnamed: i64 = unnamed_row.try_get("n")?;
        Ok(named + if unnamed > 0 { 1 } else { 0 })
    }

    async fn member_ids(&mut self, name: Option<&str>) -> Result<Vec<Uuid>, StoreError> {
        let rows = match name {
            Some(n) => sqlx::query("SELECT id FROM posts WHERE distribution_name = ?").bind(n).fetch_all(&mut **self.tx).await?,
            None => sqlx::query("SELECT id FROM posts WHERE distribution_name IS NULL").fetch_all(&mut **self.tx).await?,
        };
        rows.iter().map(|r| r.try_get::<Uuid, _>("id").map_err(StoreError::from)).collect()
    }

    async fn representative_source(&mut self, name: Option<&str>) -> Result<(String, Option<i64>, i64), StoreError> {
        let row = match name {
            Some(n) => {
                sqlx::query(
                    "SELECT source_channel_username, source_channel_id, source_message_id FROM posts WHERE distribution_name = ? ORDER BY created_at ASC LIMIT 1",
                )
                .bind(n)
                .fetch_optional(&mut **self.tx)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT source_channel_username, source_channel_id, source_message_id FROM posts WHERE distribution_name IS NULL ORDER BY created_at ASC LIMIT 1",
                )
                .fetch_optional(&mut **self.tx)
                .await?
            }
        };
        match row {
            Some(r) => Ok((r.try_get("source_channel_username")?, r.try_get("source_channel_id")?, r.try_get("source_message_id")?)),
            None => Ok((String::new(), None, 0)),
        }
    }

    /// Returns the earliest-created member's config/source for the named
    /// distribution (spec §4.2 "Add groups": "fetch the distribution's
    /// current config ... from the earliest surviving member").
    pub async fn earliest_member_config(&mut self, name: Option<&str>) -> Result<Option<(PostConfig, SourceRef)>, StoreError> {
        let row = match name {
            Some(n) => {
                sqlx::query("SELECT * FROM posts WHERE distribution_name = ? ORDER BY created_at ASC LIMIT 1")
                    .bind(n)
                    .fetch_optional(&mut **self.tx)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM posts WHERE distribution_name IS NULL ORDER BY created_at ASC LIMIT 1")
                    .fetch_optional(&mut **self.tx)
                    .await?
            }
        };
        match row {
            Some(r) => {
                let post = Self::from_row(&r)?;
                Ok(Some((PostConfig::from_post(&post), SourceRef {
                    source_channel_username: post.source_channel_username,
                    source_channel_id: post.source_channel_id,
                    source_message_id: post.source_message_id,
                })))
            }
            None => Ok(None),
        }
    }

    pub async fn mark_error(&mut self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE posts SET status = 'error', last_error = ?, updated_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&mut **self.tx)
        .await
        .map_err(classify_write_error)?;
        Ok(())
    }

    pub async fn mark_done(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE posts SET status = 'done', updated_at = ?, version = version + 1 WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await
            .map_err(classify_write_error)?;
        Ok(())
    }

    /// Direct UPDATE bypassing optimistic locking (spec §4.1, §5): avoids
    /// `StaleDataError` against concurrent metadata/bulk updates. Also
    /// stamps `last_attempt_at = now`, matching spec §4.3c ("atomically
    /// increment `count_attempts` and set `last_attempt_at = now`").
    pub async fn increment_attempt_count(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE posts SET count_attempts = count_attempts + 1, last_attempt_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await
            .map_err(classify_write_error)?;
        Ok(())
    }

    /// Instant free-bot drain (spec §6.4, GLOSSARY): clears `bot_id` on every
    /// non-done Post still assigned to `bot_id`, so each can be reassigned by
    /// binding a new bot to its group.
    pub async fn bulk_unassign_by_bot(&mut self, bot_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE posts SET bot_id = NULL, updated_at = ?, version = version + 1 WHERE bot_id = ? AND status IN ('active','paused','error')",
        )
        .bind(now)
        .bind(bot_id)
        .execute(&mut **self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Graceful free-bot drain (spec §6.4, GLOSSARY): pauses every active
    /// Post still assigned to `bot_id`, leaving the assignment intact.
    pub async fn bulk_pause_by_bot(&mut self, bot_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE posts SET status = 'paused', updated_at = ?, version = version + 1 WHERE bot_id = ? AND status = 'active'",
        )
        .bind(now)
        .bind(bot_id)
        .execute(&mut **self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_bot(&mut self, id: Uuid, bot_id: Option<Uuid>) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE posts SET bot_id = ?, updated_at = ?, version = version + 1 WHERE id = ?")
            .bind(bot_id)
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }
}
