use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::Bot;
use crate::error::StoreError;

use super::classify_write_error;

pub struct BotRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> BotRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Bot, StoreError> {
        Ok(Bot {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            bot_id: row.try_get("bot_id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            token: row.try_get("token")?,
            server_ip: row.try_get("server_ip")?,
            last_heartbeat_at: row.try_get("last_heartbeat_at")?,
            self_destruction: row.try_get("self_destruction")?,
            deactivated: row.try_get("deactivated")?,
            settings_id: row.try_get("settings_id")?,
            max_posts: row.try_get("max_posts")?,
            tracked_branch: row.try_get("tracked_branch")?,
            current_commit_hash: row.try_get("current_commit_hash")?,
            latest_available_commit_hash: row.try_get("latest_available_commit_hash")?,
            commits_behind: row.try_get("commits_behind")?,
            last_update_check_at: row.try_get("last_update_check_at")?,
            force_update: row.try_get("force_update")?,
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Bot>, StoreError> {
        let row = sqlx::query("SELECT * FROM bots WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<Bot>, StoreError> {
        let row = sqlx::query("SELECT * FROM bots WHERE token = ?")
            .bind(token)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// True if some *other*, non-deactivated bot already holds `server_ip`
    /// with a different token (spec §4.5 bootstrap IP-conflict check).
    pub async fn has_ip_conflict(&mut self, server_ip: &str, token: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM bots WHERE server_ip = ? AND token != ? AND deactivated = 0",
        )
        .bind(server_ip)
        .bind(token)
        .fetch_one(&mut **self.tx)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    pub async fn insert(&mut self, bot: &Bot) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO bots (
                id, created_at, updated_at, version, bot_id, username, name, token,
                server_ip, last_heartbeat_at, self_destruction, deactivated, settings_id,
                max_posts, tracked_branch, current_commit_hash, latest_available_commit_hash,
                commits_behind, last_update_check_at, force_update
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"#,
        )
        .bind(bot.id)
        .bind(bot.created_at)
        .bind(bot.updated_at)
        .bind(bot.version)
        .bind(bot.bot_id)
        .bind(&bot.username)
        .bind(&bot.name)
        .bind(&bot.token)
        .bind(&bot.server_ip)
        .bind(bot.last_heartbeat_at)
        .bind(bot.self_destruction)
        .bind(bot.deactivated)
        .bind(bot.settings_id)
        .bind(bot.max_posts)
        .bind(&bot.tracked_branch)
        .bind(&bot.current_commit_hash)
        .bind(&bot.latest_available_commit_hash)
        .bind(bot.commits_behind)
        .bind(bot.last_update_check_at)
        .bind(bot.force_update)
        .execute(&mut **self.tx)
        .await
        .map_err(classify_write_error)?;
        Ok(())
    }

    /// Optimistic-locked field update used by bootstrap/reconfiguration
    /// (not the heartbeat/counter bypasses — those have dedicated methods).
    pub async fn update_identity(
        &mut self,
        id: Uuid,
        expected_version: i64,
        username: Option<&str>,
        name: Option<&str>,
        server_ip: &str,
        settings_id: Uuid,
        max_posts: i64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"UPDATE bots SET username = ?, name = ?, server_ip = ?, settings_id = ?,
                max_posts = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(username)
        .bind(name)
        .bind(server_ip)
        .bind(settings_id)
        .bind(max_posts)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(&mut **self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    pub async fn set_deactivated(&mut self, id: Uuid, expected_version: i64, deactivated: bool) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE bots SET deactivated = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(deactivated)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .execute(&mut **self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    /// Heartbeat liveness tick. Deliberately a direct UPDATE with no version
    /// check: the heartbeat races nothing else that cares about `version`
    /// (only `last_heartbeat_at`/`updated_at` change), mirroring the
    /// `update_metadata`/`increment_attempt_count` bypasses of spec §5.
    pub async fn touch_heartbeat(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE bots SET last_heartbeat_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    pub async fn set_self_destruction(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE bots SET self_destruction = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    /// Persists the git-revision probe (spec §4.5 step 3): direct UPDATE,
    /// no version check — this is telemetry, not contended state.
    pub async fn update_git_status(
        &mut self,
        id: Uuid,
        tracked_branch: &str,
        current_commit_hash: &str,
        latest_available_commit_hash: &str,
        commits_behind: i64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"UPDATE bots SET tracked_branch = ?, current_commit_hash = ?,
                latest_available_commit_hash = ?, commits_behind = ?,
                last_update_check_at = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(tracked_branch)
        .bind(current_commit_hash)
        .bind(latest_available_commit_hash)
        .bind(commits_behind)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    /// Clears `force_update` *before* the restart command runs (spec §4.5,
    /// §8 S6): the commit-before-exec ordering is mandatory.
    pub async fn clear_force_update(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE bots SET force_update = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    pub async fn set_force_update(&mut self, id: Uuid, value: bool) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE bots SET force_update = ?, updated_at = ? WHERE id = ?")
            .bind(value)
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bots WHERE id = ?")
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }
}
