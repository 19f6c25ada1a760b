use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::setting::{DrainMode, Setting};
use crate::error::StoreError;

pub struct SettingRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> SettingRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Setting, StoreError> {
        let drain_mode_raw: i64 = row.try_get("default_drain_mode")?;
        Ok(Setting {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            is_current: row.try_get("is_current")?,
            heartbeat_interval_s: row.try_get("heartbeat_interval_s")?,
            online_threshold_s: row.try_get("online_threshold_s")?,
            offline_threshold_s: row.try_get("offline_threshold_s")?,
            pagination_size: row.try_get("pagination_size")?,
            max_posts_per_bot: row.try_get("max_posts_per_bot")?,
            notify_rights_error: row.try_get("notify_rights_error")?,
            notify_failures: row.try_get("notify_failures")?,
            retention_enabled: row.try_get("retention_enabled")?,
            retention_days: row.try_get("retention_days")?,
            default_drain_mode: DrainMode::from(drain_mode_raw),
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Setting>, StoreError> {
        let row = sqlx::query("SELECT * FROM settings WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// The row with `is_current = true` (spec §3: at most one such row,
    /// enforced by a partial-unique index).
    pub async fn get_current(&mut self) -> Result<Option<Setting>, StoreError> {
        let row = sqlx::query("SELECT * FROM settings WHERE is_current = 1 LIMIT 1")
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(&mut self, setting: &Setting) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO settings (
                id, name, is_current, heartbeat_interval_s, online_threshold_s,
                offline_threshold_s, pagination_size, max_posts_per_bot,
                notify_rights_error, notify_failures, retention_enabled,
                retention_days, default_drain_mode
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)"#,
        )
        .bind(setting.id)
        .bind(&setting.name)
        .bind(setting.is_current)
        .bind(setting.heartbeat_interval_s)
        .bind(setting.online_threshold_s)
        .bind(setting.offline_threshold_s)
        .bind(setting.pagination_size)
        .bind(setting.max_posts_per_bot)
        .bind(setting.notify_rights_error)
        .bind(setting.notify_failures)
        .bind(setting.retention_enabled)
        .bind(setting.retention_days)
        .bind(i64::from(setting.default_drain_mode))
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(&mut self, setting: &Setting) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE settings SET name = ?, is_current = ?, heartbeat_interval_s = ?,
                online_threshold_s = ?, offline_threshold_s = ?, pagination_size = ?,
                max_posts_per_bot = ?, notify_rights_error = ?, notify_failures = ?,
                retention_enabled = ?, retention_days = ?, default_drain_mode = ?
               WHERE id = ?"#,
        )
        .bind(&setting.name)
        .bind(setting.is_current)
        .bind(setting.heartbeat_interval_s)
        .bind(setting.online_threshold_s)
        .bind(setting.offline_threshold_s)
        .bind(setting.pagination_size)
        .bind(setting.max_posts_per_bot)
        .bind(setting.notify_rights_error)
        .bind(setting.notify_failures)
        .bind(setting.retention_enabled)
        .bind(setting.retention_days)
        .bind(i64::from(setting.default_drain_mode))
        .bind(setting.id)
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    /// Demotes whatever row currently holds `is_current`, so a caller can
    /// promote a new one under the same unit of work without tripping the
    /// partial-unique index (spec §6.2).
    pub async fn clear_current(&mut self) -> Result<(), StoreError> {
        sqlx::query("UPDATE settings SET is_current = 0 WHERE is_current = 1")
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }
}
