use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::user::User;
use crate::error::StoreError;

pub struct UserRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> UserRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, StoreError> {
        Ok(User {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            is_superuser: row.try_get("is_superuser")?,
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn get_by_user_id(&mut self, user_id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Admins to notify on a critical messaging error (spec §4.4): up to 100
    /// superusers.
    pub async fn list_superusers(&mut self, limit: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users WHERE is_superuser = 1 ORDER BY created_at ASC LIMIT ?")
            .bind(limit)
            .fetch_all(&mut **self.tx)
            .await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn search(&mut self, query: &str, limit: i64) -> Result<Vec<User>, StoreError> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query(
            "SELECT * FROM users WHERE username LIKE ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&mut **self.tx)
        .await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn insert(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, created_at, updated_at, version, user_id, username, is_superuser) VALUES (?,?,?,0,?,?,?)",
        )
        .bind(user.id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.user_id)
        .bind(&user.username)
        .bind(user.is_superuser)
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    pub async fn set_superuser(&mut self, id: Uuid, expected_version: i64, is_superuser: bool) -> Result<(), StoreError> {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "UPDATE users SET is_superuser = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(is_superuser)
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
}
