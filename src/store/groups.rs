use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::group::{Group, GroupAssignResult, GroupType};
use crate::error::StoreError;

use super::classify_write_error;

pub struct GroupRepo<'c, 'a> {
    tx: &'c mut Transaction<'a, Sqlite>,
}

impl<'c, 'a> GroupRepo<'c, 'a> {
    pub(super) fn new(tx: &'c mut Transaction<'a, Sqlite>) -> Self {
        Self { tx }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Group, StoreError> {
        let kind_str: String = row.try_get("type")?;
        let kind = kind_str
            .parse::<GroupType>()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Group {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            tg_chat_id: row.try_get("tg_chat_id")?,
            kind,
            title: row.try_get("title")?,
            username: row.try_get("username")?,
            last_post_at: row.try_get("last_post_at")?,
            assigned_bot_id: row.try_get("assigned_bot_id")?,
            metadata_refreshed_at: row.try_get("metadata_refreshed_at")?,
        })
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn get_by_tg_chat_id(&mut self, tg_chat_id: i64) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query("SELECT * FROM groups WHERE tg_chat_id = ?")
            .bind(tg_chat_id)
            .fetch_optional(&mut **self.tx)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn get_many(&mut self, ids: &[Uuid]) -> Result<Vec<Group>, StoreError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(g) = self.get(*id).await? {
                out.push(g);
            }
        }
        Ok(out)
    }

    /// Upserts a Group per chat id and sets `assigned_bot_id`, returning the
    /// three disjoint sets required by spec §4.1.
    pub async fn assign_to_bot(&mut self, bot_id: Uuid, tg_chat_ids: &[i64]) -> Result<GroupAssignResult, StoreError> {
        let mut result = GroupAssignResult::default();
        for &chat_id in tg_chat_ids {
            match self.get_by_tg_chat_id(chat_id).await? {
                None => {
                    let now = Utc::now();
                    let id = Uuid::new_v4();
                    sqlx::query(
                        r#"INSERT INTO groups (
                            id, created_at, updated_at, version, tg_chat_id, type, title,
                            username, last_post_at, assigned_bot_id, metadata_refreshed_at
                        ) VALUES (?,?,?,0,?,?,NULL,NULL,NULL,?,NULL)"#,
                    )
                    .bind(id)
                    .bind(now)
                    .bind(now)
                    .bind(chat_id)
                    .bind(GroupType::Supergroup.to_string())
                    .bind(bot_id)
                    .execute(&mut **self.tx)
                    .await
                    .map_err(classify_write_error)?;
                    let group = self.get(id).await?.ok_or(StoreError::NotFound)?;
                    result.newly_assigned.push(group);
                }
                Some(existing) if existing.assigned_bot_id == Some(bot_id) => {
                    result.already_assigned.push(existing);
                }
                Some(existing) => {
                    let previous_bot_id = existing.assigned_bot_id;
                    self.set_assigned_bot(existing.id, existing.version, Some(bot_id)).await?;
                    let updated = self.get(existing.id).await?.ok_or(StoreError::NotFound)?;
                    if let Some(prev) = previous_bot_id {
                        result.reassigned.push((updated, prev));
                    } else {
                        result.newly_assigned.push(updated);
                    }
                }
            }
        }
        Ok(result)
    }

    pub async fn set_assigned_bot(&mut self, id: Uuid, expected_version: i64, bot_id: Option<Uuid>) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE groups SET assigned_bot_id = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(bot_id)
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

    /// Direct UPDATE that ignores optimistic-locking version bumps (spec
    /// §4.1, §4.6): metadata refresh is idempotent and must not lose a
    /// concurrent posting update that bumped `version`.
    pub async fn update_metadata(
        &mut self,
        id: Uuid,
        title: Option<&str>,
        username: Option<&str>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE groups SET title = ?, username = ?, metadata_refreshed_at = ? WHERE id = ?")
            .bind(title)
            .bind(username)
            .bind(refreshed_at)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    pub async fn touch_last_post(&mut self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE groups SET last_post_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    /// Deletes the group; `ON DELETE CASCADE` on `posts.group_id` removes
    /// its active post and, transitively, attempts (spec §3 lifecycle).
    pub async fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    pub async fn list_by_bot(&mut self, bot_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM groups WHERE assigned_bot_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(bot_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut **self.tx)
        .await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn list_bound(&mut self, limit: i64, offset: i64) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM groups WHERE assigned_bot_id IS NOT NULL ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut **self.tx)
        .await?;
        rows.iter().map(Self::from_row).collect()
    }
}
