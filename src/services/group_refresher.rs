//! Group metadata TTL refresh (spec §4.6), grounded in
//! `original_source/services/group_service.py::ensure_metadata`.

use chrono::{Duration, Utc};
use tracing::warn;

use crate::domain::Group;
use crate::error::EngineResult;
use crate::messaging::MessagingClient;
use crate::store::UnitOfWork;

const METADATA_TTL_DAYS: i64 = 7;

/// Refreshes `group`'s `title`/`username` if ((`title` and `username` are
/// both empty) OR stale past the TTL) and it has a bound bot. SDK failures
/// are logged and swallowed — no state change on failure. Uses the direct
/// `update_metadata` UPDATE (no version bump) per spec §4.1.
pub async fn ensure_fresh(uow: &mut UnitOfWork<'_>, client: &dyn MessagingClient, group: &Group) -> EngineResult<()> {
    let Some(_bound) = group.assigned_bot_id else {
        return Ok(());
    };
    if !needs_refresh(group, Utc::now()) {
        return Ok(());
    }

    match client.get_chat(group.tg_chat_id).await {
        Ok(chat) => {
            let title = chat.title.filter(|s| !s.is_empty()).or_else(|| group.title.clone());
            let username = chat.username.filter(|s| !s.is_empty()).or_else(|| group.username.clone());
            uow.groups()
                .update_metadata(group.id, title.as_deref(), username.as_deref(), Utc::now())
                .await?;
        }
        Err(err) => {
            warn!(group_id = %group.id, error = %err, "group metadata refresh failed");
        }
    }
    Ok(())
}

fn needs_refresh(group: &Group, now: chrono::DateTime<Utc>) -> bool {
    let empty = group.title.as_deref().unwrap_or("").is_empty() && group.username.as_deref().unwrap_or("").is_empty();
    if empty {
        return true;
    }
    match group.metadata_refreshed_at {
        None => true,
        Some(refreshed_at) => now - refreshed_at >= Duration::days(METADATA_TTL_DAYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn group_with(title: Option<&str>, username: Option<&str>, refreshed_at: Option<chrono::DateTime<Utc>>) -> Group {
        Group {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
            tg_chat_id: 1,
            kind: crate::domain::GroupType::Supergroup,
            title: title.map(str::to_string),
            username: username.map(str::to_string),
            last_post_at: None,
            assigned_bot_id: Some(Uuid::new_v4()),
            metadata_refreshed_at: refreshed_at,
        }
    }

    #[test]
    fn refreshes_when_both_fields_empty() {
        let group = group_with(None, None, Some(Utc::now()));
        assert!(needs_refresh(&group, Utc::now()));
    }

    #[test]
    fn refreshes_when_stale_past_ttl() {
        let group = group_with(Some("Title"), Some("user"), Some(Utc::now() - Duration::days(8)));
        assert!(needs_refresh(&group, Utc::now()));
    }

    #[test]
    fn skips_when_fresh_and_populated() {
        let group = group_with(Some("Title"), Some("user"), Some(Utc::now()));
        assert!(!needs_refresh(&group, Utc::now()));
    }
}
