//! Distribution create/replace/list/pause/resume/notify/delete/add-groups/
//! remove-groups (spec §4.2), grounded in
//! `original_source/services/post_service.py` and
//! `original_source/services/group_service.py`. Returns typed DTOs from
//! [`crate::domain::distribution`], never raw repository rows.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::distribution::{
    AddGroupsOutcome, CreateDistributionOutcome, DistributionSummary, DrainModeTag, PostConfig, SourceRef, TargetSelector,
};
use crate::error::EngineResult;
use crate::store::UnitOfWork;

pub enum DistributionMode {
    Create,
    Replace,
}

/// Resolves `selector` to a concrete list of groups (spec §4.2 target
/// selector variants).
async fn resolve_target_groups(uow: &mut UnitOfWork<'_>, selector: &TargetSelector) -> EngineResult<Vec<crate::domain::Group>> {
    match selector {
        TargetSelector::AllBoundGroups => Ok(uow.groups().list_bound(i64::MAX, 0).await?),
        TargetSelector::ManualChatIds(chat_ids) => {
            let mut out = Vec::with_capacity(chat_ids.len());
            for &chat_id in chat_ids {
                if let Some(group) = uow.groups().get_by_tg_chat_id(chat_id).await? {
                    out.push(group);
                }
            }
            Ok(out)
        }
        TargetSelector::GroupsOfBots(bot_ids) => {
            let mut out = Vec::new();
            for &bot_id in bot_ids {
                out.extend(uow.groups().list_by_bot(bot_id, i64::MAX, 0).await?);
            }
            Ok(out)
        }
    }
}

fn auto_name(now: chrono::DateTime<Utc>) -> String {
    format!("dist-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Create or replace a distribution (spec §4.2 "Create distribution").
#[allow(clippy::too_many_arguments)]
pub async fn create_distribution(
    uow: &mut UnitOfWork<'_>,
    name: Option<String>,
    mode: DistributionMode,
    selector: TargetSelector,
    source: SourceRef,
    config: PostConfig,
) -> EngineResult<CreateDistributionOutcome> {
    config.validate()?;
    let name = name.unwrap_or_else(|| auto_name(Utc::now()));

    let groups = resolve_target_groups(uow, &selector).await?;

    let mut outcome = CreateDistributionOutcome { name: name.clone(), ..Default::default() };

    if matches!(mode, DistributionMode::Replace) {
        let group_ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
        let affected = uow.posts().delete_active_by_groups(&group_ids).await?;
        info!(distribution = %name, affected, "replace mode: deleted non-done posts of target groups");
    }

    for group in &groups {
        let Some(bot_id) = group.assigned_bot_id else {
            outcome.skipped_unbound_groups.push(group.id);
            continue;
        };
        let post = uow
            .posts()
            .create(group.id, Some(bot_id), group.tg_chat_id, Some(&name), &source, &config)
            .await?;
        outcome.created_post_ids.push(post.id);
    }

    info!(
        distribution = %name,
        created = outcome.created_post_ids.len(),
        skipped = outcome.skipped_unbound_groups.len(),
        "distribution created"
    );
    Ok(outcome)
}

pub async fn list_distributions(uow: &mut UnitOfWork<'_>, limit: i64, offset: i64) -> EngineResult<Vec<DistributionSummary>> {
    Ok(uow.posts().list_distributions(limit, offset).await?)
}

pub async fn count_distributions(uow: &mut UnitOfWork<'_>) -> EngineResult<i64> {
    Ok(uow.posts().count_distributions().await?)
}

pub async fn pause(uow: &mut UnitOfWork<'_>, name: Option<&str>) -> EngineResult<u64> {
    Ok(uow.posts().bulk_pause_by_distribution(name).await?)
}

pub async fn resume(uow: &mut UnitOfWork<'_>, name: Option<&str>) -> EngineResult<u64> {
    Ok(uow.posts().bulk_resume_by_distribution(name).await?)
}

pub async fn set_notify(uow: &mut UnitOfWork<'_>, name: Option<&str>, notify: bool) -> EngineResult<u64> {
    Ok(uow.posts().bulk_set_notify_by_distribution(name, notify).await?)
}

pub async fn delete(uow: &mut UnitOfWork<'_>, name: Option<&str>) -> EngineResult<u64> {
    Ok(uow.posts().delete_distribution(name).await?)
}

/// Adds groups to an existing distribution, stealing from whatever
/// distribution currently holds them (spec §4.2 "Add groups to
/// distribution").
pub async fn add_groups(uow: &mut UnitOfWork<'_>, name: Option<&str>, group_ids: &[Uuid]) -> EngineResult<AddGroupsOutcome> {
    let Some((config, source)) = uow.posts().earliest_member_config(name).await? else {
        return Ok(AddGroupsOutcome::default());
    };

    let usage = uow.posts().groups_distribution_usage(group_ids).await?;

    let mut to_steal = Vec::new();
    let mut stolen_from = Vec::new();
    for &group_id in group_ids {
        if let Some(Some(owner_name)) = usage.get(&group_id) {
            if Some(owner_name.as_str()) != name {
                to_steal.push(group_id);
                stolen_from.push((group_id, owner_name.clone()));
            }
        } else if usage.contains_key(&group_id) {
            // owned by the NULL-named distribution, distinct from `name`
            if name.is_some() {
                to_steal.push(group_id);
                stolen_from.push((group_id, "<unnamed>".to_string()));
            }
        }
    }
    if !to_steal.is_empty() {
        uow.posts().delete_active_by_groups(&to_steal).await?;
    }

    let mut outcome = AddGroupsOutcome { stolen_from, ..Default::default() };

    let groups = uow.groups().get_many(group_ids).await?;
    for group in &groups {
        let Some(bot_id) = group.assigned_bot_id else {
            outcome.skipped_unbound_groups.push(group.id);
            continue;
        };
        let post = uow
            .posts()
            .create(group.id, Some(bot_id), group.tg_chat_id, name, &source, &config)
            .await?;
        outcome.created_post_ids.push(post.id);
    }

    Ok(outcome)
}

pub async fn remove_groups(uow: &mut UnitOfWork<'_>, name: Option<&str>, group_ids: &[Uuid]) -> EngineResult<u64> {
    Ok(uow.posts().delete_distribution_groups(name, group_ids).await?)
}

/// Frees a bot's posts for reassignment (spec §6.4, GLOSSARY): `Instant`
/// clears `bot_id` on its non-done posts, `Graceful` pauses its active posts
/// in place.
pub async fn free_bot(uow: &mut UnitOfWork<'_>, bot_id: Uuid, mode: DrainModeTag) -> EngineResult<u64> {
    let affected = match mode {
        DrainModeTag::Instant => uow.posts().bulk_unassign_by_bot(bot_id).await?,
        DrainModeTag::Graceful => uow.posts().bulk_pause_by_bot(bot_id).await?,
    };
    info!(bot_id = %bot_id, mode = ?mode, affected, "bot freed");
    Ok(affected)
}
