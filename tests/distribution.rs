mod common;

use autoposter::domain::distribution::{DrainModeTag, PostConfig, SourceRef, TargetSelector};
use autoposter::services::distribution::{self, DistributionMode};

fn source() -> SourceRef {
    SourceRef { source_channel_username: "news".to_string(), source_channel_id: None, source_message_id: 1 }
}

fn config() -> PostConfig {
    PostConfig {
        pause_between_attempts_s: 0,
        delete_last_attempt: false,
        pin_after_post: false,
        num_attempt_for_pin_post: None,
        target_attempts: -1,
        notify_on_failure: true,
    }
}

#[tokio::test]
async fn create_distribution_targets_all_bound_groups_and_skips_unbound() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let bound = common::seed_group(&store, bot.id, 100).await;
    let unbound = common::seed_group(&store, bot.id, 101).await;

    let mut uow = store.begin().await.unwrap();
    uow.groups().set_assigned_bot(unbound.id, unbound.version, None).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let outcome = distribution::create_distribution(
        &mut uow,
        Some("spring-sale".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    assert_eq!(outcome.created_post_ids.len(), 1);
    assert_eq!(outcome.skipped_unbound_groups, vec![unbound.id]);

    let mut uow = store.begin().await.unwrap();
    let post = uow.posts().get_active_by_group(bound.id).await.unwrap().unwrap();
    assert_eq!(post.distribution_name.as_deref(), Some("spring-sale"));
}

#[tokio::test]
async fn create_distribution_auto_names_when_none_given() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    common::seed_group(&store, bot.id, 200).await;

    let mut uow = store.begin().await.unwrap();
    let outcome = distribution::create_distribution(
        &mut uow,
        None,
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    assert!(outcome.name.starts_with("dist-"));
}

#[tokio::test]
async fn replace_mode_deletes_existing_non_done_posts_before_creating() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 300).await;

    let mut uow = store.begin().await.unwrap();
    let first = distribution::create_distribution(
        &mut uow,
        Some("campaign".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut replacement_source = source();
    replacement_source.source_message_id = 2;

    let mut uow = store.begin().await.unwrap();
    let second = distribution::create_distribution(
        &mut uow,
        Some("campaign".to_string()),
        DistributionMode::Replace,
        TargetSelector::AllBoundGroups,
        replacement_source,
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    assert_ne!(first.created_post_ids[0], second.created_post_ids[0]);

    let mut uow = store.begin().await.unwrap();
    assert!(uow.posts().get(first.created_post_ids[0]).await.unwrap().is_none());
    let remaining = uow.posts().get_active_by_group(group.id).await.unwrap().unwrap();
    assert_eq!(remaining.id, second.created_post_ids[0]);
}

#[tokio::test]
async fn add_groups_steals_from_a_different_distribution() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 400).await;

    let mut uow = store.begin().await.unwrap();
    distribution::create_distribution(
        &mut uow,
        Some("owner-a".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    distribution::create_distribution(
        &mut uow,
        Some("owner-b".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let outcome = distribution::add_groups(&mut uow, Some("owner-a"), &[group.id]).await.unwrap();
    uow.commit().await.unwrap();

    assert_eq!(outcome.created_post_ids.len(), 1);
    assert_eq!(outcome.stolen_from.len(), 1);
    assert_eq!(outcome.stolen_from[0].1, "owner-b");

    let mut uow = store.begin().await.unwrap();
    let post = uow.posts().get_active_by_group(group.id).await.unwrap().unwrap();
    assert_eq!(post.distribution_name.as_deref(), Some("owner-a"));
}

#[tokio::test]
async fn pause_resume_notify_and_delete_round_trip() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    common::seed_group(&store, bot.id, 500).await;

    let mut uow = store.begin().await.unwrap();
    distribution::create_distribution(
        &mut uow,
        Some("toggle".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let paused = distribution::pause(&mut uow, Some("toggle")).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(paused, 1);

    let mut uow = store.begin().await.unwrap();
    let resumed = distribution::resume(&mut uow, Some("toggle")).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(resumed, 1);

    let mut uow = store.begin().await.unwrap();
    let notified = distribution::set_notify(&mut uow, Some("toggle"), false).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(notified, 1);

    let mut uow = store.begin().await.unwrap();
    let summaries = distribution::list_distributions(&mut uow, 10, 0).await.unwrap();
    let toggle = summaries.iter().find(|s| s.name.as_deref() == Some("toggle")).unwrap();
    assert!(!toggle.notify_on_failure);

    let mut uow = store.begin().await.unwrap();
    let deleted = distribution::delete(&mut uow, Some("toggle")).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(deleted, 1);

    let mut uow = store.begin().await.unwrap();
    let count = distribution::count_distributions(&mut uow).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn free_bot_graceful_pauses_active_posts_without_unassigning() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    common::seed_group(&store, bot.id, 800).await;
    common::seed_group(&store, bot.id, 801).await;

    let mut uow = store.begin().await.unwrap();
    distribution::create_distribution(
        &mut uow,
        Some("drain-graceful".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let affected = distribution::free_bot(&mut uow, bot.id, DrainModeTag::Graceful).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(affected, 2);

    let mut uow = store.begin().await.unwrap();
    let posts = uow.posts().list_by_bot(bot.id, 10).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.status == autoposter::domain::PostStatus::Paused));
    assert!(posts.iter().all(|p| p.bot_id == Some(bot.id)));
}

#[tokio::test]
async fn free_bot_instant_clears_bot_id_on_non_done_posts() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 802).await;
    common::seed_group(&store, bot.id, 803).await;

    let mut uow = store.begin().await.unwrap();
    distribution::create_distribution(
        &mut uow,
        Some("drain-instant".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        config(),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let affected = distribution::free_bot(&mut uow, bot.id, DrainModeTag::Instant).await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(affected, 2);

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.posts().list_by_bot(bot.id, 10).await.unwrap().len(), 0);
    let post = uow.posts().get_active_by_group(group.id).await.unwrap().unwrap();
    assert!(post.bot_id.is_none());
    assert_eq!(post.status, autoposter::domain::PostStatus::Active);
}

#[tokio::test]
async fn create_distribution_rejects_invalid_target_attempts() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    common::seed_group(&store, bot.id, 600).await;

    let mut bad_config = config();
    bad_config.target_attempts = 0;

    let mut uow = store.begin().await.unwrap();
    let result = distribution::create_distribution(
        &mut uow,
        Some("invalid".to_string()),
        DistributionMode::Create,
        TargetSelector::AllBoundGroups,
        source(),
        bad_config,
    )
    .await;
    assert!(result.is_err());
}
