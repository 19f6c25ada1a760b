mod common;

use autoposter::domain::distribution::{PostConfig, SourceRef};
use autoposter::error::StoreError;
use chrono::Utc;

#[tokio::test]
async fn bot_has_ip_conflict_detects_other_active_bot_on_same_ip() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;

    let mut uow = store.begin().await.unwrap();
    let conflict = uow.bots().has_ip_conflict(&bot.server_ip, "some-other-token").await.unwrap();
    assert!(conflict);

    let no_conflict = uow.bots().has_ip_conflict(&bot.server_ip, &bot.token).await.unwrap();
    assert!(!no_conflict);
}

#[tokio::test]
async fn bot_update_identity_rejects_stale_version() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;

    let mut uow = store.begin().await.unwrap();
    let stale_version = bot.version - 1;
    let result = uow
        .bots()
        .update_identity(bot.id, stale_version, Some("new"), Some("New Name"), &bot.server_ip, setting.id, 10)
        .await;
    assert!(matches!(result, Err(StoreError::Conflict)));
}

#[tokio::test]
async fn groups_assign_to_bot_splits_into_newly_already_reassigned() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot_a = common::seed_bot(&store, setting.id).await;

    let mut uow = store.begin().await.unwrap();
    let first = uow.groups().assign_to_bot(bot_a.id, &[555]).await.unwrap();
    assert_eq!(first.newly_assigned.len(), 1);
    assert!(first.already_assigned.is_empty());
    assert!(first.reassigned.is_empty());

    let second = uow.groups().assign_to_bot(bot_a.id, &[555]).await.unwrap();
    assert!(second.newly_assigned.is_empty());
    assert_eq!(second.already_assigned.len(), 1);
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn posts_create_deletes_prior_post_with_same_source_triple() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 42).await;

    let source = SourceRef { source_channel_username: "chan".to_string(), source_channel_id: None, source_message_id: 7 };
    let config = PostConfig {
        pause_between_attempts_s: 0,
        delete_last_attempt: false,
        pin_after_post: false,
        num_attempt_for_pin_post: None,
        target_attempts: -1,
        notify_on_failure: true,
    };

    let mut uow = store.begin().await.unwrap();
    let first = uow.posts().create(group.id, Some(bot.id), group.tg_chat_id, None, &source, &config).await.unwrap();
    let second = uow.posts().create(group.id, Some(bot.id), group.tg_chat_id, None, &source, &config).await.unwrap();
    uow.commit().await.unwrap();

    assert_ne!(first.id, second.id);

    let mut uow = store.begin().await.unwrap();
    assert!(uow.posts().get(first.id).await.unwrap().is_none());
    assert!(uow.posts().get(second.id).await.unwrap().is_some());
}

#[tokio::test]
async fn attempt_insert_rejects_foreign_key_violation_for_deleted_post() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 43).await;

    let mut uow = store.begin().await.unwrap();
    let fake_post_id = uuid::Uuid::new_v4();
    let result = uow
        .attempts()
        .insert(fake_post_id, bot.id, group.id, group.tg_chat_id, Some(100), true, None, None)
        .await;
    assert!(matches!(result, Err(StoreError::ForeignKeyViolation)));
}

#[tokio::test]
async fn settings_get_current_returns_the_is_current_row() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;

    let mut uow = store.begin().await.unwrap();
    let current = uow.settings().get_current().await.unwrap().unwrap();
    assert_eq!(current.id, setting.id);
}

#[tokio::test]
async fn group_update_metadata_bypass_survives_stale_version() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 44).await;

    let mut uow = store.begin().await.unwrap();
    // Bump the row's version behind update_metadata's back via a versioned
    // update, then confirm update_metadata still applies despite the drift.
    uow.groups().set_assigned_bot(group.id, group.version, Some(bot.id)).await.unwrap();
    uow.groups().update_metadata(group.id, Some("Title"), Some("user"), Utc::now()).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let refreshed = uow.groups().get(group.id).await.unwrap().unwrap();
    assert_eq!(refreshed.title.as_deref(), Some("Title"));
}
