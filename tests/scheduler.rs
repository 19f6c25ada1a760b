mod common;

use std::time::Duration;

use autoposter::domain::distribution::{PostConfig, SourceRef};
use autoposter::domain::user::User;
use autoposter::error::MessagingError;
use autoposter::messaging::mock::MockMessagingClient;
use autoposter::services::rate_limiter::RateLimiter;
use autoposter::services::scheduler::{PostingScheduler, SchedulerConfig};
use chrono::Utc;
use uuid::Uuid;

fn fast_config() -> SchedulerConfig {
    SchedulerConfig { tick_interval: Duration::from_millis(10), max_posts_per_second: 1000 }
}

async fn seed_post(
    store: &autoposter::store::Store,
    group: &autoposter::domain::Group,
    bot_id: Uuid,
    target_attempts: i64,
) -> autoposter::domain::Post {
    let config = PostConfig {
        pause_between_attempts_s: 0,
        delete_last_attempt: false,
        pin_after_post: false,
        num_attempt_for_pin_post: None,
        target_attempts,
        notify_on_failure: true,
    };
    let source = SourceRef { source_channel_username: "news".to_string(), source_channel_id: None, source_message_id: 9 };
    let mut uow = store.begin().await.unwrap();
    let post = uow.posts().create(group.id, Some(bot_id), group.tg_chat_id, None, &source, &config).await.unwrap();
    uow.commit().await.unwrap();
    post
}

#[tokio::test]
async fn happy_path_forwards_and_records_successful_attempt() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 700).await;
    let post = seed_post(&store, &group, bot.id, -1).await;

    let client = MockMessagingClient::new(bot.bot_id, "testbot");
    let scheduler = PostingScheduler::new(
        store.clone(),
        Box::new(client),
        RateLimiter::new(1000, Duration::from_secs(1)),
        fast_config(),
    );

    scheduler.run_cycle(bot.id).await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let refreshed = uow.posts().get(post.id).await.unwrap().unwrap();
    assert_eq!(refreshed.count_attempts, 1);
    assert_eq!(refreshed.status, autoposter::domain::PostStatus::Active);

    let attempts = uow.attempts().list_by_post(post.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
}

#[tokio::test]
async fn post_completes_after_reaching_target_attempts() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 701).await;
    let post = seed_post(&store, &group, bot.id, 1).await;

    let client = MockMessagingClient::new(bot.bot_id, "testbot");
    let scheduler = PostingScheduler::new(
        store.clone(),
        Box::new(client),
        RateLimiter::new(1000, Duration::from_secs(1)),
        fast_config(),
    );

    scheduler.run_cycle(bot.id).await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let refreshed = uow.posts().get(post.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, autoposter::domain::PostStatus::Done);
}

#[tokio::test]
async fn critical_failure_marks_error_notifies_superusers_and_deletes_group() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 702).await;
    let post = seed_post(&store, &group, bot.id, -1).await;

    let now = Utc::now();
    let superuser = User { id: Uuid::new_v4(), created_at: now, updated_at: now, version: 0, user_id: 9001, username: Some("admin".to_string()), is_superuser: true };
    let mut uow = store.begin().await.unwrap();
    uow.users().insert(&superuser).await.unwrap();
    uow.commit().await.unwrap();

    let client = MockMessagingClient::new(bot.bot_id, "testbot");
    client.push_forward(Err(MessagingError::new("TelegramForbiddenError", "Forbidden: bot was kicked from the supergroup chat")));
    let scheduler = PostingScheduler::new(
        store.clone(),
        Box::new(client),
        RateLimiter::new(1000, Duration::from_secs(1)),
        fast_config(),
    );

    scheduler.run_cycle(bot.id).await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let refreshed = uow.posts().get(post.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, autoposter::domain::PostStatus::Error);

    let attempts = uow.attempts().list_by_post(post.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);

    assert!(uow.groups().get(group.id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_retries_then_skips_silently_without_error_state() {
    let store = common::new_store().await;
    let setting = common::seed_settings(&store).await;
    let bot = common::seed_bot(&store, setting.id).await;
    let group = common::seed_group(&store, bot.id, 703).await;
    let post = seed_post(&store, &group, bot.id, -1).await;

    let client = MockMessagingClient::new(bot.bot_id, "testbot");
    for _ in 0..3 {
        client.push_forward(Err(MessagingError::new("TelegramNetworkError", "network error talking to telegram")));
    }
    let scheduler = PostingScheduler::new(
        store.clone(),
        Box::new(client),
        RateLimiter::new(1000, Duration::from_secs(1)),
        fast_config(),
    );

    scheduler.run_cycle(bot.id).await.unwrap();

    let mut uow = store.begin().await.unwrap();
    let refreshed = uow.posts().get(post.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, autoposter::domain::PostStatus::Active);
    assert_eq!(refreshed.count_attempts, 0);

    let attempts = uow.attempts().list_by_post(post.id).await.unwrap();
    assert!(attempts.is_empty());
}
