use autoposter::domain::setting::{DrainMode, Setting};
use autoposter::domain::{Bot, Group, GroupType};
use autoposter::store::Store;
use chrono::Utc;
use uuid::Uuid;

pub async fn new_store() -> Store {
    Store::connect_in_memory().await.expect("in-memory store")
}

pub fn default_setting() -> Setting {
    Setting {
        id: Uuid::new_v4(),
        name: "default".to_string(),
        is_current: true,
        heartbeat_interval_s: 15,
        online_threshold_s: 60,
        offline_threshold_s: 300,
        pagination_size: 10,
        max_posts_per_bot: 50,
        notify_rights_error: true,
        notify_failures: true,
        retention_enabled: false,
        retention_days: 30,
        default_drain_mode: DrainMode::Instant,
    }
}

pub async fn seed_settings(store: &Store) -> Setting {
    let setting = default_setting();
    let mut uow = store.begin().await.unwrap();
    uow.settings().insert(&setting).await.unwrap();
    uow.commit().await.unwrap();
    setting
}

pub async fn seed_bot(store: &Store, settings_id: Uuid) -> Bot {
    let now = Utc::now();
    let bot = Bot {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        version: 0,
        bot_id: 1001,
        username: Some("testbot".to_string()),
        name: Some("Test Bot".to_string()),
        token: format!("{}:TEST", Uuid::new_v4()),
        server_ip: "10.0.0.1".to_string(),
        last_heartbeat_at: None,
        self_destruction: false,
        deactivated: false,
        settings_id,
        max_posts: 50,
        tracked_branch: None,
        current_commit_hash: None,
        latest_available_commit_hash: None,
        commits_behind: 0,
        last_update_check_at: None,
        force_update: false,
    };
    let mut uow = store.begin().await.unwrap();
    uow.bots().insert(&bot).await.unwrap();
    uow.commit().await.unwrap();
    bot
}

pub async fn seed_group(store: &Store, bot_id: Uuid, tg_chat_id: i64) -> Group {
    let mut uow = store.begin().await.unwrap();
    let result = uow.groups().assign_to_bot(bot_id, &[tg_chat_id]).await.unwrap();
    uow.commit().await.unwrap();
    result.newly_assigned.into_iter().next().expect("group created")
}

#[allow(dead_code)]
pub fn group_type_label(kind: GroupType) -> String {
    kind.to_string()
}
