//! Bootstrap, liveness tick, and `self_destruction`/`force_update` lifecycle
//! (spec §4.5), grounded in `original_source/services/heartbeat.py` and
//! `original_source/common/usecases/bot_initialization.py`.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Bot, Setting};
use crate::error::{EngineError, EngineResult, LifecycleError};
use crate::messaging::MessagingClient;
use crate::services::{classifier, git_watch, netinfo};
use crate::store::Store;

const DEFAULT_HEARTBEAT_INTERVAL_S: i64 = 15;

/// The action the caller (C11) should take after one bootstrap/tick pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Keep running the scheduler.
    Continue,
    /// `deactivated = true` was observed (either pre-existing or just set by
    /// self-destruction) — do not start/continue the scheduler loop.
    Stop,
}

/// Locates or creates the Bot row for `token`, resolving IP conflicts and the
/// current Setting (spec §4.5 step 1). Returns the bot id to use for every
/// subsequent tick.
pub async fn bootstrap(
    store: &Store,
    client: &dyn MessagingClient,
    token: &str,
    server_ip_override: Option<&str>,
) -> EngineResult<Uuid> {
    let me = client.get_me().await?;
    let server_ip = match server_ip_override {
        Some(ip) => ip.to_string(),
        None => netinfo::detect_primary_ip().await,
    };

    let mut uow = store.begin().await?;

    let settings = uow.settings().get_current().await?.ok_or(LifecycleError::SettingsMissing)?;

    if uow.bots().has_ip_conflict(&server_ip, token).await? {
        return Err(EngineError::Lifecycle(LifecycleError::IpConflict { ip: server_ip }));
    }

    let existing = uow.bots().get_by_token(token).await?;
    let bot_id = match existing {
        None => {
            let bot = new_bot(&me, token, &server_ip, &settings);
            let id = bot.id;
            uow.bots().insert(&bot).await?;
            id
        }
        Some(existing) => {
            uow.bots()
                .update_identity(
                    existing.id,
                    existing.version,
                    me.username.as_deref(),
                    Some(&me.full_name),
                    &server_ip,
                    settings.id,
                    settings.max_posts_per_bot,
                )
                .await?;
            existing.id
        }
    };

    uow.commit().await?;
    Ok(bot_id)
}

fn new_bot(me: &crate::messaging::MeInfo, token: &str, server_ip: &str, settings: &Setting) -> Bot {
    let now = Utc::now();
    Bot {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        version: 0,
        bot_id: me.id,
        username: me.username.clone(),
        name: Some(me.full_name.clone()),
        token: token.to_string(),
        server_ip: server_ip.to_string(),
        last_heartbeat_at: None,
        self_destruction: false,
        deactivated: false,
        settings_id: settings.id,
        max_posts: settings.max_posts_per_bot,
        tracked_branch: None,
        current_commit_hash: None,
        latest_available_commit_hash: None,
        commits_behind: 0,
        last_update_check_at: None,
        force_update: false,
    }
}

/// Post-init resolution (spec §4.5 step 2): self-destruction forces
/// deactivation and permanent quiescence; an already-deactivated bot stays
/// quiescent; otherwise the bot is (re)activated and its heartbeat touched.
pub async fn resolve_lifecycle(store: &Store, bot_id: Uuid) -> EngineResult<LifecycleAction> {
    let mut uow = store.begin().await?;
    let bot = uow.bots().get(bot_id).await?.ok_or(crate::error::StoreError::NotFound)?;

    if bot.self_destruction {
        if !bot.deactivated {
            uow.bots().set_deactivated(bot.id, bot.version, true).await?;
        }
        uow.commit().await?;
        return Ok(LifecycleAction::Stop);
    }

    if bot.deactivated {
        uow.commit().await?;
        return Ok(LifecycleAction::Stop);
    }

    uow.bots().touch_heartbeat(bot.id).await?;
    uow.commit().await?;
    Ok(LifecycleAction::Continue)
}

/// One force-update check (spec §4.5 step 4, §8 S6): clears the flag and
/// commits *before* invoking the restart command, so a crash mid-restart
/// never leaves the flag set (which would re-trigger on next boot).
pub async fn maybe_force_update(
    store: &Store,
    client: &dyn MessagingClient,
    bot_id: Uuid,
    install_dir: &Path,
) -> EngineResult<()> {
    let mut uow = store.begin().await?;
    let bot = uow.bots().get(bot_id).await?.ok_or(crate::error::StoreError::NotFound)?;
    if !bot.force_update {
        uow.commit().await?;
        return Ok(());
    }
    uow.bots().clear_force_update(bot.id).await?;
    uow.commit().await?;

    info!(bot_id = %bot_id, "force_update observed, running update command");
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg("git pull && systemctl restart autoposter")
        .current_dir(install_dir)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            info!(bot_id = %bot_id, "update command succeeded");
        }
        Ok(output) => {
            let code = output.status.code().unwrap_or(-1);
            let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
            let stderr = truncate(&String::from_utf8_lossy(&output.stderr));
            notify_update_failure(store, client, bot_id, code, &stdout, &stderr).await;
        }
        Err(err) => {
            error!(bot_id = %bot_id, error = %err, "failed to spawn update command");
            notify_update_failure(store, client, bot_id, -1, "", &err.to_string()).await;
        }
    }
    Ok(())
}

fn truncate(s: &str) -> String {
    s.chars().take(500).collect()
}

async fn notify_update_failure(store: &Store, client: &dyn MessagingClient, bot_id: Uuid, code: i32, stdout: &str, stderr: &str) {
    let mut uow = match store.begin().await {
        Ok(uow) => uow,
        Err(err) => {
            warn!(error = %err, "failed to open unit of work to report update failure");
            return;
        }
    };
    let superusers = match uow.users().list_superusers(100).await {
        Ok(users) => users,
        Err(err) => {
            warn!(error = %err, "failed to load superusers to report update failure");
            return;
        }
    };
    let text = format!(
        "<b>Update command failed</b>\nBot: <code>{bot_id}</code>\nExit code: {code}\nstdout: <code>{stdout}</code>\nstderr: <code>{stderr}</code>"
    );
    for user in &superusers {
        if let Err(err) = client.send_text(user.user_id, &text).await {
            warn!(user_id = user.user_id, error = %err, "failed to notify superuser of update failure");
        }
    }
}

/// The long-lived heartbeat loop (spec §4.5): bootstraps once, then ticks at
/// `settings.heartbeat_interval_s` until `shutdown` fires.
pub async fn run(
    store: Store,
    client: Box<dyn MessagingClient>,
    token: String,
    install_dir: std::path::PathBuf,
    git_repo_path: std::path::PathBuf,
    git_remote: String,
    git_branch: String,
    git_check_interval: StdDuration,
    shutdown: CancellationToken,
) {
    info!("heartbeat worker started");
    let bot_id = match bootstrap(&store, client.as_ref(), &token, None).await {
        Ok(id) => id,
        Err(err) => {
            error!(error = %err, "heartbeat bootstrap failed");
            return;
        }
    };

    let mut last_git_check = tokio::time::Instant::now() - git_check_interval;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let action = match resolve_lifecycle(&store, bot_id).await {
            Ok(action) => action,
            Err(err) => {
                warn!(error = %err, "heartbeat tick failed");
                LifecycleAction::Continue
            }
        };
        if action == LifecycleAction::Stop {
            info!(bot_id = %bot_id, "bot deactivated, scheduler cycles are now a no-op");
        }

        if !git_check_interval.is_zero() && last_git_check.elapsed() >= git_check_interval {
            git_watch::tick(&store, bot_id, &git_repo_path, &git_remote, &git_branch).await;
            last_git_check = tokio::time::Instant::now();

            if let Err(err) = maybe_force_update(&store, client.as_ref(), bot_id, &install_dir).await {
                warn!(error = %err, "force_update check failed");
            }
        }

        let interval_s = current_interval_s(&store).await;
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(StdDuration::from_secs(interval_s.max(1) as u64)) => {}
        }
    }
    info!("heartbeat worker stopped");
}

async fn current_interval_s(store: &Store) -> i64 {
    let mut uow = match store.begin().await {
        Ok(uow) => uow,
        Err(_) => return DEFAULT_HEARTBEAT_INTERVAL_S,
    };
    match uow.settings().get_current().await {
        Ok(Some(settings)) if settings.heartbeat_interval_s > 0 => settings.heartbeat_interval_s,
        _ => DEFAULT_HEARTBEAT_INTERVAL_S,
    }
}

/// Escalates a critical messaging error encountered outside the scheduler's
/// own loop (e.g. during bootstrap's `get_me`) through the same classifier
/// path used by the posting cycle.
pub fn classify_bootstrap_error(err: &crate::error::MessagingError) -> classifier::TelegramErrorKind {
    classifier::classify(err)
}
