//! Posting Scheduler (spec §4.3): the per-bot cycle and its four-state
//! per-post machine, grounded in
//! `original_source/services/posting/posting_service.py` and
//! `original_source/services/posting/posting_runner.py`.

use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Post;
use crate::error::{EngineResult, StoreError};
use crate::messaging::MessagingClient;
use crate::services::classifier::{self, TelegramErrorKind};
use crate::services::rate_limiter::RateLimiter;
use crate::store::Store;

const RETRY_COUNT: u32 = 3;
const RETRY_BACKOFF: StdDuration = StdDuration::from_secs(2);

pub struct SchedulerConfig {
    pub tick_interval: StdDuration,
    pub max_posts_per_second: u32,
}

pub struct PostingScheduler {
    store: Store,
    client: Box<dyn MessagingClient>,
    rate_limiter: RateLimiter,
    config: SchedulerConfig,
}

impl PostingScheduler {
    pub fn new(store: Store, client: Box<dyn MessagingClient>, rate_limiter: RateLimiter, config: SchedulerConfig) -> Self {
        Self { store, client, rate_limiter, config }
    }

    /// The long-lived scheduler task (spec §4.3): ticks at `tick_interval`
    /// until `shutdown` fires, running one cycle for `bot_id` per tick.
    pub async fn run(&self, bot_id: Uuid, shutdown: CancellationToken) {
        info!(bot_id = %bot_id, "posting scheduler started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if let Err(err) = self.run_cycle(bot_id).await {
                warn!(bot_id = %bot_id, error = %err, "posting cycle failed");
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }
        }
        info!(bot_id = %bot_id, "posting scheduler stopped");
    }

    /// One cycle (spec §4.3 steps 2-5): fetch up to `max_posts_per_bot`
    /// posts for this bot, filter to eligible, process sequentially with
    /// inter-post spacing.
    pub async fn run_cycle(&self, bot_id: Uuid) -> EngineResult<()> {
        let bot = {
            let mut uow = self.store.begin().await?;
            let bot = uow.bots().get(bot_id).await?.ok_or(StoreError::NotFound)?;
            uow.commit().await?;
            bot
        };

        // Permanent quiescence (spec §4.5 step 2): a deactivated bot's
        // cycle is a no-op, re-checked fresh every tick.
        if bot.deactivated {
            debug!(bot_id = %bot_id, "bot deactivated, scheduler cycle is a no-op");
            return Ok(());
        }

        let max_posts = bot.max_posts;

        let posts = {
            let mut uow = self.store.begin().await?;
            let posts = uow.posts().list_by_bot(bot_id, max_posts).await?;
            uow.commit().await?;
            posts
        };

        let spacing = StdDuration::from_secs_f64(1.0 / self.config.max_posts_per_second.max(1) as f64);

        for post in posts {
            if !post.is_eligible(chrono::Utc::now()) {
                continue;
            }

            // Re-check eligibility immediately before starting (spec §4.3 step 4).
            let fresh = {
                let mut uow = self.store.begin().await?;
                let fresh = uow.posts().get(post.id).await?;
                uow.commit().await?;
                fresh
            };
            let Some(fresh) = fresh else { continue };
            if !fresh.is_eligible(chrono::Utc::now()) {
                continue;
            }

            self.rate_limiter.acquire().await;
            if let Err(err) = self.process_post(bot_id, &fresh).await {
                warn!(post_id = %fresh.id, error = %err, "failed to process post");
            }

            tokio::time::sleep(spacing).await;
        }

        Ok(())
    }

    /// Per-post state machine steps (a)-(d) (spec §4.3).
    async fn process_post(&self, bot_id: Uuid, post: &Post) -> EngineResult<()> {
        if post.delete_last_attempt {
            self.maybe_delete_last_attempt(post).await;
        }

        let forwarded = self.forward_with_retry(post).await?;
        let Some(message_id) = forwarded else {
            // All retries were transient: skip silently, retried next tick.
            return Ok(());
        };

        self.on_forward_success(bot_id, post, message_id).await
    }

    async fn maybe_delete_last_attempt(&self, post: &Post) {
        let attempt = {
            let mut uow = match self.store.begin().await {
                Ok(uow) => uow,
                Err(err) => {
                    warn!(post_id = %post.id, error = %err, "failed to open unit of work for delete_last_attempt");
                    return;
                }
            };
            let attempt = uow.attempts().get_most_recent_deletable(post.id).await;
            let _ = uow.commit().await;
            attempt
        };
        let Ok(Some(attempt)) = attempt else { return };
        let Some(message_id) = attempt.message_id else { return };

        match self.delete_with_retry(attempt.chat_id, message_id).await {
            Ok(()) => {
                let mut uow = match self.store.begin().await {
                    Ok(uow) => uow,
                    Err(err) => {
                        warn!(post_id = %post.id, error = %err, "failed to open unit of work to mark attempt deleted");
                        return;
                    }
                };
                if let Err(err) = uow.attempts().mark_deleted(attempt.id).await {
                    warn!(post_id = %post.id, error = %err, "failed to mark attempt deleted");
                }
                let _ = uow.commit().await;
            }
            Err(err) => {
                warn!(post_id = %post.id, error = %err, "delete_last_attempt failed, continuing anyway");
            }
        }
    }

    /// Up to 3 immediate retries with a 2s fixed backoff, iff the error
    /// classifies as transient. Returns `Ok(None)` on an all-transient
    /// exhaustion (skip silently); `Ok(Some(message_id))` on success;
    /// `Err` on a non-transient failure, which the caller records (step d).
    async fn forward_with_retry(&self, post: &Post) -> EngineResult<Option<i64>> {
        for attempt_no in 0..RETRY_COUNT {
            match self.client.forward(post.target_chat_id, post.source_channel_id.unwrap_or_default(), post.source_message_id).await {
                Ok(message_id) => return Ok(Some(message_id)),
                Err(err) => {
                    let kind = classifier::classify(&err);
                    if !kind.is_transient() {
                        return self.record_failure(post, &err, kind).await.map(|_| None);
                    }
                    if attempt_no + 1 == RETRY_COUNT {
                        info!(post_id = %post.id, "forward exhausted transient retries, skipping silently this tick");
                        return Ok(None);
                    }
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
        Ok(None)
    }

    /// Flood-control-aware delete retry (spec §4.3a): "message not found" is
    /// treated as success; other errors are logged and the caller continues
    /// the post regardless.
    async fn delete_with_retry(&self, chat_id: i64, message_id: i64) -> Result<(), crate::error::MessagingError> {
        for _ in 0..RETRY_COUNT {
            match self.client.delete(chat_id, message_id).await {
                Ok(()) => return Ok(()),
                Err(err) if err.message.to_lowercase().contains("message not found") || err.message.to_lowercase().contains("message to delete not found") => {
                    return Ok(());
                }
                Err(err) if err.message.to_lowercase().contains("retry after") || err.message.to_lowercase().contains("flood") => {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn on_forward_success(&self, bot_id: Uuid, post: &Post, message_id: i64) -> EngineResult<()> {
        let mut uow = self.store.begin().await?;
        let attempt_result = uow
            .attempts()
            .insert(post.id, bot_id, post.group_id, post.target_chat_id, Some(message_id), true, None, None)
            .await;

        let attempt = match attempt_result {
            Ok(attempt) => attempt,
            Err(StoreError::ForeignKeyViolation) => {
                warn!(post_id = %post.id, "post deleted concurrently, dropping attempt insert");
                uow.rollback().await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        uow.posts().increment_attempt_count(post.id).await?;
        let count_attempts_after = post.count_attempts + 1;

        if post.should_pin(count_attempts_after) {
            self.pin_and_delete_notice(post.target_chat_id, message_id).await;
        }

        if post.should_complete(count_attempts_after) {
            uow.posts().mark_done(post.id).await?;
        }

        uow.commit().await?;
        let _ = attempt;
        Ok(())
    }

    async fn pin_and_delete_notice(&self, chat_id: i64, message_id: i64) {
        let pinned = self.pin_with_retry(chat_id, message_id).await;
        if pinned.is_ok() {
            // Assumes the service notice follows the pinned message by
            // exactly one id (spec §9 open question #3). A delete failure
            // here is logged and swallowed, never propagated as a pin
            // failure.
            if let Err(err) = self.client.delete(chat_id, message_id + 1).await {
                warn!(chat_id, message_id, error = %err, "failed to delete pin service notice");
            }
        } else if let Err(err) = pinned {
            warn!(chat_id, message_id, error = %err, "pin failed");
        }
    }

    async fn pin_with_retry(&self, chat_id: i64, message_id: i64) -> Result<(), crate::error::MessagingError> {
        for _ in 0..RETRY_COUNT {
            match self.client.pin(chat_id, message_id).await {
                Ok(()) => return Ok(()),
                Err(err) if err.message.to_lowercase().contains("retry after") || err.message.to_lowercase().contains("flood") => {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Step (d): non-transient failure — record it, mark the post `error`,
    /// and escalate critical kinds to the Critical Handler.
    async fn record_failure(&self, post: &Post, err: &crate::error::MessagingError, kind: TelegramErrorKind) -> EngineResult<()> {
        let mut uow = self.store.begin().await?;
        let bot = uow.bots().get(post.bot_id.ok_or(crate::error::EngineError::PostUnbound { post_id: post.id })?).await?.ok_or(StoreError::NotFound)?;

        let insert_result = uow
            .attempts()
            .insert(post.id, bot.id, post.group_id, post.target_chat_id, None, false, Some(&err.class_name), Some(&err.message))
            .await;
        match insert_result {
            Ok(_) => {}
            Err(StoreError::ForeignKeyViolation) => {
                warn!(post_id = %post.id, "post deleted concurrently during failure recording");
                uow.rollback().await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        uow.posts().mark_error(post.id, &err.message).await?;
        uow.commit().await?;

        // The Critical Handler runs under its own fresh unit of work,
        // independent of the dispatcher's (spec §4.4).
        if kind.is_critical() && post.notify_on_failure {
            let mut critical_uow = self.store.begin().await?;
            match critical_uow.groups().get(post.group_id).await? {
                Some(group) => {
                    classifier::handle_critical(&mut critical_uow, self.client.as_ref(), &bot, &group, post, kind, &err.message).await?;
                    critical_uow.commit().await?;
                }
                None => {
                    warn!(post_id = %post.id, "group already gone, skipping critical notification");
                }
            }
        }

        Ok(())
    }
}
