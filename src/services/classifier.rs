//! Maps a raw [`crate::error::MessagingError`] into a [`TelegramErrorKind`]
//! and decides whether it is critical (group should be deleted) or transient
//! (retry, then skip silently) — spec §4.4.

use tracing::warn;

use crate::domain::{Bot, Group, Post};
use crate::error::{EngineResult, MessagingError};
use crate::messaging::MessagingClient;
use crate::store::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramErrorKind {
    ChatNotFound,
    BotKicked,
    BotBlocked,
    Forbidden,
    UserDeactivated,
    NetworkError,
    ServerError,
    Unknown,
}

impl TelegramErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelegramErrorKind::ChatNotFound => "chat_not_found",
            TelegramErrorKind::BotKicked => "bot_kicked",
            TelegramErrorKind::BotBlocked => "bot_blocked",
            TelegramErrorKind::Forbidden => "forbidden",
            TelegramErrorKind::UserDeactivated => "user_deactivated",
            TelegramErrorKind::NetworkError => "network_error",
            TelegramErrorKind::ServerError => "server_error",
            TelegramErrorKind::Unknown => "unknown",
        }
    }

    /// Human-readable name used in the critical-error notification template
    /// (spec §6.3 "Reason <human name of error kind>").
    pub fn human_name(&self) -> &'static str {
        match self {
            TelegramErrorKind::ChatNotFound => "Chat not found",
            TelegramErrorKind::BotKicked => "Bot was kicked",
            TelegramErrorKind::BotBlocked => "Bot was blocked",
            TelegramErrorKind::Forbidden => "Forbidden",
            TelegramErrorKind::UserDeactivated => "User deactivated",
            TelegramErrorKind::NetworkError => "Network error",
            TelegramErrorKind::ServerError => "Server error",
            TelegramErrorKind::Unknown => "Unknown error",
        }
    }

    /// Requires deleting the group and notifying admins (spec §4.4, §4.3d).
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            TelegramErrorKind::ChatNotFound
                | TelegramErrorKind::BotKicked
                | TelegramErrorKind::BotBlocked
                | TelegramErrorKind::Forbidden
                | TelegramErrorKind::UserDeactivated
        )
    }

    /// Retried up to the spec's retry budget, then skipped silently without
    /// deleting anything (spec §4.3b).
    pub fn is_transient(&self) -> bool {
        matches!(self, TelegramErrorKind::NetworkError | TelegramErrorKind::ServerError)
    }
}

/// Classifies a [`MessagingError`] by exception class name first, falling
/// back to substring matching on the message — mirroring the two-pass rule
/// of the original's `classify_telegram_error` (spec §4.4).
pub fn classify(err: &MessagingError) -> TelegramErrorKind {
    let class_name = err.class_name.as_str();
    let message = err.message.to_lowercase();

    if class_name == "TelegramNetworkError" {
        return TelegramErrorKind::NetworkError;
    }
    if class_name == "TelegramServerError" {
        return TelegramErrorKind::ServerError;
    }

    const NETWORK_KEYWORDS: [&str; 4] = ["request timeout", "timeout error", "network error", "connection"];
    if NETWORK_KEYWORDS.iter().any(|k| message.contains(k)) {
        return TelegramErrorKind::NetworkError;
    }

    const SERVER_KEYWORDS: [&str; 8] = ["bad gateway", "server error", "500", "501", "502", "503", "504", "505"];
    if SERVER_KEYWORDS.iter().any(|k| message.contains(k)) {
        return TelegramErrorKind::ServerError;
    }

    if class_name == "ChatNotFound" || message.contains("chat not found") {
        return TelegramErrorKind::ChatNotFound;
    }
    if message.contains("bot was kicked") {
        return TelegramErrorKind::BotKicked;
    }
    if message.contains("bot was blocked") || message.contains("bot is blocked") {
        return TelegramErrorKind::BotBlocked;
    }
    if message.contains("user is deactivated") || message.contains("user_deactivated") {
        return TelegramErrorKind::UserDeactivated;
    }
    if class_name == "TelegramForbiddenError" && message.contains("forbidden") {
        return TelegramErrorKind::Forbidden;
    }

    TelegramErrorKind::Unknown
}

/// Handles a critical [`TelegramErrorKind`]: notifies superusers through the
/// bot's own client using the template of spec §6.3, then deletes the group
/// (spec §4.3d, §4.4).
pub async fn handle_critical(
    uow: &mut UnitOfWork<'_>,
    client: &dyn MessagingClient,
    bot: &Bot,
    group: &Group,
    post: &Post,
    kind: TelegramErrorKind,
    detail: &str,
) -> EngineResult<()> {
    let superusers = uow.users().list_superusers(100).await?;
    let bot_username = bot.username.as_deref().unwrap_or("unknown");
    let group_title = group.title.as_deref().unwrap_or("untitled");
    let post_label = post.distribution_name.clone().unwrap_or_else(|| post.id.to_string());
    let text = format!(
        "<b>\u{26A0}\u{FE0F} DISTRIBUTION FAILURE</b>\n\
         Bot: @{bot_username} ({bot_id})\n\
         Group: {group_title} ({chat_id})\n\
         Post: {post_label}\n\
         Reason: {reason}\n\
         Details: {detail}\n\
         The group has been automatically removed.",
        bot_id = bot.bot_id,
        chat_id = group.tg_chat_id,
        reason = kind.human_name(),
    );
    for user in &superusers {
        if let Err(err) = client.send_text(user.user_id, &text).await {
            warn!(user_id = user.user_id, error = %err, "failed to notify superuser of critical error");
        }
    }

    uow.groups().delete(group.id).await?;
    Ok(())
}
