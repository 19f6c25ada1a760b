//! Abstract chat-platform SDK boundary (spec §6.3). The engine only ever
//! talks to [`MessagingClient`]; concrete transports live in
//! [`telegram`](crate::messaging::telegram) (real) and
//! [`mock`](crate::messaging::mock) (tests).

pub mod mock;
pub mod telegram;

use async_trait::async_trait;

use crate::error::MessagingError;

#[derive(Debug, Clone)]
pub struct MeInfo {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: i64,
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Administrator,
    Creator,
    Member,
    Left,
    Kicked,
    Restricted,
}

impl MemberStatus {
    /// Only `administrator`/`creator` count as "admin" for binding
    /// validation (spec §6.3).
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Administrator | MemberStatus::Creator)
    }
}

/// The small set of chat-platform operations the engine depends on (spec
/// §6.3). Every method maps SDK-level failures into [`MessagingError`]
/// carrying the originating exception's class name, so
/// [`crate::services::classifier::classify`] can work off it uniformly
/// whether the concrete transport is `teloxide` or a test double.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn get_me(&self) -> Result<MeInfo, MessagingError>;
    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, MessagingError>;
    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<MemberStatus, MessagingError>;
    async fn forward(&self, to_chat_id: i64, from_chat_id: i64, message_id: i64) -> Result<i64, MessagingError>;
    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError>;
    async fn pin(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError>;
    async fn send_text(&self, chat_id: i64, html_text: &str) -> Result<(), MessagingError>;
}
