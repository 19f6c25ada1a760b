use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Evidence of one physical outbound forward try (spec §3).
///
/// Invariant: `success = true ⇔ message_id is not null ∧ error_code is null`.
#[derive(Debug, Clone)]
pub struct PostAttempt {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,

    pub post_id: Uuid,
    pub bot_id: Uuid,
    pub group_id: Uuid,
    pub chat_id: i64,
    pub message_id: Option<i64>,
    pub success: bool,
    pub deleted: bool,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
}
