use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single scheduled forward instance targeting one group (spec §3).
///
/// Invariants: for any `group_id`, at most one [`Post`] with
/// `status ∈ {active, paused, error}`; the triple (`group_id`,
/// `source_channel_username`, `source_message_id`) is unique across all
/// statuses.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,

    pub group_id: Uuid,
    pub bot_id: Option<Uuid>,
    pub status: PostStatus,
    pub target_chat_id: i64,
    pub distribution_name: Option<String>,
    pub source_channel_username: String,
    pub source_channel_id: Option<i64>,
    pub source_message_id: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub count_attempts: i64,
    /// `-1` = infinite, else `>= 1`.
    pub target_attempts: i64,
    pub delete_last_attempt: bool,
    pub pin_after_post: bool,
    pub num_attempt_for_pin_post: Option<i64>,
    pub pause_between_attempts_s: i64,
    pub notify_on_failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Active,
    Paused,
    Error,
    Done,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Paused => "paused",
            PostStatus::Error => "error",
            PostStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PostStatus::Active),
            "paused" => Ok(PostStatus::Paused),
            "error" => Ok(PostStatus::Error),
            "done" => Ok(PostStatus::Done),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

impl Post {
    /// Eligibility predicate from spec §4.3 step 3: `status = active` AND
    /// (`target_attempts < 0` OR `count_attempts < target_attempts`) AND
    /// (`last_attempt_at` is null OR `now >= last_attempt_at + pause`).
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if self.status != PostStatus::Active {
            return false;
        }
        if self.target_attempts >= 0 && self.count_attempts >= self.target_attempts {
            return false;
        }
        if let Some(last) = self.last_attempt_at {
            let next = last + chrono::Duration::seconds(self.pause_between_attempts_s);
            if now < next {
                return false;
            }
        }
        true
    }

    /// Whether a successful attempt should trigger a pin, given the post's
    /// pin policy and the attempt count *after* incrementing (spec §4.3c).
    pub fn should_pin(&self, count_attempts_after: i64) -> bool {
        if !self.pin_after_post {
            return false;
        }
        match self.num_attempt_for_pin_post {
            None => true,
            Some(k) if k <= 1 => true,
            Some(k) => count_attempts_after % k == 0,
        }
    }

    /// Whether the post should transition to `done` given the attempt count
    /// *after* incrementing (spec §4.3c, §8 boundary behaviors).
    pub fn should_complete(&self, count_attempts_after: i64) -> bool {
        self.target_attempts >= 0 && count_attempts_after >= self.target_attempts
    }
}
