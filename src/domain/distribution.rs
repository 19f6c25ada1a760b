//! Distribution as a derived entity (spec §3, §9): the equivalence class of
//! Posts sharing `distribution_name`. No physical `distributions` table —
//! this module only holds the read-model DTOs the
//! [`crate::services::distribution`] service produces and consumes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Post;

/// Grouped summary of one distribution (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    /// Stable id derived as the lexicographically minimum post id string in
    /// the class (UI referencing only — spec §3).
    pub distribution_id: String,
    pub name: Option<String>,
    pub active_count: i64,
    pub paused_count: i64,
    pub error_count: i64,
    pub done_count: i64,
    pub total_posts: i64,
    pub earliest_created_at: DateTime<Utc>,
    pub latest_updated_at: DateTime<Utc>,
    /// Representative source triple, taken from the earliest-created member.
    pub source_channel_username: String,
    pub source_channel_id: Option<i64>,
    pub source_message_id: i64,
    /// Logical AND of `notify_on_failure` over all members.
    pub notify_on_failure: bool,
}

impl DistributionSummary {
    /// `t.me/<username>/<message_id>` when a username exists, else the
    /// private-channel slug form `t.me/c/<channel_id>/<message_id>` (spec §4.2).
    pub fn source_label(&self) -> String {
        if !self.source_channel_username.is_empty() {
            format!("t.me/{}/{}", self.source_channel_username, self.source_message_id)
        } else if let Some(channel_id) = self.source_channel_id {
            format!("t.me/c/{}/{}", channel_id, self.source_message_id)
        } else {
            format!("t.me/c/unknown/{}", self.source_message_id)
        }
    }

    /// Derives the stable distribution id from the member post ids: the
    /// lexicographically minimum id string (spec §3).
    pub fn derive_id(member_post_ids: &[Uuid]) -> String {
        member_post_ids
            .iter()
            .map(|id| id.to_string())
            .min()
            .unwrap_or_default()
    }
}

/// Per-post configuration knobs shared by every member of a distribution
/// (spec §4.2 "Create distribution" inputs).
#[derive(Debug, Clone)]
pub struct PostConfig {
    pub pause_between_attempts_s: i64,
    pub delete_last_attempt: bool,
    pub pin_after_post: bool,
    pub num_attempt_for_pin_post: Option<i64>,
    pub target_attempts: i64,
    pub notify_on_failure: bool,
}

impl PostConfig {
    /// Validates the boundary rules from spec §8: `target_attempts = 0` is
    /// rejected, `-1` means infinite, `num_attempt_for_pin_post` must be
    /// `>= 1` if set.
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        if self.target_attempts != -1 && self.target_attempts < 1 {
            return Err(crate::error::EngineError::InvalidTargetAttempts(self.target_attempts));
        }
        if let Some(k) = self.num_attempt_for_pin_post {
            if k < 1 {
                return Err(crate::error::EngineError::InvalidPinCadence(k));
            }
        }
        Ok(())
    }

    /// Derives [`PostConfig`] from an existing post, used when adding groups
    /// to a distribution (spec §4.2 "Add groups").
    pub fn from_post(post: &Post) -> Self {
        Self {
            pause_between_attempts_s: post.pause_between_attempts_s,
            delete_last_attempt: post.delete_last_attempt,
            pin_after_post: post.pin_after_post,
            num_attempt_for_pin_post: post.num_attempt_for_pin_post,
            target_attempts: post.target_attempts,
            notify_on_failure: post.notify_on_failure,
        }
    }
}

/// The source message being forwarded (spec §4.2).
#[derive(Debug, Clone)]
pub struct SourceRef {
    pub source_channel_username: String,
    pub source_channel_id: Option<i64>,
    pub source_message_id: i64,
}

/// Distribution create/replace mode (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionMode {
    Create,
    Replace,
}

/// Target group selector for distribution create (spec §4.2, §6.4).
#[derive(Debug, Clone)]
pub enum TargetSelector {
    AllBoundGroups,
    ManualChatIds(Vec<i64>),
    GroupsOfBots(Vec<Uuid>),
}

/// Free-bot drain mode (spec §6.4, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainModeTag {
    Instant,
    Graceful,
}

/// Notify-choice tag (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChoice {
    On,
    Off,
}

impl From<NotifyChoice> for bool {
    fn from(value: NotifyChoice) -> Self {
        matches!(value, NotifyChoice::On)
    }
}

/// Status-toggle tag (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusToggle {
    Pause,
    Resume,
}

/// Outcome of a distribution create/replace (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct CreateDistributionOutcome {
    pub name: String,
    pub created_post_ids: Vec<Uuid>,
    /// Groups without an `assigned_bot_id`, skipped and reported.
    pub skipped_unbound_groups: Vec<Uuid>,
    /// Non-done posts deleted first, only set in `replace` mode.
    pub replaced_post_ids: Vec<Uuid>,
}

/// Outcome of adding groups to an existing distribution (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct AddGroupsOutcome {
    pub created_post_ids: Vec<Uuid>,
    pub stolen_from: Vec<(Uuid, String)>,
    pub skipped_unbound_groups: Vec<Uuid>,
}
