use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A target chat (spec §3). A `Group` bound to a bot (`assigned_bot_id`
/// set) means that bot has admin rights there and may post.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,

    pub tg_chat_id: i64,
    pub kind: GroupType,
    pub title: Option<String>,
    pub username: Option<String>,
    pub last_post_at: Option<DateTime<Utc>>,
    pub assigned_bot_id: Option<Uuid>,
    pub metadata_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    Group,
    Supergroup,
    Channel,
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupType::Group => "group",
            GroupType::Supergroup => "supergroup",
            GroupType::Channel => "channel",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(GroupType::Group),
            "supergroup" => Ok(GroupType::Supergroup),
            "channel" => Ok(GroupType::Channel),
            other => Err(format!("unknown group type: {other}")),
        }
    }
}

/// Outcome of `groups.assign_to_bot` (spec §4.1): three disjoint sets.
#[derive(Debug, Default)]
pub struct GroupAssignResult {
    pub newly_assigned: Vec<Group>,
    pub already_assigned: Vec<Group>,
    /// Groups that were bound to a different bot; carries the previous bot id.
    pub reassigned: Vec<(Group, Uuid)>,
}
