use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The node's identity on the messaging platform (spec §3).
///
/// Invariant: at most one non-deactivated [`Bot`] per `server_ip`, enforced
/// by a partial-unique index (spec §6.2) and checked explicitly during
/// bootstrap (spec §4.5) since SQLite's partial-unique index only guards
/// against the race, not against returning a clean typed error.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,

    /// Platform numeric id from `get_me()`. Canonical identity used in every
    /// foreign key (see SPEC_FULL.md open-question resolution #1).
    pub bot_id: i64,
    pub username: Option<String>,
    pub name: Option<String>,
    pub token: String,
    pub server_ip: String,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub self_destruction: bool,
    pub deactivated: bool,
    pub settings_id: Uuid,
    pub max_posts: i64,
    pub tracked_branch: Option<String>,
    pub current_commit_hash: Option<String>,
    pub latest_available_commit_hash: Option<String>,
    pub commits_behind: i64,
    pub last_update_check_at: Option<DateTime<Utc>>,
    pub force_update: bool,
}

impl Bot {
    /// Display-only helper derived from the token prefix before `:`. Never
    /// used for lookups or equality — see SPEC_FULL.md open question #1.
    pub fn telegram_id_display(&self) -> String {
        self.token.split(':').next().unwrap_or(&self.token).to_string()
    }
}
