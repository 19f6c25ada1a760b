use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Platform user, used only to identify admins for notifications (spec §3).
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,

    pub user_id: i64,
    pub username: Option<String>,
    pub is_superuser: bool,
}
