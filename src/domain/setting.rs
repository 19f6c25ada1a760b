use uuid::Uuid;

/// A profile of runtime tunables (spec §3). Invariant: at most one row with
/// `is_current = true`, enforced by a partial-unique index (spec §6.2).
#[derive(Debug, Clone)]
pub struct Setting {
    pub id: Uuid,
    pub name: String,
    pub is_current: bool,
    pub heartbeat_interval_s: i64,
    pub online_threshold_s: i64,
    pub offline_threshold_s: i64,
    pub pagination_size: i64,
    pub max_posts_per_bot: i64,
    pub notify_rights_error: bool,
    pub notify_failures: bool,
    pub retention_enabled: bool,
    pub retention_days: i64,
    pub default_drain_mode: DrainMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    Instant = 0,
    Graceful = 1,
}

impl From<i64> for DrainMode {
    fn from(value: i64) -> Self {
        if value == 1 { DrainMode::Graceful } else { DrainMode::Instant }
    }
}

impl From<DrainMode> for i64 {
    fn from(value: DrainMode) -> Self {
        value as i64
    }
}
