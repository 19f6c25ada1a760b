//! Typed error taxonomy shared by every service boundary.
//!
//! The engine never lets a raw SDK or SQL exception cross a service call
//! (spec §7): every public method returns [`EngineResult<T>`]. `anyhow` only
//! appears at the process edge in `main.rs`, where a final error is reported
//! and turned into an exit code.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the [`crate::store`] layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Optimistic-locking conflict: the `version` column didn't match on an
    /// `UPDATE ... WHERE id = ? AND version = ?`. Not expected on the two
    /// columns that deliberately bypass versioning (see spec §5).
    #[error("optimistic concurrency conflict")]
    Conflict,

    /// A `PostAttempt` insert raced a concurrent deletion of its `Post`
    /// (spec §4.3 tie-break: "the deletion wins").
    #[error("foreign key violation (parent row was deleted concurrently)")]
    ForeignKeyViolation,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Errors surfaced by [`crate::messaging::MessagingClient`] implementations,
/// pre-classification. See [`crate::services::classifier`] for the mapping
/// into [`crate::services::classifier::TelegramErrorKind`].
#[derive(Debug, Error)]
pub struct MessagingError {
    /// The originating exception's class name, e.g. `"TelegramForbiddenError"`.
    pub class_name: String,
    /// The stringified error message.
    pub message: String,
}

impl std::fmt::Display for MessagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

impl MessagingError {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { class_name: class_name.into(), message: message.into() }
    }
}

/// Bootstrap-time failures (spec §4.5, §7).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no current Setting profile is configured")]
    SettingsMissing,

    #[error("another non-deactivated bot already holds ip {ip}")]
    IpConflict { ip: String },
}

/// The crate-wide error type every service method returns.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("post {post_id} has no group bound to a bot")]
    PostUnbound { post_id: Uuid },

    #[error("distribution target_attempts must be -1 (infinite) or >= 1, got {0}")]
    InvalidTargetAttempts(i64),

    #[error("num_attempt_for_pin_post must be >= 1 if set, got {0}")]
    InvalidPinCadence(i64),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
