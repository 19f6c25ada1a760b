//! Process configuration (spec §6.1), loaded from environment (optionally via
//! a `.env` file) with the teacher's `config` crate.

use serde::Deserialize;

fn default_git_remote() -> String {
    "origin".to_string()
}

fn default_git_branch() -> String {
    "main".to_string()
}

fn default_git_check_interval_s() -> u64 {
    300
}

fn default_max_posts_per_second() -> u32 {
    8
}

fn default_database_url() -> String {
    "sqlite://autoposter.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scheduler_tick_s() -> u64 {
    5
}

fn default_rate_limiter_max_calls() -> u32 {
    25
}

fn default_rate_limiter_period_s() -> u64 {
    1
}

/// Typed configuration loaded from environment variables (spec §6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot token for this node.
    pub token: String,

    /// Relational store connection string.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Path to rotating log file (5 MiB x 5 backups).
    pub log_file: Option<String>,

    /// Log level name.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Remote name, default `origin`.
    #[serde(default = "default_git_remote")]
    pub git_remote: String,

    /// Tracked branch, default `main`.
    #[serde(default = "default_git_branch")]
    pub git_branch: String,

    /// Seconds between git status probes, default 300; 0 disables.
    #[serde(default = "default_git_check_interval_s")]
    pub git_check_interval_s: u64,

    /// Outbound forward spacing within a cycle, default 8.
    #[serde(default = "default_max_posts_per_second")]
    pub max_posts_per_second: u32,

    /// Scheduler tick interval in seconds. Not a spec.md key by name, but
    /// spec §4.3 mandates it be configurable rather than hardcoded.
    #[serde(default = "default_scheduler_tick_s")]
    pub scheduler_tick_s: u64,

    /// Outbound SDK rate limiter window, spec §4.7 default (25 calls / 1s).
    #[serde(default = "default_rate_limiter_max_calls")]
    pub rate_limiter_max_calls: u32,
    #[serde(default = "default_rate_limiter_period_s")]
    pub rate_limiter_period_s: u64,

    /// Directory containing the node's own source checkout, used by the
    /// git-revision probe and `force_update` restart command (spec §4.5).
    pub install_dir: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment (and a `.env` file
    /// in the current directory, if present), matching spec §6.1.
    pub fn load() -> Result<Self, crate::error::EngineError> {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    if std::env::var(key).is_err() {
                        // SAFETY-equivalent: single-threaded startup, before
                        // any task spawns (see main.rs ordering).
                        unsafe { std::env::set_var(key, value.trim()) };
                    }
                }
            }
        }

        let builder = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))?;

        builder
            .try_deserialize()
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }
}
