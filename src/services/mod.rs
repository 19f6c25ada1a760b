//! Business logic above the store (spec §4.2-§4.7): distribution management,
//! the posting scheduler, error classification, and node lifecycle.

pub mod classifier;
pub mod distribution;
pub mod git_watch;
pub mod group_refresher;
pub mod heartbeat;
pub mod netinfo;
pub mod rate_limiter;
pub mod scheduler;
