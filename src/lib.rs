//! shcache - cross-process result cache for long-running shell commands
//!
//! Processes asking for the output of the same command share one on-disk
//! entry. The first to take the entry lock runs the command; the others wait
//! for it and reuse the captured output and exit code until the entry
//! expires.

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod exec;
pub mod ui;

pub use cache::{CacheKey, CacheState};
pub use db::{CacheOptions, CachedCommand};
pub use error::{ShcacheError, ShcacheResult};
pub use exec::{LineAction, SENTINEL_EXIT_CODE};
