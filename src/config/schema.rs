//! Configuration schema for shcache
//!
//! Configuration is stored at `~/.config/shcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of seconds a cache entry stays valid
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache entry settings
    pub cache: CacheConfig,

    /// Shell used to run cached commands
    pub shell: ShellConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base directory for entries (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Seconds before an entry is re-executed regardless of instance state
    pub timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CacheConfig {
    /// Resolve the cache directory, falling back to the platform default
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Platform default cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("shcache")
}

/// Shell configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell program
    pub program: String,

    /// Arguments placed before the command string
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}
