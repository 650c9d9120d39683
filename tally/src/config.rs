//! Configuration for a host that persists request counters.
//!
//! The library operations take `now` and a view explicitly and need no
//! configuration. [`TallyConfig`] describes the pieces a host wires around
//! them: where the file-backed store lives and how often the save trigger
//! fires. It is read from JSON, for example:
//!
//! ```json
//! {
//!   "store_path": "/var/lib/tally",
//!   "save_interval": { "secs": 1, "nanos": 0 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default cadence of the periodic save.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(1);

/// Host-level settings for persisting request counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Root directory of the [`FileView`](crate::fs_view::FileView).
    pub store_path: PathBuf,

    /// How often the live counter is checkpointed.
    #[serde(default = "default_save_interval")]
    pub save_interval: Duration,
}

fn default_save_interval() -> Duration {
    DEFAULT_SAVE_INTERVAL
}

impl TallyConfig {
    /// Creates a config for `store_path` with the default save interval.
    pub fn new<P: Into<PathBuf>>(store_path: P) -> Self {
        Self {
            store_path: store_path.into(),
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read
    /// - [`ConfigError::Parse`] if it is not a valid config
    /// - any error from [`validate`](Self::validate)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the config is usable.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyStorePath`] if no store path is set
    /// - [`ConfigError::ZeroSaveInterval`] if the save interval is zero
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorePath.into());
        }
        if self.save_interval.is_zero() {
            return Err(ConfigError::ZeroSaveInterval {
                interval: self.save_interval,
            }
            .into());
        }
        Ok(())
    }
}
