// Application state module
// Immutable per-process state shared by every connection

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use super::ConfigError;

/// Application state
pub struct AppState {
    pub config: Config,

    /// Canonical form of `archive.base_dir`, resolved once at start-up
    pub base_dir: PathBuf,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
}

impl AppState {
    /// Create `AppState`, validating that the base directory exists
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let base_dir = canonical_base_dir(&config.archive.base_dir)?;
        let cached_access_log = Arc::new(AtomicBool::new(config.logging.access_log));

        Ok(Self {
            config,
            base_dir,
            cached_access_log,
        })
    }
}

fn canonical_base_dir(path: &str) -> Result<PathBuf, ConfigError> {
    let canonical = Path::new(path)
        .canonicalize()
        .map_err(|source| ConfigError::BaseDir {
            path: path.to_string(),
            source,
        })?;
    if !canonical.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_string()));
    }
    Ok(canonical)
}
