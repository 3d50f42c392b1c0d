// Configuration module entry point
// Loads configuration layers and builds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    ArchiveConfig, ArchiveStrategy, Compression, Config, EntryNaming, HealthConfig, HttpConfig,
    LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Environment variable that overrides `archive.base_dir`
pub const BASE_DIR_ENV: &str = "BASE_DIR";

/// Errors raised while loading configuration or building `AppState`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("base directory '{path}' is not accessible: {source}")]
    BaseDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("base directory '{0}' is not a directory")]
    NotADirectory(String),
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::build(config_path, std::env::var(BASE_DIR_ENV).ok())
    }

    /// Layer file, `ZIPSERVE__*` environment and an explicit base directory override
    pub fn build(config_path: &str, base_dir: Option<String>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(config_path).required(false))
            .add_source(::config::Environment::with_prefix("ZIPSERVE").separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 0)?
            .set_default("performance.shutdown_grace", 10)?
            .set_default("http.server_name", "zipserve/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("archive.base_dir", ".")?
            .set_default("archive.route", "/zip")?
            .set_default("archive.strategy", "streaming")?
            .set_default("archive.entry_names", "relative")?
            .set_default("archive.compression", "deflated")?
            .set_default("archive.download_name", "files.zip")?
            .set_default("archive.chunk_size", 65_536)?
            .set_default("archive.channel_capacity", 8)?
            .set_override_option("archive.base_dir", base_dir.filter(|d| !d.is_empty()))?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| ConfigError::Address { addr, source })
    }
}
