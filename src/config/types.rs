// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub archive: ArchiveConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level written: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Upper bound for a whole connection in seconds, 0 disables it
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds in-flight connections get after a shutdown signal
    pub shutdown_grace: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            connection_timeout: 0,
            max_connections: None,
            shutdown_grace: 10,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "zipserve/0.1".to_string(),
            enable_cors: false,
            max_body_size: 1_048_576,
        }
    }
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Archive endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Directory requested names are resolved against
    pub base_dir: String,
    /// Request path of the archive endpoint
    pub route: String,
    pub strategy: ArchiveStrategy,
    pub entry_names: EntryNaming,
    pub compression: Compression,
    /// File name offered in `Content-Disposition`
    pub download_name: String,
    /// Bytes per body frame when streaming
    pub chunk_size: usize,
    /// Frames buffered between the archive writer and the connection
    pub channel_capacity: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            route: "/zip".to_string(),
            strategy: ArchiveStrategy::default(),
            entry_names: EntryNaming::default(),
            compression: Compression::default(),
            download_name: "files.zip".to_string(),
            chunk_size: 64 * 1024,
            channel_capacity: 8,
        }
    }
}

/// How the archive reaches the client
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStrategy {
    /// Build the whole archive in memory, then send it with a `Content-Length`
    Buffered,
    /// Write the archive into the response body as it is produced
    #[default]
    Streaming,
}

/// How in-archive entry names are derived from requested names
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryNaming {
    /// Normalized relative path as requested (`docs/a.txt`)
    #[default]
    Relative,
    /// File base name only (`a.txt`)
    BaseName,
}

/// Compression applied to every entry
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

impl From<Compression> for zip::CompressionMethod {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::Stored => Self::Stored,
            Compression::Deflated => Self::Deflated,
        }
    }
}
