//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument or environment variable (clap merges both)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8002";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Default grace period for in-flight requests on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Default request body limit (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Settings read from the optional TOML config file
///
/// All fields are optional; anything missing falls through to the
/// compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_url: Option<String>,
    pub login_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub yt_dlp_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,
    pub max_upload_bytes: Option<usize>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load the config file for this run
    ///
    /// An explicitly requested file must exist. The platform default file is
    /// optional: if it is missing the compiled defaults are used. Nothing is
    /// logged here since this runs before tracing is set up; the caller
    /// reports the returned [`ConfigSource`] once it is.
    pub fn load_for_run(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        Self::load_with_default(explicit, default_config_path())
    }

    /// [`TomlConfig::load_for_run`] with the default location supplied
    pub fn load_with_default(
        explicit: Option<&Path>,
        default_path: Option<PathBuf>,
    ) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let toml = Self::load(path)?;
            return Ok((toml, ConfigSource::File(path.to_path_buf())));
        }

        match default_path {
            Some(path) if path.exists() => {
                let toml = Self::load(&path)?;
                Ok((toml, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path))),
            None => Ok((Self::default(), ConfigSource::NoConfigDir)),
        }
    }
}

/// Where the TOML settings for a run came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Default location had no file
    Missing(PathBuf),
    NoConfigDir,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("No config file at {}, using defaults", path.display())
            }
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub login_url: Option<String>,
    pub ffmpeg_path: Option<PathBuf>,
    pub yt_dlp_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,
    pub max_upload_bytes: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Location of the external login service; empty when unset
    pub login_url: String,
    pub ffmpeg_path: PathBuf,
    pub yt_dlp_path: PathBuf,
    pub temp_dir: PathBuf,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides, TOML values and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let bind_addr = match (overrides.bind_addr, toml.bind_addr) {
            (Some(addr), _) => addr,
            (None, Some(raw)) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid bind_addr '{}': {}", raw, e)))?,
            (None, None) => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|e| Error::Config(format!("Invalid default bind address: {}", e)))?,
        };

        let database_url = overrides
            .database_url
            .or(toml.database_url)
            .unwrap_or_else(default_database_url);

        let login_url = overrides
            .login_url
            .or(toml.login_url)
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            database_url,
            login_url,
            ffmpeg_path: overrides
                .ffmpeg_path
                .or(toml.ffmpeg_path)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            yt_dlp_path: overrides
                .yt_dlp_path
                .or(toml.yt_dlp_path)
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            temp_dir: overrides
                .temp_dir
                .or(toml.temp_dir)
                .unwrap_or_else(std::env::temp_dir),
            request_timeout: Duration::from_secs(
                overrides
                    .request_timeout_secs
                    .or(toml.request_timeout_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            shutdown_grace: Duration::from_secs(
                overrides
                    .shutdown_grace_secs
                    .or(toml.shutdown_grace_secs)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
            max_upload_bytes: overrides
                .max_upload_bytes
                .or(toml.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            log_level: overrides
                .log_level
                .or(toml.log_level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Platform config file location (`<config dir>/mstream/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mstream").join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mstream"))
        .unwrap_or_else(|| PathBuf::from("./mstream_data"))
}

/// Default SQLite database URL inside the data folder
fn default_database_url() -> String {
    format!(
        "sqlite://{}?mode=rwc",
        default_data_folder().join("mstream.db").display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config =
            ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(config.database_url.starts_with("sqlite://"));
        assert!(config.login_url.is_empty());
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.yt_dlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_beat_toml() {
        let overrides = ConfigOverrides {
            login_url: Some("auth-cli:9000".to_string()),
            bind_addr: Some("127.0.0.1:9999".parse().unwrap()),
            request_timeout_secs: Some(90),
            max_upload_bytes: Some(1024),
            ..Default::default()
        };
        let toml = TomlConfig {
            login_url: Some("auth-toml:9000".to_string()),
            bind_addr: Some("127.0.0.1:1111".to_string()),
            request_timeout_secs: Some(45),
            shutdown_grace_secs: Some(2),
            database_url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, toml).unwrap();

        assert_eq!(config.login_url, "auth-cli:9000");
        assert_eq!(config.bind_addr, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        // Not overridden, so the TOML value wins over the default
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_invalid_toml_bind_addr_rejected() {
        let toml = TomlConfig {
            bind_addr: Some("not-an-address".to_string()),
            ..Default::default()
        };

        let err = ServiceConfig::resolve(ConfigOverrides::default(), toml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
