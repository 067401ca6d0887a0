//! One-shot environment-variable configuration loader (§6).
//!
//! Unlike the teacher's Postgres-backed `ConfigService`, this node has no
//! reactive config store: everything that changes at runtime (instance id,
//! peer list, sync interval, manual external URL) lives in [`downlink_data::Store`]
//! rows instead. This module reads the process environment exactly once, at
//! startup, into a [`NodeConfig`].

use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {name}")]
    MissingVar {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// An environment variable was set but failed to parse.
    #[error("environment variable {name} has an invalid value: {reason}")]
    InvalidVar {
        /// Name of the offending variable.
        name: &'static str,
        /// Human-readable parse failure reason.
        reason: String,
    },
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Static configuration resolved once at process startup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// TCP port the HTTP API listens on (`PORT`).
    pub port: u16,
    /// Interface the HTTP API binds to; defaults to all interfaces.
    pub bind_addr: IpAddr,
    /// Container format transcoded/merged output is normalized to (`OUTPUT_FORMAT`).
    pub output_format: String,
    /// Root directory staged/in-flight downloads land under (`DOWNLOAD_PATH`).
    pub download_path: PathBuf,
    /// Root directory organized libraries live under (`MEDIA_PATH`).
    pub media_path: PathBuf,
    /// Sqlite database file path (`DB_PATH`).
    pub db_path: PathBuf,
    /// Human-readable name this instance announces to peers (`INSTANCE_NAME`).
    pub instance_name: String,
    /// Manual external URL overriding UPnP discovery, if set (`EXTERNAL_URL`).
    pub external_url: Option<String>,
    /// When `true`, every route is admitted without an API key (`AUTH_DISABLED`).
    pub auth_disabled: bool,
    /// Peer-sync sweep interval in minutes, clamped to `5..=1440` (`PEER_SYNC_INTERVAL_MINUTES`).
    pub peer_sync_interval_minutes: u32,
    /// Path to the external download subprocess binary (`DOWNLOAD_TOOL_PATH`).
    pub download_tool_path: PathBuf,
    /// File recording the currently running build's commit SHA (`BUILD_SHA_PATH`).
    pub build_sha_path: PathBuf,
    /// URL of a plaintext manifest holding the latest released build SHA, if
    /// configured (`UPDATE_MANIFEST_URL`).
    pub update_manifest_url: Option<String>,
    /// Log output format: `json` or `pretty` (`LOG_FORMAT`).
    pub log_format: Option<String>,
}

const DEFAULT_OUTPUT_FORMAT: &str = "mkv";
const DEFAULT_PEER_SYNC_INTERVAL_MINUTES: u32 = 15;
const MIN_PEER_SYNC_INTERVAL_MINUTES: u32 = 5;
const MAX_PEER_SYNC_INTERVAL_MINUTES: u32 = 1440;

impl NodeConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if a required variable is absent,
    /// or [`ConfigError::InvalidVar`] if a present variable fails to parse.
    pub fn from_env() -> ConfigResult<Self> {
        let port = parse_var("PORT", "8080")?;
        let bind_addr = parse_var("DOWNLINK_BIND_ADDR", "0.0.0.0")?;
        let output_format = env_or("OUTPUT_FORMAT", DEFAULT_OUTPUT_FORMAT);
        let download_path = PathBuf::from(env_or("DOWNLOAD_PATH", "data/downloads"));
        let media_path = PathBuf::from(env_or("MEDIA_PATH", "data/media"));
        let db_path = PathBuf::from(env_or("DB_PATH", "data/downlink.sqlite"));
        let instance_name = env_or("INSTANCE_NAME", "downlink");
        let external_url = std::env::var("EXTERNAL_URL").ok().filter(|value| !value.is_empty());
        let auth_disabled = env_flag("AUTH_DISABLED");
        let peer_sync_interval_minutes = parse_var_opt("PEER_SYNC_INTERVAL_MINUTES")?
            .unwrap_or(DEFAULT_PEER_SYNC_INTERVAL_MINUTES)
            .clamp(MIN_PEER_SYNC_INTERVAL_MINUTES, MAX_PEER_SYNC_INTERVAL_MINUTES);
        let download_tool_path = PathBuf::from(env_or("DOWNLOAD_TOOL_PATH", "download-tool"));
        let build_sha_path = PathBuf::from(env_or("BUILD_SHA_PATH", "BUILD_SHA"));
        let update_manifest_url = std::env::var("UPDATE_MANIFEST_URL").ok().filter(|value| !value.is_empty());
        let log_format = std::env::var("LOG_FORMAT").ok().filter(|value| !value.is_empty());

        Ok(Self {
            port,
            bind_addr,
            output_format,
            download_path,
            media_path,
            db_path,
            instance_name,
            external_url,
            auth_disabled,
            peer_sync_interval_minutes,
            download_tool_path,
            build_sha_path,
            update_manifest_url,
            log_format,
        })
    }
}

fn env_or(name: &'static str, default: &str) -> String {
    std::env::var(name).ok().filter(|value| !value.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_flag(name: &'static str) -> bool {
    std::env::var(name).ok().is_some_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> ConfigResult<T> {
    let raw = env_or(name, default);
    raw.parse().map_err(|_err| ConfigError::InvalidVar {
        name,
        reason: format!("could not parse {raw:?}"),
    })
}

fn parse_var_opt<T: std::str::FromStr>(name: &'static str) -> ConfigResult<Option<T>> {
    match std::env::var(name).ok().filter(|value| !value.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_err| ConfigError::InvalidVar { name, reason: format!("could not parse {raw:?}") }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_handles_truthy_and_falsey() {
        assert!(!env_flag("DOWNLINK_APP_TEST_FLAG_THAT_DOES_NOT_EXIST"));
    }

    #[test]
    fn parse_var_falls_back_to_default() {
        let port: u16 = parse_var("DOWNLINK_APP_TEST_PORT_THAT_DOES_NOT_EXIST", "9090").unwrap();
        assert_eq!(port, 9090);
    }

    #[test]
    fn parse_var_opt_returns_none_when_unset() {
        let value: Option<u32> = parse_var_opt("DOWNLINK_APP_TEST_OPT_THAT_DOES_NOT_EXIST").unwrap();
        assert_eq!(value, None);
    }
}
