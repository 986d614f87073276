//! Client configuration: server endpoints and timing knobs.

use crate::ConfigError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable overriding [`ClientConfig::api_url`].
pub const API_URL_ENV: &str = "STRICTLY_MINES_API_URL";
/// Environment variable overriding [`ClientConfig::ws_url`].
pub const WS_URL_ENV: &str = "STRICTLY_MINES_WS_URL";

/// Where the server lives and how the client paces itself.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API, without the `/api/games` suffix.
    #[serde(default = "default_api_url")]
    api_url: String,

    /// WebSocket endpoint speaking STOMP.
    #[serde(default = "default_ws_url")]
    ws_url: String,

    /// Fixed pause between resubscription attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    reconnect_delay_ms: u64,

    /// STOMP heart-beat interval offered to the server; 0 disables it.
    #[serde(default = "default_heartbeat_ms")]
    heartbeat_ms: u64,

    /// Clock refresh period.
    #[serde(default = "default_clock_frame_ms")]
    clock_frame_ms: u64,

    /// Per-request timeout for the action API.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_heartbeat_ms() -> u64 {
    4_000
}

fn default_clock_frame_ms() -> u64 {
    16
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            clock_frame_ms: default_clock_frame_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(api_url = %config.api_url, ws_url = %config.ws_url, "Config loaded");
        Ok(config)
    }

    /// Resolves the effective configuration.
    ///
    /// Starts from `path` if given, otherwise defaults, then applies
    /// environment overrides.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    /// Applies [`API_URL_ENV`] and [`WS_URL_ENV`] when set.
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(WS_URL_ENV).ok(),
        )
    }

    /// Replaces the endpoints that are `Some` and non-blank.
    pub fn with_overrides(mut self, api_url: Option<String>, ws_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            debug!(api_url = %url, "Overriding API URL");
            self.api_url = url;
        }
        if let Some(url) = ws_url.filter(|u| !u.trim().is_empty()) {
            debug!(ws_url = %url, "Overriding WebSocket URL");
            self.ws_url = url;
        }
        self
    }

    /// Collection endpoint for games, e.g. `http://host:8080/api/games`.
    pub fn games_endpoint(&self) -> String {
        format!("{}/api/games", self.api_url.trim_end_matches('/'))
    }

    /// Pause between resubscription attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Heart-beat period offered to the server.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Clock refresh period, never shorter than one millisecond.
    pub fn clock_frame(&self) -> Duration {
        Duration::from_millis(self.clock_frame_ms.max(1))
    }

    /// Per-request timeout for the action API.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
