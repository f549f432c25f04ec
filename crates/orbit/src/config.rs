//! Client configuration.
//!
//! Layered with the `config` crate: built-in defaults, then the TOML config
//! file, then `ORBIT__SECTION__KEY` environment variables.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::session::ReconnectPolicy;

pub const APP_NAME: &str = "orbit";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profile: String,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when neither `-v` flags nor `RUST_LOG` say otherwise.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the session server lives and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL; `http(s)` is rewritten to `ws(s)`.
    pub base_url: String,
    /// Bearer token, sent as the `token` query parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".to_string(),
            token: None,
        }
    }
}

impl ServerConfig {
    /// WebSocket endpoint for a session: `<base>/ws/session/<id>[?token=..]`.
    pub fn session_endpoint(&self, session_id: &str) -> ClientResult<String> {
        if session_id.trim().is_empty() {
            return Err(ClientError::EmptySessionId);
        }

        let base = self.base_url.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(ClientError::InvalidBaseUrl(self.base_url.clone()));
        };

        let mut endpoint = format!("{base}/ws/session/{}", urlencoding::encode(session_id));
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            endpoint.push_str("?token=");
            endpoint.push_str(&urlencoding::encode(token));
        }
        Ok(endpoint)
    }
}

/// Per-session client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Workspace session to join.
    pub id: String,
    /// Give up on a handshake after this long and treat it as a failed attempt.
    pub connect_timeout_ms: u64,
    /// Number of applied patch batches kept for inspection.
    pub patch_log_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            connect_timeout_ms: 10_000,
            patch_log_capacity: 256,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Prefix for environment overrides (`ORBIT__SERVER__BASE_URL`, ...).
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Load configuration from `path` (optional) and the process environment.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    load_config_with_env(path, None)
}

/// Load configuration, reading environment overrides from `env` instead of the
/// process environment when given.
pub fn load_config_with_env(
    path: &Path,
    env: Option<config::Map<String, String>>,
) -> Result<AppConfig> {
    let defaults = AppConfig::default();
    let built = Config::builder()
        .set_default("profile", defaults.profile.as_str())?
        .set_default("logging.level", defaults.logging.level.as_str())?
        .set_default("server.base_url", defaults.server.base_url.as_str())?
        .set_default("session.id", defaults.session.id.as_str())?
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(env_prefix().as_str())
                .separator("__")
                .source(env),
        )
        .build()
        .with_context(|| format!("loading config from {}", path.display()))?;

    built
        .try_deserialize()
        .context("deserializing configuration")
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push_str("# File: ");
    body.push_str(&path.display().to_string());
    body.push_str("\n\n");
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}
