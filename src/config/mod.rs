//! Configuration and base-address resolution
//!
//! One resolution order everywhere: explicit config file, then environment,
//! then the production default.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Production backend deployment.
const DEFAULT_BACKEND_URL: &str = "https://cutter.onrender.com";
/// Realtime SDP exchange endpoint.
const DEFAULT_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";

/// Env var overriding the backend base URL (e.g. `http://localhost:8000`
/// during development).
pub const BACKEND_URL_ENV: &str = "CUTTER_BACKEND_URL";
/// Env var overriding the realtime negotiation endpoint.
pub const REALTIME_URL_ENV: &str = "CUTTER_REALTIME_URL";

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL (the credential/chat server)
    pub backend_url: Option<String>,
    /// Realtime negotiation endpoint URL
    pub realtime_url: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "cutter-cli", "cutter-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Update endpoint settings. A `Some` value sets the field (empty string
    /// clears it back to the default); `None` leaves it untouched. Returns
    /// whether anything changed.
    pub fn set_endpoints(
        &mut self,
        backend_url: Option<String>,
        realtime_url: Option<String>,
    ) -> bool {
        let mut changed = false;
        if let Some(url) = backend_url {
            let url = if url.is_empty() {
                None
            } else {
                Some(trim_trailing_slash(&url))
            };
            if self.backend_url != url {
                self.backend_url = url;
                changed = true;
            }
        }
        if let Some(url) = realtime_url {
            let url = if url.is_empty() {
                None
            } else {
                Some(trim_trailing_slash(&url))
            };
            if self.realtime_url != url {
                self.realtime_url = url;
                changed = true;
            }
        }
        changed
    }

    /// Resolved backend base URL: config value, then env, then default.
    pub fn backend_url(&self) -> String {
        resolve(
            self.backend_url.as_deref(),
            BACKEND_URL_ENV,
            DEFAULT_BACKEND_URL,
        )
    }

    /// Resolved realtime endpoint URL: config value, then env, then default.
    pub fn realtime_url(&self) -> String {
        resolve(
            self.realtime_url.as_deref(),
            REALTIME_URL_ENV,
            DEFAULT_REALTIME_URL,
        )
    }
}

fn resolve(configured: Option<&str>, env_key: &str, default: &str) -> String {
    if let Some(url) = configured {
        if !url.is_empty() {
            return trim_trailing_slash(url);
        }
    }
    if let Ok(url) = std::env::var(env_key) {
        if !url.is_empty() {
            return trim_trailing_slash(&url);
        }
    }
    default.to_string()
}

/// Normalize so paths can always be appended as `{base}/path`.
fn trim_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
