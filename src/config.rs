//! Configuration types for the rotation pipeline.
//!
//! [`AppConfig`] is plain data: the entry point loads it from a TOML file
//! (plus environment overrides) and hands it to the pipeline. The core
//! never computes filesystem paths or reads the environment itself.

use crate::error::{Result, RotationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `service.password`.
pub const PASSWORD_ENV: &str = "HOURFACE_PASSWORD";

/// Top-level configuration for one update cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote service account settings.
    pub service: ServiceConfig,
    /// Schedule location and rotation behaviour.
    pub rotation: RotationConfig,
    /// Network timeouts.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Remote service account settings.
///
/// `Debug` redacts the password so the config can be logged safely.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base address of the service, e.g. `https://pds.example.net`.
    /// A missing scheme or a plain-HTTP scheme is normalized before use.
    pub endpoint: String,
    /// Account handle used for login.
    pub handle: String,
    /// Account (app) password. Overridable via `HOURFACE_PASSWORD`.
    #[serde(default)]
    pub password: String,
    /// Repository DID. When absent, the DID returned at login is used.
    #[serde(default)]
    pub did: Option<String>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("handle", &self.handle)
            .field("password", &redact(&self.password))
            .field("did", &self.did)
            .finish()
    }
}

fn redact(s: &str) -> &str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

/// Schedule location and rotation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Path to the hour-keyed schedule file (JSON).
    pub schedule_path: PathBuf,
    /// Whether banner directives in the schedule are honoured.
    /// When `false`, every cycle leaves the banner untouched.
    #[serde(default)]
    pub update_banner: bool,
}

/// Network timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds, applied to every network call.
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RotationError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| {
            RotationError::Config(format!("cannot parse config {}: {e}", path.display()))
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment overrides (currently only the password).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(PASSWORD_ENV)
            && !password.is_empty()
        {
            self.service.password = password;
        }
    }

    /// Validates this configuration, returning an error before any
    /// network call is made.
    ///
    /// Checks:
    /// - `service.endpoint`, `service.handle` and `service.password` must
    ///   be non-empty
    /// - `rotation.schedule_path` must be non-empty
    /// - `network.timeout_secs` must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.service.endpoint.trim().is_empty() {
            return Err(RotationError::Config("service.endpoint is not set".into()));
        }
        if self.service.handle.trim().is_empty() {
            return Err(RotationError::Config("service.handle is not set".into()));
        }
        if self.service.password.is_empty() {
            return Err(RotationError::Config(format!(
                "service.password is not set (config file or {PASSWORD_ENV})"
            )));
        }
        if self.rotation.schedule_path.as_os_str().is_empty() {
            return Err(RotationError::Config(
                "rotation.schedule_path is not set".into(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(RotationError::Config(
                "network.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Per-request network timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }
}
