//! Centralized configuration for the gate.
//!
//! The protected host is the only required setting; the login path and
//! return-URL parameter describe the authentication provider's endpoint.

use serde::{Deserialize, Serialize};

/// Host whose media requires an authenticated session by default.
pub const DEFAULT_PROTECTED_HOST: &str = "moodle.ksasz.ch";

/// Login endpoint path on the protected host.
pub const DEFAULT_LOGIN_PATH: &str = "/login/index.php";

/// Query parameter carrying the return URL.
pub const DEFAULT_RETURN_PARAM: &str = "wantsurl";

/// Configuration for one gate instance.
///
/// `protected_host: None` makes the gate inert: no source is ever classified
/// as protected, so nothing is bound and no prompt is ever shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Hostname used for source classification and redirect construction
    pub protected_host: Option<String>,
    /// Path of the provider's login endpoint
    pub login_path: String,
    /// Query parameter name for the return URL
    pub return_param: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protected_host: Some(DEFAULT_PROTECTED_HOST.to_string()),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            return_param: DEFAULT_RETURN_PARAM.to_string(),
        }
    }
}

impl GateConfig {
    /// Creates a configuration gating the given host.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            protected_host: Some(host.into()),
            ..Default::default()
        }
    }

    /// Creates a configuration with no protected host.
    pub fn inert() -> Self {
        Self {
            protected_host: None,
            ..Default::default()
        }
    }

    /// Creates a configuration for tests, gating the default host.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Creates configuration with environment variable overrides.
    ///
    /// An empty `AUDIOGATE_PROTECTED_HOST` disables gating.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("AUDIOGATE_PROTECTED_HOST") {
            let host = host.trim();
            config.protected_host = if host.is_empty() {
                None
            } else {
                Some(host.to_string())
            };
        }

        if let Ok(path) = std::env::var("AUDIOGATE_LOGIN_PATH") {
            if !path.trim().is_empty() {
                config.login_path = path.trim().to_string();
            }
        }

        if let Ok(param) = std::env::var("AUDIOGATE_RETURN_PARAM") {
            if !param.trim().is_empty() {
                config.return_param = param.trim().to_string();
            }
        }

        config
    }

    /// Protected host trimmed and lowercased, or `None` when gating is off.
    pub fn normalized_host(&self) -> Option<String> {
        self.protected_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Returns true when a protected host is configured.
    pub fn is_active(&self) -> bool {
        self.normalized_host().is_some()
    }
}
