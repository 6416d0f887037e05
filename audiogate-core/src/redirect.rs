//! Authentication redirect construction.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::config::GateConfig;
use crate::{GateError, Result};

/// The provider's login endpoint, validated once at configuration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEndpoint {
    login_url: String,
    return_param: String,
}

impl LoginEndpoint {
    /// Creates the default endpoint (`/login/index.php?wantsurl=`) on a host.
    ///
    /// # Errors
    ///
    /// - `GateError::Configuration` - The host does not form a valid HTTPS URL
    pub fn for_host(host: &str) -> Result<Self> {
        Self::from_config(&GateConfig::for_host(host))
    }

    /// Creates the endpoint described by a gate configuration.
    ///
    /// # Errors
    ///
    /// - `GateError::Configuration` - No protected host, a host that is not a
    ///   bare hostname, or an empty return parameter
    /// - `GateError::UrlParsing` - The endpoint does not parse as a URL
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let host = config
            .normalized_host()
            .ok_or_else(|| GateError::Configuration {
                reason: "no protected host configured".to_string(),
            })?;

        if config.return_param.trim().is_empty() {
            return Err(GateError::Configuration {
                reason: "return URL parameter must not be empty".to_string(),
            });
        }

        let path = if config.login_path.starts_with('/') {
            config.login_path.clone()
        } else {
            format!("/{}", config.login_path)
        };

        let parsed = Url::parse(&format!("https://{host}{path}"))?;
        if parsed.host_str() != Some(host.as_str()) || parsed.query().is_some() {
            return Err(GateError::Configuration {
                reason: format!("'{host}{path}' is not a valid login endpoint"),
            });
        }

        Ok(Self {
            login_url: parsed.to_string(),
            return_param: config.return_param.trim().to_string(),
        })
    }

    /// Login URL without the return parameter.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Builds the redirect intent returning the user to `current_location`.
    pub fn build(&self, current_location: &str) -> RedirectIntent {
        RedirectIntent {
            provider_login_url: self.login_url.clone(),
            return_param: self.return_param.clone(),
            return_url: current_location.to_string(),
        }
    }
}

/// A single navigation to the login endpoint carrying the return URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectIntent {
    pub provider_login_url: String,
    pub return_param: String,
    pub return_url: String,
}

impl RedirectIntent {
    /// Fully qualified navigation target.
    pub fn url(&self) -> String {
        format!(
            "{}?{}={}",
            self.provider_login_url,
            self.return_param,
            urlencoding::encode(&self.return_url)
        )
    }
}

impl fmt::Display for RedirectIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_return_url() {
        let endpoint = LoginEndpoint::for_host("moodle.ksasz.ch").unwrap();
        let intent = endpoint.build("https://site.example/episode/12");

        assert_eq!(
            intent.url(),
            "https://moodle.ksasz.ch/login/index.php?wantsurl=https%3A%2F%2Fsite.example%2Fepisode%2F12"
        );
        assert_eq!(intent.return_url, "https://site.example/episode/12");
        assert_eq!(intent.provider_login_url, "https://moodle.ksasz.ch/login/index.php");
    }

    #[test]
    fn test_query_and_fragment_are_encoded() {
        let endpoint = LoginEndpoint::for_host("moodle.ksasz.ch").unwrap();
        let intent = endpoint.build("https://site.example/podcasts/m2a/?p=1&q=a b#ep-3");

        assert_eq!(
            intent.to_string(),
            "https://moodle.ksasz.ch/login/index.php?wantsurl=https%3A%2F%2Fsite.example%2Fpodcasts%2Fm2a%2F%3Fp%3D1%26q%3Da%20b%23ep-3"
        );
    }

    #[test]
    fn test_custom_endpoint() {
        let config = GateConfig {
            protected_host: Some("LMS.example.org".to_string()),
            login_path: "auth/login".to_string(),
            return_param: "next".to_string(),
        };
        let endpoint = LoginEndpoint::from_config(&config).unwrap();

        assert_eq!(
            endpoint.build("https://a.example/").url(),
            "https://lms.example.org/auth/login?next=https%3A%2F%2Fa.example%2F"
        );
    }

    #[test]
    fn test_malformed_endpoints_are_configuration_errors() {
        assert!(matches!(
            LoginEndpoint::from_config(&GateConfig::inert()),
            Err(GateError::Configuration { .. })
        ));
        assert!(LoginEndpoint::for_host("moodle.ksasz.ch/evil?x=").is_err());
        assert!(LoginEndpoint::for_host("user@moodle.ksasz.ch").is_err());

        let config = GateConfig {
            return_param: " ".to_string(),
            ..GateConfig::default()
        };
        assert!(LoginEndpoint::from_config(&config).is_err());
    }
}
