//! Configuration module for environment variable parsing.
//!
//! Required values (`TOKEN`, `MYTOKEN`, `PORT`) fail fast with a
//! [`ConfigError`] naming the variable. Optional values fall back to defaults.

use std::env;
use std::fmt;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default Graph API host.
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com";

/// Default Graph API version path segment.
pub const DEFAULT_GRAPH_API_VERSION: &str = "v21.0";

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Graph API access token used for outbound sends
    pub access_token: String,

    /// Secret expected in `hub.verify_token` during the verification handshake
    pub verify_token: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// App secret for `X-Hub-Signature-256` verification; disabled when unset
    pub app_secret: Option<String>,

    /// Base URL of the Graph API
    pub graph_api_url: Url,

    /// Graph API version, e.g. `v21.0`
    pub graph_api_version: String,

    /// Outbound HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Interval between SSE keep-alive comments, in seconds
    pub events_keep_alive_secs: u64,

    /// Events buffered per subscriber before it is considered too slow
    pub events_buffer: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = required(&lookup, "TOKEN")?;
        let verify_token = required(&lookup, "MYTOKEN")?;

        let raw_port = required(&lookup, "PORT")?;
        let port = raw_port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
            name: "PORT",
            reason: e.to_string(),
        })?;

        let graph_api_url = match non_blank(&lookup, "GRAPH_API_URL") {
            Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                name: "GRAPH_API_URL",
                reason: e.to_string(),
            })?,
            None => Url::parse(DEFAULT_GRAPH_API_URL).map_err(|e| ConfigError::Invalid {
                name: "GRAPH_API_URL",
                reason: e.to_string(),
            })?,
        };

        if graph_api_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                name: "GRAPH_API_URL",
                reason: "must be an absolute http(s) URL".to_string(),
            });
        }

        Ok(Config {
            access_token,
            verify_token,
            port,
            app_secret: non_blank(&lookup, "APP_SECRET"),
            graph_api_url,
            graph_api_version: non_blank(&lookup, "GRAPH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_VERSION.to_string()),
            request_timeout_ms: parse_or(&lookup, "REQUEST_TIMEOUT_MS", 10_000),
            events_keep_alive_secs: parse_or(&lookup, "EVENTS_KEEPALIVE_SECS", 30),
            events_buffer: parse_or::<_, usize>(&lookup, "EVENTS_BUFFER", 64).max(1),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_token", &"<redacted>")
            .field("verify_token", &"<redacted>")
            .field("port", &self.port)
            .field("app_secret_set", &self.app_secret.is_some())
            .field("graph_api_url", &self.graph_api_url.as_str())
            .field("graph_api_version", &self.graph_api_version)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("events_keep_alive_secs", &self.events_keep_alive_secs)
            .field("events_buffer", &self.events_buffer)
            .finish()
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(lookup, name).ok_or(ConfigError::Missing(name))
}

fn non_blank<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Parse an optional numeric variable, warning and defaulting on bad input.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    let raw = match non_blank(lookup, name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[("TOKEN", "tok"), ("MYTOKEN", "verify"), ("PORT", "3000")];

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup_from(BASE)).unwrap();

        assert_eq!(config.access_token, "tok");
        assert_eq!(config.verify_token, "verify");
        assert_eq!(config.port, 3000);
        assert!(config.app_secret.is_none());
        assert_eq!(config.graph_api_url.as_str(), "https://graph.facebook.com/");
        assert_eq!(config.graph_api_version, "v21.0");
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.events_keep_alive_secs, 30);
        assert_eq!(config.events_buffer, 64);
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::from_lookup(lookup_from(&[("MYTOKEN", "v"), ("PORT", "1")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TOKEN"));

        let err = Config::from_lookup(lookup_from(&[("TOKEN", "t"), ("PORT", "1")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("MYTOKEN"));

        let err = Config::from_lookup(lookup_from(&[("TOKEN", "t"), ("MYTOKEN", "v")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PORT"));
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let err =
            Config::from_lookup(lookup_from(&[("TOKEN", "  "), ("MYTOKEN", "v"), ("PORT", "1")]))
                .unwrap_err();
        assert_eq!(err, ConfigError::Missing("TOKEN"));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("TOKEN", "t"),
            ("MYTOKEN", "v"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_invalid_optional_number_falls_back() {
        let mut pairs = BASE.to_vec();
        pairs.push(("REQUEST_TIMEOUT_MS", "soon"));
        pairs.push(("EVENTS_BUFFER", "0"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.events_buffer, 1);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.push(("APP_SECRET", "shh"));
        pairs.push(("GRAPH_API_URL", "http://127.0.0.1:9999"));
        pairs.push(("GRAPH_API_VERSION", "v19.0"));
        pairs.push(("EVENTS_KEEPALIVE_SECS", "5"));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.app_secret.as_deref(), Some("shh"));
        assert_eq!(config.graph_api_url.as_str(), "http://127.0.0.1:9999/");
        assert_eq!(config.graph_api_version, "v19.0");
        assert_eq!(config.events_keep_alive_secs, 5);
    }

    #[test]
    fn test_invalid_graph_url() {
        let mut pairs = BASE.to_vec();
        pairs.push(("GRAPH_API_URL", "not a url"));

        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "GRAPH_API_URL", .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_lookup(lookup_from(BASE)).unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("tok\""));
        assert!(!rendered.contains("verify\""));
        assert!(rendered.contains("<redacted>"));
    }
}
