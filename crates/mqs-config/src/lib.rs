// SPDX-License-Identifier: MIT OR Apache-2.0
//! Endpoint configuration for the mq-stream client.
//!
//! This crate provides [`ClientOptions`] — protocol, host, port, and API
//! version of the queue service — together with helpers for loading from TOML
//! profiles, applying `MQS_*` environment overrides, merging overlays, and
//! producing advisory [`ConfigWarning`]s.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use mqs_error::MqError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found or not readable.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl From<ConfigError> for MqError {
    fn from(err: ConfigError) -> Self {
        MqError::invalid_config(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The endpoint uses plain `http`; credentials travel unencrypted.
    PlainHttp,
    /// The protocol/port combination is unusual (e.g. `https` on port 80).
    UnusualPort {
        /// Configured protocol.
        protocol: String,
        /// Configured port.
        port: u16,
    },
    /// The request timeout is unusually large.
    LargeTimeout {
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::PlainHttp => {
                write!(f, "endpoint uses plain http; the OAuth token travels unencrypted")
            }
            ConfigWarning::UnusualPort { protocol, port } => {
                write!(f, "unusual port {port} for protocol '{protocol}'")
            }
            ConfigWarning::LargeTimeout { secs } => {
                write!(f, "request timeout is unusually large ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default service host.
pub const DEFAULT_HOST: &str = "mq-aws-us-east-1.iron.io";

/// Default service port.
pub const DEFAULT_PORT: u16 = 443;

/// Default protocol.
pub const DEFAULT_PROTOCOL: &str = "https";

/// Default API version segment.
pub const DEFAULT_API_VERSION: &str = "1";

/// Protocols the client knows how to speak.
const VALID_PROTOCOLS: &[&str] = &["http", "https"];

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 600;

// ---------------------------------------------------------------------------
// ClientOptions
// ---------------------------------------------------------------------------

/// Endpoint options for the queue service.
///
/// The defaults point at the production endpoint; every field can be
/// overridden via a TOML profile, an overlay, or `MQS_*` environment
/// variables.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClientOptions {
    /// Wire protocol, `"http"` or `"https"`.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Service hostname.
    #[serde(default = "default_host")]
    pub host: String,

    /// Service port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// API version segment of the base URL.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Optional whole-request timeout in seconds, applied to the underlying
    /// HTTP client. `None` means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            api_version: default_api_version(),
            request_timeout_secs: None,
        }
    }
}

impl ClientOptions {
    /// Format the base URL, `<protocol>://<host>:<port>/<version>/`.
    ///
    /// The trailing slash matters: operation paths are joined under it.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}/{}/",
            self.protocol, self.host, self.port, self.api_version
        )
    }

    /// Validate the options, returning hard errors.
    ///
    /// See [`ClientOptions::warnings`] for advisory-level findings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();

        if !VALID_PROTOCOLS.contains(&self.protocol.as_str()) {
            reasons.push(format!(
                "unknown protocol '{}' (expected one of {VALID_PROTOCOLS:?})",
                self.protocol
            ));
        }
        if self.host.trim().is_empty() {
            reasons.push("host cannot be empty".to_string());
        }
        if self.port == 0 {
            reasons.push("port cannot be 0".to_string());
        }
        if self.api_version.trim().is_empty() {
            reasons.push("api_version cannot be empty".to_string());
        }
        if self.api_version.contains('/') {
            reasons.push("api_version cannot contain '/'".to_string());
        }
        if self.request_timeout_secs == Some(0) {
            reasons.push("request_timeout_secs cannot be 0; omit it for no timeout".to_string());
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }

    /// Advisory warnings for configurations that are valid but suspicious.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();
        if self.protocol == "http" {
            out.push(ConfigWarning::PlainHttp);
        }
        match (self.protocol.as_str(), self.port) {
            ("https", 80) | ("http", 443) => out.push(ConfigWarning::UnusualPort {
                protocol: self.protocol.clone(),
                port: self.port,
            }),
            _ => {}
        }
        if let Some(secs) = self.request_timeout_secs
            && secs > LARGE_TIMEOUT_THRESHOLD
        {
            out.push(ConfigWarning::LargeTimeout { secs });
        }
        out
    }

    /// Overlay `other` on top of `self`: any field in `other` that differs
    /// from the default wins.
    pub fn merged_with(&self, other: &ClientOptions) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            protocol: pick(&self.protocol, &other.protocol, &defaults.protocol),
            host: pick(&self.host, &other.host, &defaults.host),
            port: if other.port != defaults.port {
                other.port
            } else {
                self.port
            },
            api_version: pick(&self.api_version, &other.api_version, &defaults.api_version),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }
}

fn pick(base: &str, overlay: &str, default: &str) -> String {
    if overlay != default {
        overlay.to_string()
    } else {
        base.to_string()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load [`ClientOptions`] from an optional TOML profile.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ClientOptions::default()`].
///
/// `MQS_*` environment variable overrides are applied on top in both cases.
pub fn load_options(path: Option<&Path>) -> Result<ClientOptions, ConfigError> {
    let mut options = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ClientOptions::default(),
    };
    apply_overrides(&mut options, std::env::vars());
    options.validate()?;
    Ok(options)
}

/// Parse a TOML string into [`ClientOptions`].
pub fn parse_toml(content: &str) -> Result<ClientOptions, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Apply overrides from an iterator of `(key, value)` pairs.
///
/// Recognised keys: `MQS_PROTOCOL`, `MQS_HOST`, `MQS_PORT`,
/// `MQS_API_VERSION`, `MQS_REQUEST_TIMEOUT_SECS`. Unparseable numeric values
/// are ignored rather than erroring; validation runs afterwards and catches
/// the resulting state if it is inconsistent.
pub fn apply_overrides<I>(options: &mut ClientOptions, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        match key.as_str() {
            "MQS_PROTOCOL" => options.protocol = value,
            "MQS_HOST" => options.host = value,
            "MQS_PORT" => {
                if let Ok(port) = value.parse() {
                    options.port = port;
                }
            }
            "MQS_API_VERSION" => options.api_version = value,
            "MQS_REQUEST_TIMEOUT_SECS" => {
                if let Ok(secs) = value.parse() {
                    options.request_timeout_secs = Some(secs);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_production() {
        let opts = ClientOptions::default();
        assert_eq!(opts.protocol, "https");
        assert_eq!(opts.host, "mq-aws-us-east-1.iron.io");
        assert_eq!(opts.port, 443);
        assert_eq!(opts.api_version, "1");
        assert!(opts.request_timeout_secs.is_none());
        assert!(opts.validate().is_ok());
        assert!(opts.warnings().is_empty());
    }

    #[test]
    fn base_url_format() {
        let opts = ClientOptions::default();
        assert_eq!(opts.base_url(), "https://mq-aws-us-east-1.iron.io:443/1/");

        let opts = ClientOptions {
            protocol: "http".into(),
            host: "localhost".into(),
            port: 8080,
            api_version: "3".into(),
            request_timeout_secs: None,
        };
        assert_eq!(opts.base_url(), "http://localhost:8080/3/");
    }

    #[test]
    fn validate_rejects_bad_protocol() {
        let opts = ClientOptions {
            protocol: "gopher".into(),
            ..ClientOptions::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("gopher"));
    }

    #[test]
    fn validate_rejects_empty_host_and_zero_port() {
        let opts = ClientOptions {
            host: "  ".into(),
            port: 0,
            ..ClientOptions::default()
        };
        match opts.validate().unwrap_err() {
            ConfigError::ValidationError { reasons } => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_slash_in_api_version() {
        let opts = ClientOptions {
            api_version: "1/extra".into(),
            ..ClientOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let opts = ClientOptions {
            request_timeout_secs: Some(0),
            ..ClientOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn warnings_for_plain_http_and_odd_port() {
        let opts = ClientOptions {
            protocol: "http".into(),
            port: 443,
            ..ClientOptions::default()
        };
        let warnings = opts.warnings();
        assert!(warnings.contains(&ConfigWarning::PlainHttp));
        assert!(warnings.iter().any(|w| matches!(
            w,
            ConfigWarning::UnusualPort { port: 443, .. }
        )));
    }

    #[test]
    fn warnings_for_large_timeout() {
        let opts = ClientOptions {
            request_timeout_secs: Some(3600),
            ..ClientOptions::default()
        };
        assert_eq!(
            opts.warnings(),
            vec![ConfigWarning::LargeTimeout { secs: 3600 }]
        );
    }

    #[test]
    fn parse_toml_partial_profile_keeps_defaults() {
        let opts = parse_toml("host = \"mq.example.com\"\nport = 8080\n").unwrap();
        assert_eq!(opts.host, "mq.example.com");
        assert_eq!(opts.port, 8080);
        assert_eq!(opts.protocol, "https");
        assert_eq!(opts.api_version, "1");
    }

    #[test]
    fn parse_toml_rejects_garbage() {
        assert!(matches!(
            parse_toml("host = ["),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn load_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "protocol = \"http\"").unwrap();
        writeln!(file, "host = \"localhost\"").unwrap();
        writeln!(file, "port = 8080").unwrap();
        let opts = load_options(Some(file.path())).unwrap();
        assert_eq!(opts.base_url(), "http://localhost:8080/1/");
    }

    #[test]
    fn load_missing_file_errors() {
        let err = load_options(Some(Path::new("/nonexistent/mqs.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn overrides_apply_known_keys_only() {
        let mut opts = ClientOptions::default();
        apply_overrides(
            &mut opts,
            vec![
                ("MQS_HOST".to_string(), "mq.internal".to_string()),
                ("MQS_PORT".to_string(), "9443".to_string()),
                ("MQS_REQUEST_TIMEOUT_SECS".to_string(), "30".to_string()),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ],
        );
        assert_eq!(opts.host, "mq.internal");
        assert_eq!(opts.port, 9443);
        assert_eq!(opts.request_timeout_secs, Some(30));
        assert_eq!(opts.protocol, "https");
    }

    #[test]
    fn overrides_ignore_unparseable_port() {
        let mut opts = ClientOptions::default();
        apply_overrides(
            &mut opts,
            vec![("MQS_PORT".to_string(), "not-a-port".to_string())],
        );
        assert_eq!(opts.port, 443);
    }

    #[test]
    fn merged_with_overlay_wins_where_set() {
        let base = ClientOptions {
            host: "base.example.com".into(),
            port: 8080,
            ..ClientOptions::default()
        };
        let overlay = ClientOptions {
            host: "overlay.example.com".into(),
            request_timeout_secs: Some(15),
            ..ClientOptions::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.host, "overlay.example.com");
        assert_eq!(merged.port, 8080);
        assert_eq!(merged.request_timeout_secs, Some(15));
    }

    #[test]
    fn config_error_converts_to_mq_error() {
        let err: MqError = ConfigError::FileNotFound {
            path: "x.toml".into(),
        }
        .into();
        assert_eq!(err.kind(), mqs_error::ErrorKind::Config);
    }

    #[test]
    fn options_json_schema_builds() {
        let schema = schemars::schema_for!(ClientOptions);
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["properties"]["host"].is_object());
    }
}
