//! Configuration module
//!
//! Settings for the signing queue are read from the environment (with `.env`
//! support). Every setting except the signing endpoint has a default.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PdfSignError;

const POLL_INTERVAL_MS: u64 = 1000;
const STROKE_WIDTH: f64 = 2.0;
const MAX_FILE_SIZE_MB: usize = 32;
const HTTP_TIMEOUT_SECS: u64 = 0;

/// Signing variant served by one orchestrator instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// Server-side signature with the official seal.
    #[default]
    Official,
    /// Personal qualified signature confirmed through a second-factor challenge.
    Qualified,
}

impl FlowKind {
    /// Profile identifier sent with every upload.
    pub fn profile(&self) -> &'static str {
        match self {
            FlowKind::Official => "official",
            FlowKind::Qualified => "default",
        }
    }
}

impl Display for FlowKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FlowKind::Official => write!(f, "official"),
            FlowKind::Qualified => write!(f, "qualified"),
        }
    }
}

impl FromStr for FlowKind {
    type Err = PdfSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "official" => Ok(FlowKind::Official),
            "qualified" => Ok(FlowKind::Qualified),
            _ => Err(PdfSignError::Config(format!("Invalid signing flow: {}", s))),
        }
    }
}

/// Language for user-facing messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    De,
    En,
}

impl Display for Lang {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Lang::De => write!(f, "de"),
            Lang::En => write!(f, "en"),
        }
    }
}

impl FromStr for Lang {
    type Err = PdfSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "de" => Ok(Lang::De),
            "en" => Ok(Lang::En),
            _ => Err(PdfSignError::Config(format!("Unsupported language: {}", s))),
        }
    }
}

/// Signing queue configuration
#[derive(Clone, Debug)]
pub struct SigningConfig {
    pub flow: FlowKind,
    /// Endpoint receiving the multipart upload.
    pub file_source_url: String,
    /// Base URL of the qualified flow's second step.
    pub artifact_url: Option<String>,
    pub poll_interval_ms: u64,
    /// Stroke width of the on-screen placeholder; half of it shifts the anchor.
    pub stroke_width: f64,
    /// Host name written into the human-readable annotation author.
    pub hostname: String,
    pub lang: Lang,
    pub max_file_size_bytes: usize,
    /// 0 keeps the transport default (no timeout).
    pub http_timeout_secs: u64,
}

impl SigningConfig {
    /// Minimal configuration for the given flow and endpoint, all other fields defaulted.
    pub fn new(flow: FlowKind, file_source_url: impl Into<String>) -> Self {
        Self {
            flow,
            file_source_url: file_source_url.into(),
            artifact_url: None,
            poll_interval_ms: POLL_INTERVAL_MS,
            stroke_width: STROKE_WIDTH,
            hostname: local_hostname(),
            lang: Lang::default(),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Ok(Self::from_vars(|key| env::var(key).ok())?)
    }

    /// Build from an arbitrary variable lookup. Used by `from_env` and by tests.
    pub fn from_vars<F>(lookup: F) -> Result<Self, PdfSignError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flow = match lookup("PDFSIGN_FLOW") {
            Some(s) => s.parse()?,
            None => FlowKind::default(),
        };

        let file_source_url = lookup("PDFSIGN_FILE_SOURCE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PdfSignError::Config("PDFSIGN_FILE_SOURCE_URL must be set".into()))?;

        let lang = match lookup("PDFSIGN_LANG") {
            Some(s) => s.parse()?,
            None => Lang::default(),
        };

        let config = SigningConfig {
            flow,
            file_source_url: file_source_url.trim().to_string(),
            artifact_url: lookup("PDFSIGN_ARTIFACT_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            poll_interval_ms: lookup("PDFSIGN_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(POLL_INTERVAL_MS),
            stroke_width: lookup("PDFSIGN_STROKE_WIDTH")
                .and_then(|s| s.parse().ok())
                .unwrap_or(STROKE_WIDTH),
            hostname: lookup("PDFSIGN_HOSTNAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(local_hostname),
            lang,
            max_file_size_bytes: lookup("PDFSIGN_MAX_FILE_SIZE_MB")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            http_timeout_secs: lookup("PDFSIGN_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(HTTP_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PdfSignError> {
        if !is_http_url(&self.file_source_url) {
            return Err(PdfSignError::Config(
                "PDFSIGN_FILE_SOURCE_URL must be an http(s) URL".into(),
            ));
        }

        match (&self.flow, &self.artifact_url) {
            (FlowKind::Qualified, None) => {
                return Err(PdfSignError::Config(
                    "PDFSIGN_ARTIFACT_URL must be set for the qualified flow".into(),
                ))
            }
            (_, Some(url)) if !is_http_url(url) => {
                return Err(PdfSignError::Config(
                    "PDFSIGN_ARTIFACT_URL must be an http(s) URL".into(),
                ))
            }
            _ => {}
        }

        if self.poll_interval_ms == 0 {
            return Err(PdfSignError::Config(
                "PDFSIGN_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }

        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(PdfSignError::Config(
                "PDFSIGN_STROKE_WIDTH must be a non-negative number".into(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }

    pub fn profile(&self) -> &'static str {
        self.flow.profile()
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<SigningConfig, PdfSignError> {
        let map = vars(pairs);
        SigningConfig::from_vars(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_endpoint_is_set() {
        let config = load(&[("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com/sign")]).unwrap();
        assert_eq!(config.flow, FlowKind::Official);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.stroke_width, 2.0);
        assert_eq!(config.lang, Lang::De);
        assert_eq!(config.max_file_size_bytes, 32 * 1024 * 1024);
        assert!(config.http_timeout().is_none());
        assert_eq!(config.profile(), "official");
        assert!(!config.hostname.is_empty());
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, PdfSignError::Config(_)));
    }

    #[test]
    fn qualified_flow_requires_artifact_url() {
        let err = load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com/sign"),
            ("PDFSIGN_FLOW", "qualified"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PDFSIGN_ARTIFACT_URL"));

        let config = load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com/sign"),
            ("PDFSIGN_FLOW", "Qualified"),
            ("PDFSIGN_ARTIFACT_URL", "https://sign.example.com/qualified/"),
        ])
        .unwrap();
        assert_eq!(config.flow, FlowKind::Qualified);
        assert_eq!(config.profile(), "default");
        assert_eq!(
            config.artifact_url.as_deref(),
            Some("https://sign.example.com/qualified")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("PDFSIGN_FILE_SOURCE_URL", "ftp://example.com")]).is_err());
        assert!(load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com"),
            ("PDFSIGN_POLL_INTERVAL_MS", "0"),
        ])
        .is_err());
        assert!(load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com"),
            ("PDFSIGN_STROKE_WIDTH", "-1"),
        ])
        .is_err());
        assert!(load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "https://sign.example.com"),
            ("PDFSIGN_LANG", "fr"),
        ])
        .is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PDFSIGN_FILE_SOURCE_URL", "http://localhost:8000/sign"),
            ("PDFSIGN_POLL_INTERVAL_MS", "250"),
            ("PDFSIGN_STROKE_WIDTH", "4"),
            ("PDFSIGN_HOSTNAME", "portal.example.com"),
            ("PDFSIGN_LANG", "en"),
            ("PDFSIGN_MAX_FILE_SIZE_MB", "5"),
            ("PDFSIGN_HTTP_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.stroke_width, 4.0);
        assert_eq!(config.hostname, "portal.example.com");
        assert_eq!(config.lang, Lang::En);
        assert_eq!(config.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));
    }
}
