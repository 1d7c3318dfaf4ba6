// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::SinkError;
use crate::formatter::{TemplateFormatter, DEFAULT_OUTPUT_TEMPLATE};

pub const DEFAULT_BATCH_SIZE_LIMIT: usize = 10;
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(2);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SOURCE_NAME: &str = "DefaultSource";
pub const DEFAULT_SOURCE_CATEGORY: &str = "";

/// Configuration for a [`SumoLogicSink`](crate::sink::SumoLogicSink)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// URL of the Sumo Logic HTTP source
    pub endpoint: String,
    /// Sent as `X-Sumo-Name`
    pub source_name: String,
    /// Sent as `X-Sumo-Category`, omitted when blank
    pub source_category: String,
    /// Maximum number of events per batch
    pub batch_size_limit: usize,
    /// Time between flushes
    #[serde(rename = "period_secs", with = "duration_secs")]
    pub period: Duration,
    /// How long disposal may spend draining queued events
    #[serde(rename = "shutdown_timeout_secs", with = "duration_secs")]
    pub shutdown_timeout: Duration,
    /// Per request timeout of the HTTP transport
    #[serde(rename = "request_timeout_secs", with = "duration_secs")]
    pub request_timeout: Duration,
    /// Output template for the default formatter
    pub output_template: String,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            source_category: DEFAULT_SOURCE_CATEGORY.to_string(),
            batch_size_limit: DEFAULT_BATCH_SIZE_LIMIT,
            period: DEFAULT_PERIOD,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            https_proxy: None,
        }
    }
}

impl SinkConfig {
    /// Configuration with defaults for everything but the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, SinkError> {
        let defaults = Self::default();

        let endpoint = env::var("SUMO_ENDPOINT").unwrap_or_default();
        let source_name = env::var("SUMO_SOURCE_NAME").unwrap_or(defaults.source_name);
        let source_category =
            env::var("SUMO_SOURCE_CATEGORY").unwrap_or(defaults.source_category);
        let batch_size_limit = env::var("SUMO_BATCH_SIZE_LIMIT")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.batch_size_limit);
        let period = env_secs("SUMO_PERIOD_SECS").unwrap_or(defaults.period);
        let shutdown_timeout =
            env_secs("SUMO_SHUTDOWN_TIMEOUT_SECS").unwrap_or(defaults.shutdown_timeout);
        let request_timeout =
            env_secs("SUMO_REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout);
        let output_template =
            env::var("SUMO_OUTPUT_TEMPLATE").unwrap_or(defaults.output_template);
        let https_proxy = env::var("SUMO_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        let config = Self {
            endpoint,
            source_name,
            source_category,
            batch_size_limit,
            period,
            shutdown_timeout,
            request_timeout,
            output_template,
            https_proxy,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.endpoint.trim().is_empty() {
            return Err(SinkError::InvalidConfig(
                "endpoint cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(self.endpoint.trim())
            .map_err(|e| SinkError::InvalidConfig(format!("invalid endpoint URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got scheme '{}'",
                url.scheme()
            )));
        }

        if self.batch_size_limit == 0 {
            return Err(SinkError::InvalidConfig(
                "batch size limit must be greater than 0".to_string(),
            ));
        }

        if self.period.is_zero() {
            return Err(SinkError::InvalidConfig(
                "period must be greater than 0".to_string(),
            ));
        }

        if HeaderValue::from_str(&self.source_name).is_err() {
            return Err(SinkError::InvalidConfig(format!(
                "source name '{}' is not a valid header value",
                self.source_name
            )));
        }

        if HeaderValue::from_str(&self.source_category).is_err() {
            return Err(SinkError::InvalidConfig(format!(
                "source category '{}' is not a valid header value",
                self.source_category
            )));
        }

        TemplateFormatter::new(&self.output_template)?;

        Ok(())
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> SinkConfig {
        SinkConfig::new("https://collectors.sumologic.com/receiver/v1/http/abc")
    }

    #[test]
    fn test_default_config_values() {
        let config = SinkConfig::default();
        assert_eq!(config.batch_size_limit, 10);
        assert_eq!(config.period, Duration::from_secs(2));
        assert_eq!(config.source_name, "DefaultSource");
        assert!(config.source_category.is_empty());
        assert_eq!(config.output_template, DEFAULT_OUTPUT_TEMPLATE);
    }

    #[test]
    fn test_valid_config() {
        assert!(create_test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_endpoint() {
        for endpoint in ["", "   ", "\t\n"] {
            let config = SinkConfig::new(endpoint);
            assert!(
                matches!(config.validate(), Err(SinkError::InvalidConfig(_))),
                "endpoint {endpoint:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_bad_endpoint() {
        assert!(SinkConfig::new("not a url").validate().is_err());
        assert!(SinkConfig::new("ftp://example.com/in").validate().is_err());
    }

    #[test]
    fn test_validate_zero_batch_size_and_period() {
        let config = SinkConfig {
            batch_size_limit: 0,
            ..create_test_config()
        };
        assert!(config.validate().is_err());

        let config = SinkConfig {
            period: Duration::ZERO,
            ..create_test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_header_values() {
        let config = SinkConfig {
            source_category: "bad\ncategory".to_string(),
            ..create_test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_output_template() {
        let config = SinkConfig {
            output_template: "{Message".to_string(),
            ..create_test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SinkConfig = serde_json::from_str(
            r#"{"endpoint":"https://example.com/in","source_category":"prod/app","period_secs":0.5}"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "https://example.com/in");
        assert_eq!(config.source_category, "prod/app");
        assert_eq!(config.period, Duration::from_millis(500));
        assert_eq!(config.batch_size_limit, DEFAULT_BATCH_SIZE_LIMIT);
        assert_eq!(config.source_name, DEFAULT_SOURCE_NAME);
    }

    #[test]
    fn test_deserialize_rejects_negative_duration() {
        let result: Result<SinkConfig, _> = serde_json::from_str(r#"{"period_secs":-1}"#);
        assert!(result.is_err());
    }
}
