// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Submitting one formatted record to the ingestion endpoint.
//!
//! [`Transport`] is the seam the delivery adapter talks to, so the scheduler and
//! adapter can be exercised without network I/O. [`HttpTransport`] is the
//! production implementation: a plain `POST` of the text body to the Sumo Logic
//! HTTP source URL.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

use crate::config::SinkConfig;
use crate::error::{SinkError, TransportError};

pub const SOURCE_NAME_HEADER: &str = "X-Sumo-Name";
pub const SOURCE_CATEGORY_HEADER: &str = "X-Sumo-Category";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(120);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one payload with the given labelling headers.
    async fn send(&self, payload: String, headers: &HeaderMap) -> Result<(), TransportError>;
}

/// Builds the source label headers once per sink.
///
/// `X-Sumo-Category` is left out entirely when the category is blank.
pub fn source_headers(source_name: &str, source_category: &str) -> Result<HeaderMap, SinkError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        SOURCE_NAME_HEADER,
        HeaderValue::from_str(source_name).map_err(|e| {
            SinkError::InvalidConfig(format!("invalid source name '{source_name}': {e}"))
        })?,
    );
    if !source_category.trim().is_empty() {
        headers.insert(
            SOURCE_CATEGORY_HEADER,
            HeaderValue::from_str(source_category).map_err(|e| {
                SinkError::InvalidConfig(format!(
                    "invalid source category '{source_category}': {e}"
                ))
            })?,
        );
    }
    Ok(headers)
}

/// Posts payloads to a Sumo Logic HTTP source.
///
/// Holds a pooled `reqwest::Client`; dropping the transport releases its
/// connections.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`SinkError::TransportInit`] if the proxy is malformed or the
    /// client cannot be built.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = build_client(config)
            .map_err(|e| SinkError::TransportInit(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn build_client(config: &SinkConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE);

    if let Some(proxy) = &config.https_proxy {
        debug!("SUMO | Using HTTPS proxy {proxy}");
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }

    builder.build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: String, headers: &HeaderMap) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers.clone())
            .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        // Only read the body on failure, it is surfaced in the diagnostics
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::Status { status, body })
    }
}
