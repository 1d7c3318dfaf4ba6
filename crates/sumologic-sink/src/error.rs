// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the sink.
//!
//! Only [`SinkError`] ever reaches the caller, and only from construction.
//! [`TransportError`] and [`FormatError`] are per-item outcomes that the
//! delivery cycle records and drops.

use reqwest::StatusCode;

/// Errors surfaced synchronously while building or driving the sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize transport: {0}")]
    TransportInit(String),

    #[error("Failed to start background worker: {0}")]
    Runtime(String),

    #[error("Sink has been disposed")]
    Disposed,
}

/// Outcome of a single failed submission.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("{0}")]
    Other(String),
}

/// A single event could not be turned into text.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write event: {0}")]
    Write(#[from] std::fmt::Error),
}
