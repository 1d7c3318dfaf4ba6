// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Sumo Logic sink
//!
//! A periodic batching log sink: producers hand over [`LogEvent`]s without
//! blocking, a background worker cuts them into bounded batches on a fixed
//! period and posts every event of a batch, formatted as text, to a Sumo Logic
//! HTTP source.
//!
//! ```text
//!   producers ──emit──> EventQueue ──> BatchAccumulator ──> PeriodicScheduler
//!                                                                │ one batch at a time
//!                                                                v
//!                                    TextFormatter <── DeliveryAdapter ──> Transport (POST)
//! ```
//!
//! - [`sink`]: lifecycle (start, emit, flush, dispose)
//! - [`scheduler`]: the tick loop, single-flight delivery and drain on shutdown
//! - [`delivery`]: per-event formatting and concurrent submission
//! - [`transport`]: the HTTP source client and its labelling headers
//! - [`layer`]: a `tracing_subscriber::Layer` feeding the sink
//!
//! Delivery is best effort: an event that fails to format or to send is
//! logged and dropped, never retried.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod accumulator;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod formatter;
pub mod layer;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::SinkConfig;
pub use error::{FormatError, SinkError, TransportError};
pub use event::{Level, LogEvent};
pub use formatter::{JsonFormatter, RawFormatter, TemplateFormatter, TextFormatter};
pub use layer::SumoLogicLayer;
pub use sink::SumoLogicSink;
pub use transport::{HttpTransport, Transport};
