// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards `tracing` events into a [`SumoLogicSink`].
//!
//! ```ignore
//! let sink = Arc::new(SumoLogicSink::start(SinkConfig::from_env()?)?);
//! tracing_subscriber::registry()
//!     .with(SumoLogicLayer::new(Arc::clone(&sink)).with_min_level(Level::Info))
//!     .init();
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::event::{render_error_chain, Level, LogEvent};
use crate::sink::SumoLogicSink;

const MESSAGE_FIELD: &str = "message";
const ERROR_FIELD: &str = "error";
const TARGET_PROPERTY: &str = "target";

/// Crates whose events never reach the sink: our own diagnostics and the
/// HTTP stack underneath the transport would otherwise feed back into it.
const IGNORED_CRATES: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "h2",
    "hyper",
    "hyper_rustls",
    "hyper_util",
    "mio",
    "reqwest",
    "rustls",
    "tokio_rustls",
    "tower",
    "want",
];

pub struct SumoLogicLayer {
    sink: Arc<SumoLogicSink>,
    min_level: Level,
}

impl SumoLogicLayer {
    /// Forwards every event; see [`SumoLogicLayer::with_min_level`].
    #[must_use]
    pub fn new(sink: Arc<SumoLogicSink>) -> Self {
        Self {
            sink,
            min_level: Level::Trace,
        }
    }

    #[must_use]
    pub fn with_min_level(mut self, min_level: Level) -> Self {
        self.min_level = min_level;
        self
    }
}

fn is_ignored_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    IGNORED_CRATES.contains(&krate)
}

// Filtering happens in on_event: returning false from Layer::enabled would
// disable the event for every other layer of the subscriber too.
impl<S> Layer<S> for SumoLogicLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if Level::from(*metadata.level()) < self.min_level || is_ignored_target(metadata.target())
        {
            return;
        }

        let mut visitor = EventVisitor::new(Level::from(*metadata.level()));
        event.record(&mut visitor);

        let mut log_event = visitor.event;
        log_event
            .properties
            .entry(TARGET_PROPERTY.to_string())
            .or_insert_with(|| Value::from(metadata.target()));

        self.sink.emit(log_event);
    }
}

struct EventVisitor {
    event: LogEvent,
}

impl EventVisitor {
    fn new(level: Level) -> Self {
        Self {
            event: LogEvent::new(level, String::new()),
        }
    }

    fn insert(&mut self, field: &Field, value: Value) {
        // Metadata added by the `log` compatibility shim
        if field.name().starts_with("log.") {
            return;
        }
        self.event
            .properties
            .insert(field.name().to_string(), value);
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            MESSAGE_FIELD => self.event.message_template = value.to_string(),
            ERROR_FIELD => self.event.error = Some(value.to_string()),
            _ => self.insert(field, Value::from(value)),
        }
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.event.error = Some(render_error_chain(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        match field.name() {
            MESSAGE_FIELD => self.event.message_template = rendered,
            ERROR_FIELD => self.event.error = Some(rendered),
            _ => self.insert(field, Value::from(rendered)),
        }
    }
}
