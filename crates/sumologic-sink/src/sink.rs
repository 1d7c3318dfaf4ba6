// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The producer-facing sink and its background worker.
//!
//! ```text
//!   emit() ──> QueueHandle ──> EventQueue ──> BatchAccumulator
//!                                                   │
//!                    "sumologic-sink" thread        v
//!                    (current-thread runtime)  PeriodicScheduler ──> DeliveryAdapter ──> Transport
//! ```
//!
//! The worker lives on its own thread so the sink can be used from plain
//! synchronous code, from inside another runtime, and from `Drop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

use crate::accumulator::BatchAccumulator;
use crate::config::SinkConfig;
use crate::delivery::DeliveryAdapter;
use crate::error::SinkError;
use crate::event::LogEvent;
use crate::formatter::{TemplateFormatter, TextFormatter};
use crate::queue::{EventQueue, QueueHandle};
use crate::scheduler::{PeriodicScheduler, SchedulerHandle, SchedulerState};
use crate::transport::{source_headers, HttpTransport, Transport};

const WORKER_THREAD_NAME: &str = "sumologic-sink";

pub struct SumoLogicSink {
    queue: QueueHandle,
    scheduler: SchedulerHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl SumoLogicSink {
    /// Starts a sink posting to `config.endpoint` with the configured output template.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::InvalidConfig`] for a bad configuration,
    /// [`SinkError::TransportInit`] if the HTTP client cannot be built and
    /// [`SinkError::Runtime`] if the background worker cannot be started.
    pub fn start(config: SinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        let formatter = Arc::new(TemplateFormatter::new(&config.output_template)?);
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::new(config, formatter, transport)
    }

    /// Starts a sink with an injected formatter and transport.
    ///
    /// # Errors
    ///
    /// Same as [`SumoLogicSink::start`], minus transport construction.
    pub fn new(
        config: SinkConfig,
        formatter: Arc<dyn TextFormatter>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SinkError> {
        config.validate()?;
        let headers = source_headers(&config.source_name, &config.source_category)?;

        let (queue, queue_handle) = EventQueue::new();
        let accumulator = BatchAccumulator::new(queue, config.batch_size_limit);
        let adapter = Arc::new(DeliveryAdapter::new(formatter, transport, headers));
        let (scheduler, scheduler_handle) = PeriodicScheduler::new(
            accumulator,
            adapter,
            config.period,
            config.shutdown_timeout,
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SinkError::Runtime(format!("failed to build runtime: {e}")))?;

        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(scheduler.run()))
            .map_err(|e| SinkError::Runtime(format!("failed to spawn worker thread: {e}")))?;

        info!(
            "SUMO | Sink started, source_name={} batch_size_limit={} period={:?}",
            config.source_name, config.batch_size_limit, config.period
        );

        Ok(Self {
            queue: queue_handle,
            scheduler: scheduler_handle,
            worker: Mutex::new(Some(worker)),
            disposed: AtomicBool::new(false),
        })
    }

    /// Queues `event` for delivery. Never blocks and never fails.
    ///
    /// Events emitted after [`SumoLogicSink::dispose`] are discarded.
    pub fn emit(&self, event: LogEvent) {
        if self.disposed.load(Ordering::Acquire) {
            debug!("SUMO | Sink disposed, discarding event");
            return;
        }
        if self.queue.enqueue(event).is_err() {
            debug!("SUMO | Queue closed, discarding event");
        }
    }

    /// Delivers everything queued so far without waiting for the next period.
    ///
    /// Resolves once the worker has finished those deliveries and returns the
    /// number of batches it emitted.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Disposed`] if the sink has been disposed.
    pub async fn flush(&self) -> Result<usize, SinkError> {
        if self.is_disposed() {
            return Err(SinkError::Disposed);
        }
        self.scheduler.flush().await
    }

    /// Stops the worker after draining what is queued, bounded by the shutdown timeout.
    ///
    /// Blocks the calling thread until the worker exits. Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("SUMO | Disposing sink");
        self.scheduler.shutdown();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        // Joining ourselves would never return
        if worker.thread().id() == std::thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            error!("SUMO | Background worker panicked during shutdown");
        }
        info!("SUMO | Sink disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }
}

impl Drop for SumoLogicSink {
    fn drop(&mut self) {
        self.dispose();
    }
}
