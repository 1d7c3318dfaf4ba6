// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recording doubles shared by the unit tests.

#![cfg(test)]

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::accumulator::Batch;
use crate::delivery::BatchEmitter;
use crate::error::TransportError;
use crate::transport::Transport;

/// Records every payload; fails the ones listed in `fail_on`, panics on `panic_on`.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Mutex<Vec<(String, HeaderMap)>>,
    pub fail_on: Vec<String>,
    pub panic_on: Vec<String>,
}

impl RecordingTransport {
    /// Payloads seen so far, sorted since submissions race each other.
    pub fn sent_payloads(&self) -> Vec<String> {
        let mut payloads: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect();
        payloads.sort();
        payloads
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, payload: String, headers: &HeaderMap) -> Result<(), TransportError> {
        if self.panic_on.contains(&payload) {
            panic!("transport blew up");
        }
        self.sent
            .lock()
            .unwrap()
            .push((payload.clone(), headers.clone()));
        if self.fail_on.contains(&payload) {
            return Err(TransportError::Other(format!("rejected {payload}")));
        }
        Ok(())
    }
}

/// Records each batch it is handed and how many deliveries overlapped.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    batches: Mutex<Vec<Batch>>,
    delay: Option<Duration>,
    created: Option<Instant>,
    windows: Mutex<Vec<(Duration, Option<Duration>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl RecordingEmitter {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            created: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Start and end of each delivery, relative to when the emitter was created.
    /// Only recorded for emitters built with [`RecordingEmitter::with_delay`].
    pub fn delivery_windows(&self) -> Vec<(Duration, Option<Duration>)> {
        self.windows.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|e| e.message_template.clone())
            .collect()
    }

    /// Deliveries started.
    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Deliveries that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchEmitter for RecordingEmitter {
    async fn emit_batch(&self, batch: Batch) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch);

        let window = self.created.map(|created| {
            let mut windows = self.windows.lock().unwrap();
            windows.push((created.elapsed(), None));
            (created, windows.len() - 1)
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((created, index)) = window {
            self.windows.lock().unwrap()[index].1 = Some(created.elapsed());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}
