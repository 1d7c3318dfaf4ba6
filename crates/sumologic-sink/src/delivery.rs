// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Formatting a batch and submitting it to the transport.
//!
//! ```text
//!   Batch (≤ batch_size_limit events)
//!       │
//!       v
//!   ┌─────────────┐
//!   │   Format    │ (per event, failures skip that event)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │    POST     │ (one task per event, all in flight together)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Join all   │ (failures logged and dropped, no retry)
//!   └─────────────┘
//! ```

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::accumulator::Batch;
use crate::formatter::TextFormatter;
use crate::transport::Transport;

/// Receives every batch the scheduler cuts.
#[async_trait]
pub trait BatchEmitter: Send + Sync {
    async fn emit_batch(&self, batch: Batch);
}

/// Per batch tally of what happened to each event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Events handed to the transport
    pub submitted: usize,
    /// Submissions that succeeded
    pub delivered: usize,
    /// Submissions that failed and were dropped
    pub failed: usize,
    /// Events that could not be formatted
    pub skipped: usize,
}

pub struct DeliveryAdapter {
    formatter: Arc<dyn TextFormatter>,
    transport: Arc<dyn Transport>,
    headers: Arc<HeaderMap>,
}

impl DeliveryAdapter {
    #[must_use]
    pub fn new(
        formatter: Arc<dyn TextFormatter>,
        transport: Arc<dyn Transport>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            formatter,
            transport,
            headers: Arc::new(headers),
        }
    }

    /// Formats and submits every event of `batch` concurrently, then waits for all of them.
    ///
    /// Never fails: formatting and transport errors only affect the event they
    /// belong to and are reported through `tracing` and the returned report.
    pub async fn deliver(&self, batch: Batch) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut set = JoinSet::new();

        for event in &batch {
            let payload = match self.formatter.format(event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("SUMO | Skipping event that failed to format: {e}");
                    report.skipped += 1;
                    continue;
                }
            };

            let transport = Arc::clone(&self.transport);
            let headers = Arc::clone(&self.headers);
            set.spawn(async move { transport.send(payload, &headers).await });
            report.submitted += 1;
        }

        while let Some(result) = set.join_next().await {
            match result {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    error!("SUMO | Failed to send log event: {e}");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("SUMO | Send task did not complete: {e}");
                    report.failed += 1;
                }
            }
        }

        debug!(
            "SUMO | Batch of {} delivered={} failed={} skipped={}",
            batch.len(),
            report.delivered,
            report.failed,
            report.skipped
        );
        report
    }
}

#[async_trait]
impl BatchEmitter for DeliveryAdapter {
    async fn emit_batch(&self, batch: Batch) {
        self.deliver(batch).await;
    }
}
