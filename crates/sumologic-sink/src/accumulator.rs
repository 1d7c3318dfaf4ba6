// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::LogEvent;
use crate::queue::EventQueue;

/// Ordered group of events flushed together, never longer than the batch size limit.
pub type Batch = Vec<LogEvent>;

/// Cuts the queue into batches of at most `batch_size_limit` events.
#[derive(Debug)]
pub struct BatchAccumulator {
    queue: EventQueue,
    batch_size_limit: usize,
}

impl BatchAccumulator {
    #[must_use]
    pub fn new(queue: EventQueue, batch_size_limit: usize) -> Self {
        Self {
            queue,
            // A zero limit would never make progress
            batch_size_limit: batch_size_limit.max(1),
        }
    }

    /// Next batch in FIFO order, or `None` when nothing is pending.
    ///
    /// A partially filled batch is returned as is; this never waits for more events.
    pub fn next_batch(&mut self) -> Option<Batch> {
        let batch = self.queue.drain(self.batch_size_limit);
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    #[must_use]
    pub fn batch_size_limit(&self) -> usize {
        self.batch_size_limit
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Closes the underlying queue to producers.
    pub fn close(&mut self) {
        self.queue.close();
    }
}
