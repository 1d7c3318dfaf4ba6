// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unbounded FIFO between producers and the background worker.
//!
//! ```text
//!    ┌──────────────┐
//!    │ QueueHandle  │ (Clone, one per producer)
//!    └──────┬───────┘
//!           │ unbounded mpsc, never blocks
//!           v
//!    ┌──────────────┐
//!    │  EventQueue  │ (single consumer, owned by the scheduler)
//!    └──────────────┘
//! ```
//!
//! Enqueueing is a plain channel send: no lock is held across I/O and no
//! runtime is needed on the producer side, so it is safe to call from any
//! thread. Closing the consumer rejects further events while everything
//! already queued stays drainable.

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::error::SinkError;
use crate::event::LogEvent;

/// Producer side of the queue.
#[derive(Clone, Debug)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl QueueHandle {
    /// Appends `event` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Disposed`] once the consumer has been closed or dropped.
    pub fn enqueue(&self, event: LogEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Disposed)
    }

    /// Whether the consumer side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the queue. There is exactly one and it is the only drainer.
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<LogEvent>,
}

impl EventQueue {
    /// Returns the consumer together with a cloneable producer handle.
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, QueueHandle { tx })
    }

    /// Removes up to `max_count` events in arrival order.
    ///
    /// Returns an empty vector when nothing is pending; never waits.
    pub fn drain(&mut self, max_count: usize) -> Vec<LogEvent> {
        let mut events = Vec::with_capacity(max_count.min(self.rx.len()));
        while events.len() < max_count {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Number of events currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Stops accepting new events. Pending events can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
