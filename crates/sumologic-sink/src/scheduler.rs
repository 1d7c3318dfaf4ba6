// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background loop that turns queued events into delivered batches.
//!
//! ```text
//!            tick / Flush                    cancel
//!   ┌──────┐ ──────────────> ┌─────────┐    ┌──────────┐     ┌─────────┐
//!   │ Idle │                 │ Running │    │ Draining │ ──> │ Stopped │
//!   └──────┘ <────────────── └─────────┘    └──────────┘     └─────────┘
//!       │         done (ok or failed)            ^
//!       └────────────────────────────────────────┘
//! ```
//!
//! The loop awaits each delivery inline, so at most one batch is ever in
//! flight. The timer is re-armed once a delivery completes: ticks that come
//! due while a delivery is still running are skipped, and the next one fires
//! a full period after the delivery ended. A cancelled scheduler finishes the
//! current batch, then drains the queue until it is empty or the shutdown
//! timeout elapses.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::accumulator::BatchAccumulator;
use crate::delivery::BatchEmitter;
use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick or command.
    Idle,
    /// A batch is being delivered.
    Running,
    /// Shutdown requested, working off what is left in the queue.
    Draining,
    /// The loop has exited.
    Stopped,
}

#[derive(Debug)]
pub enum SchedulerCommand {
    /// Deliver everything pending now and reply with the number of batches emitted.
    Flush(oneshot::Sender<usize>),
}

/// Cloneable handle for controlling a running [`PeriodicScheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
    cancel_token: CancellationToken,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    /// Delivers everything currently queued without waiting for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Disposed`] if the scheduler is gone.
    pub async fn flush(&self) -> Result<usize, SinkError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SchedulerCommand::Flush(response_tx))
            .map_err(|_| SinkError::Disposed)?;

        response_rx.await.map_err(|_| SinkError::Disposed)
    }

    /// Requests a graceful shutdown. The scheduler drains before stopping.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Resolves once the loop has reached [`SchedulerState::Stopped`].
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // An Err means the scheduler was dropped, which is stopped as well
        let _ = state
            .wait_for(|state| *state == SchedulerState::Stopped)
            .await;
    }
}

pub struct PeriodicScheduler {
    accumulator: BatchAccumulator,
    emitter: Arc<dyn BatchEmitter>,
    period: Duration,
    shutdown_timeout: Duration,
    rx: mpsc::UnboundedReceiver<SchedulerCommand>,
    cancel_token: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl PeriodicScheduler {
    /// Returns the scheduler (to be run on a task) and a handle to control it.
    #[must_use]
    pub fn new(
        accumulator: BatchAccumulator,
        emitter: Arc<dyn BatchEmitter>,
        period: Duration,
        shutdown_timeout: Duration,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let cancel_token = CancellationToken::new();

        let scheduler = Self {
            accumulator,
            emitter,
            period,
            shutdown_timeout,
            rx,
            cancel_token: cancel_token.clone(),
            state: state_tx,
        };
        let handle = SchedulerHandle {
            tx,
            cancel_token,
            state: state_rx,
        };

        (scheduler, handle)
    }

    /// Runs until cancelled, then drains and stops.
    pub async fn run(mut self) {
        debug!("SUMO | Scheduler started, flushing every {:?}", self.period);

        // First tick one period from now, not immediately
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("SUMO | Received shutdown signal, draining remaining events");
                    break;
                }
                Some(command) = self.rx.recv() => match command {
                    SchedulerCommand::Flush(response_tx) => {
                        let batches = self.flush_pending().await;
                        ticker.reset();
                        if response_tx.send(batches).is_err() {
                            error!("SUMO | Failed to send flush response - receiver dropped");
                        }
                    }
                },
                _ = ticker.tick() => {
                    self.flush_pending().await;
                    ticker.reset();
                }
            }
        }

        let batches = self.drain().await;

        // Flushes that raced with shutdown are covered by the drain
        while let Ok(SchedulerCommand::Flush(response_tx)) = self.rx.try_recv() {
            let _ = response_tx.send(batches);
        }

        self.state.send_replace(SchedulerState::Stopped);
        debug!("SUMO | Scheduler stopped");
    }

    /// Emits the events pending right now.
    ///
    /// Keeps cutting batches while they come out full, but never more than
    /// the backlog seen on entry, so producers cannot keep a tick alive forever.
    async fn flush_pending(&mut self) -> usize {
        let limit = self.accumulator.batch_size_limit();
        let max_batches = self.accumulator.pending().div_ceil(limit).max(1);

        let mut emitted = 0;
        while emitted < max_batches {
            let Some(batch) = self.accumulator.next_batch() else {
                break;
            };
            let full = batch.len() >= limit;

            self.state.send_replace(SchedulerState::Running);
            self.emitter.emit_batch(batch).await;
            self.state.send_replace(SchedulerState::Idle);
            emitted += 1;

            if !full {
                break;
            }
        }
        emitted
    }

    async fn drain(&mut self) -> usize {
        self.state.send_replace(SchedulerState::Draining);
        self.accumulator.close();

        // Size of the batch being delivered when the deadline hits
        let mut in_flight = 0;
        let accumulator = &mut self.accumulator;
        let emitter = &self.emitter;
        let in_flight_len = &mut in_flight;
        let drained = timeout(self.shutdown_timeout, async move {
            let mut batches = 0;
            while let Some(batch) = accumulator.next_batch() {
                *in_flight_len = batch.len();
                emitter.emit_batch(batch).await;
                *in_flight_len = 0;
                batches += 1;
            }
            batches
        })
        .await;

        match drained {
            Ok(batches) => {
                debug!("SUMO | Drained {batches} batches on shutdown");
                batches
            }
            Err(_) => {
                let queued = self.accumulator.pending();
                warn!(
                    "SUMO | Shutdown timeout of {:?} elapsed, dropping {} events ({in_flight} in flight, {queued} queued)",
                    self.shutdown_timeout,
                    in_flight + queued
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Level, LogEvent};
    use crate::queue::{EventQueue, QueueHandle};
    use crate::test_support::RecordingEmitter;
    use tracing_test::traced_test;

    const LONG_PERIOD: Duration = Duration::from_secs(3600);

    fn create_scheduler(
        batch_size_limit: usize,
        period: Duration,
        emitter: Arc<RecordingEmitter>,
    ) -> (PeriodicScheduler, SchedulerHandle, QueueHandle) {
        let (queue, queue_handle) = EventQueue::new();
        let accumulator = BatchAccumulator::new(queue, batch_size_limit);
        let (scheduler, handle) =
            PeriodicScheduler::new(accumulator, emitter, period, Duration::from_secs(10));
        (scheduler, handle, queue_handle)
    }

    fn enqueue(queue: &QueueHandle, count: usize) {
        for i in 0..count {
            queue
                .enqueue(LogEvent::new(Level::Info, i.to_string()))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_bounded_batches() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) = create_scheduler(10, LONG_PERIOD, emitter.clone());
        enqueue(&queue, 25);

        let task = tokio::spawn(scheduler.run());
        handle.shutdown();
        task.await.unwrap();

        assert_eq!(emitter.batch_sizes(), vec![10, 10, 5]);
        assert_eq!(handle.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_preserves_order() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) = create_scheduler(4, LONG_PERIOD, emitter.clone());
        enqueue(&queue, 9);

        let task = tokio::spawn(scheduler.run());
        handle.shutdown();
        task.await.unwrap();

        let expected: Vec<String> = (0..9).map(|i| i.to_string()).collect();
        assert_eq!(emitter.messages(), expected);
    }

    #[tokio::test]
    async fn test_queue_closed_after_shutdown() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) = create_scheduler(10, LONG_PERIOD, emitter);

        let task = tokio::spawn(scheduler.run());
        handle.shutdown();
        task.await.unwrap();

        assert!(queue.enqueue(LogEvent::new(Level::Info, "late")).is_err());
        assert!(handle.flush().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_partial_batch() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) =
            create_scheduler(10, Duration::from_secs(2), emitter.clone());
        tokio::spawn(scheduler.run());
        enqueue(&queue, 3);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(emitter.batch_sizes().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(emitter.batch_sizes(), vec![3]);

        handle.shutdown();
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_works_off_backlog_of_full_batches() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) =
            create_scheduler(10, Duration::from_secs(1), emitter.clone());
        tokio::spawn(scheduler.run());
        enqueue(&queue, 23);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(emitter.batch_sizes(), vec![10, 10, 3]);

        handle.shutdown();
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_rearms_timer() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) =
            create_scheduler(10, Duration::from_secs(1), emitter.clone());
        tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(600)).await;
        enqueue(&queue, 1);
        handle.flush().await.unwrap();

        // Without re-arming, the original 1s tick would pick this up
        enqueue(&queue, 1);
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(emitter.calls(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(emitter.calls(), 2);

        handle.shutdown();
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tick_is_noop() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, _queue) =
            create_scheduler(10, Duration::from_millis(100), emitter.clone());
        tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(emitter.calls(), 0);
        assert_eq!(handle.state(), SchedulerState::Idle);

        handle.shutdown();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn test_flush_command_delivers_before_period() {
        let emitter = Arc::new(RecordingEmitter::default());
        let (scheduler, handle, queue) = create_scheduler(10, LONG_PERIOD, emitter.clone());
        tokio::spawn(scheduler.run());
        enqueue(&queue, 12);

        let batches = handle.flush().await.unwrap();

        assert_eq!(batches, 2);
        assert_eq!(emitter.batch_sizes(), vec![10, 2]);

        handle.shutdown();
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_skips_ticks() {
        let emitter = Arc::new(RecordingEmitter::with_delay(Duration::from_millis(350)));
        let (scheduler, handle, queue) =
            create_scheduler(10, Duration::from_millis(100), emitter.clone());
        tokio::spawn(scheduler.run());

        let producer = tokio::spawn(async move {
            for i in 0..40 {
                queue
                    .enqueue(LogEvent::new(Level::Info, i.to_string()))
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        tokio::time::sleep(Duration::from_secs(2)).await;

        // Each delivery outlives three periods; the next one waits a full period
        let windows = emitter.delivery_windows();
        let starts: Vec<Duration> = windows.iter().map(|(start, _)| *start).collect();
        assert_eq!(
            starts,
            [100, 550, 1000, 1450, 1900].map(Duration::from_millis).to_vec()
        );
        for pair in windows.windows(2) {
            let (_, previous_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(
                next_start >= previous_end.unwrap() + Duration::from_millis(100),
                "delivery started at {next_start:?}, previous ended at {previous_end:?}"
            );
        }
        assert_eq!(emitter.max_in_flight(), 1);

        producer.await.unwrap();
        handle.shutdown();
        handle.stopped().await;
        assert_eq!(emitter.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_shutdown_timeout_drops_remaining() {
        let emitter = Arc::new(RecordingEmitter::with_delay(Duration::from_secs(4)));
        let (queue, queue_handle) = EventQueue::new();
        let accumulator = BatchAccumulator::new(queue, 10);
        let (scheduler, handle) = PeriodicScheduler::new(
            accumulator,
            emitter.clone(),
            LONG_PERIOD,
            Duration::from_secs(5),
        );
        enqueue(&queue_handle, 30);

        let task = tokio::spawn(scheduler.run());
        handle.shutdown();
        task.await.unwrap();

        // First batch done at 4s, second cut off at 5s, third never started
        assert_eq!(emitter.completed(), 1);
        assert_eq!(handle.state(), SchedulerState::Stopped);
        assert!(logs_contain("dropping 20 events (10 in flight, 10 queued)"));
    }
}
