// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background queue processor: the single consumer that turns the pending
//! buffer into delivered batches.
//!
//! Exactly one worker task makes flush decisions, so a batch can never be
//! delivered twice. Each tick swaps the buffer out under the lock, evaluates
//! the rule set against the snapshot outside the lock, and either delivers
//! it or splices it back. A batch that failed to deliver moves to a bounded
//! retained backlog and is retried on following ticks; it stays owned by the
//! worker until an outcome is recorded, so cancellation mid-delivery cannot
//! lose it or count it twice.

use crate::delivery::{BatchDelivery, DeliveryOutcome, MessageFormatter};
use crate::queue::{LogQueue, RetentionPolicy};
use crate::record::LogRecord;
use crate::ruleset::EmitRules;
use crate::stats::{SinkStats, StatsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything the processor needs to run. The rule set, formatter, and
/// delivery are fixed for the processor's lifetime.
pub struct ProcessorConfig {
    pub rules: EmitRules,
    pub formatter: Arc<dyn MessageFormatter>,
    pub delivery: Arc<dyn BatchDelivery>,
    pub retention: RetentionPolicy,
    /// How long an in-flight tick may keep running after `stop()`.
    pub shutdown_grace: Duration,
}

impl ProcessorConfig {
    pub fn new(
        rules: EmitRules,
        formatter: Arc<dyn MessageFormatter>,
        delivery: Arc<dyn BatchDelivery>,
    ) -> Self {
        ProcessorConfig {
            rules,
            formatter,
            delivery,
            retention: RetentionPolicy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Cheap-to-clone producer handle. Enqueueing is a short critical section
/// with no I/O and never exposes processor failures to the caller.
#[derive(Clone)]
pub struct ProcessorHandle {
    queue: Arc<LogQueue>,
    stats: Arc<SinkStats>,
}

impl ProcessorHandle {
    pub fn enqueue(&self, record: LogRecord) {
        self.queue.push(record);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Owner of the background worker task.
pub struct QueueProcessor {
    handle: ProcessorHandle,
    queue: Arc<LogQueue>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl QueueProcessor {
    /// Spawn the worker and start ticking at the rule set's check period.
    pub fn start(config: ProcessorConfig) -> Self {
        let stats = Arc::new(SinkStats::default());
        let queue = Arc::new(LogQueue::new(Arc::clone(&stats)));
        let cancel = CancellationToken::new();

        let worker = Worker {
            queue: Arc::clone(&queue),
            rules: config.rules,
            formatter: config.formatter,
            delivery: config.delivery,
            retention: config.retention,
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
            shutdown_grace: config.shutdown_grace,
            retained: Vec::new(),
        };
        let worker = tokio::spawn(worker.run());

        QueueProcessor {
            handle: ProcessorHandle { queue: Arc::clone(&queue), stats },
            queue,
            cancel,
            worker,
        }
    }

    pub fn handle(&self) -> ProcessorHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// Drain and shut down. Closes the queue to new records, cancels the
    /// worker (an in-flight tick gets the configured grace), and waits for
    /// its final best-effort flush before returning. No background work
    /// survives this call.
    pub async fn stop(self) {
        self.queue.close();
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            error!("Queue processor worker task failed to join: {e}");
        }
    }
}

struct Worker {
    queue: Arc<LogQueue>,
    rules: EmitRules,
    formatter: Arc<dyn MessageFormatter>,
    delivery: Arc<dyn BatchDelivery>,
    retention: RetentionPolicy,
    stats: Arc<SinkStats>,
    cancel: CancellationToken,
    shutdown_grace: Duration,
    /// Batch that already earned emission but failed to deliver. Owned here,
    /// by the single worker, until an outcome is recorded.
    retained: Vec<LogRecord>,
}

impl Worker {
    async fn run(mut self) {
        debug!("Queue processor started");

        let mut interval = tokio::time::interval(self.rules.check_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a fresh interval completes immediately.
        interval.tick().await;

        let cancel = self.cancel.clone();
        let grace = self.shutdown_grace;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // The tick body is awaited to completion before the next
                    // timer fire is even polled, so ticks never overlap; an
                    // overrunning tick makes Skip drop the missed fires. On
                    // shutdown an in-flight tick gets the grace period, then
                    // is abandoned (its batch stays in self.retained).
                    let tick = self.run_tick();
                    tokio::pin!(tick);
                    tokio::select! {
                        () = &mut tick => {}
                        () = cancelled_after(&cancel, grace) => {
                            warn!("Tick still in flight after shutdown grace, abandoning");
                            break;
                        }
                    }
                }
                () = cancel.cancelled() => break,
            }
        }

        self.final_flush().await;
        debug!("Queue processor stopped");
    }

    async fn run_tick(&mut self) {
        let snapshot = self.queue.take_pending();

        if !self.retained.is_empty() {
            // Retry tick. The retained batch already earned emission, so
            // rules are not re-run; records that arrived since ride along.
            self.retained.extend(snapshot);
            debug!("Retrying delivery of {} retained records", self.retained.len());
            self.attempt_delivery().await;
            return;
        }

        if snapshot.is_empty() {
            return;
        }

        if self.rules.evaluate(&snapshot).await {
            self.retained = snapshot;
            self.attempt_delivery().await;
        } else {
            self.queue.put_back(snapshot);
        }
    }

    /// Deliver `self.retained`. On success the batch is consumed and hooks
    /// run; on failure it stays retained, bounded by the retention policy.
    async fn attempt_delivery(&mut self) {
        let batch_text = self.formatter.format(&self.retained);

        match self.delivery.deliver(&batch_text).await {
            Ok(messages) => {
                let batch = std::mem::take(&mut self.retained);
                debug!(
                    "Delivered batch of {} records as {} messages",
                    batch.len(),
                    messages
                );
                self.stats.record_batch_delivered(batch.len() as u64);
                let outcome = DeliveryOutcome::Delivered { messages };
                self.rules
                    .dispatch_hooks(&batch, &outcome, &self.stats)
                    .await;
            }
            Err(e) => {
                self.stats.record_failed_attempt();
                error!(
                    "Failed to deliver batch of {} records, retaining for retry: {e}",
                    self.retained.len()
                );
                let dropped = self.retention.enforce(&mut self.retained);
                if dropped > 0 {
                    self.stats.record_dropped(dropped as u64);
                    warn!("Retained backlog over bound, dropped {dropped} oldest records");
                }
            }
        }
    }

    /// One last delivery of everything left: the retained backlog plus
    /// whatever is still pending. Best effort, bounded by the grace period;
    /// a failure here is reported, not retried.
    async fn final_flush(&mut self) {
        let snapshot = self.queue.take_pending();
        self.retained.extend(snapshot);
        if self.retained.is_empty() {
            return;
        }

        debug!("Final flush of {} records", self.retained.len());
        let timed_out = tokio::time::timeout(self.shutdown_grace, self.attempt_delivery())
            .await
            .is_err();
        if !self.retained.is_empty() {
            // Undeliverable at shutdown; surface the loss instead of
            // silently discarding.
            self.stats.record_dropped(self.retained.len() as u64);
            warn!(
                "Final flush {}, {} records not delivered",
                if timed_out { "timed out" } else { "failed" },
                self.retained.len()
            );
        }
    }
}

/// Resolves `grace` after the token is cancelled. Used to give an in-flight
/// tick a bounded window to finish during shutdown.
async fn cancelled_after(cancel: &CancellationToken, grace: Duration) {
    cancel.cancelled().await;
    tokio::time::sleep(grace).await;
}
