// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for everything the sink does asynchronously on the caller's
/// behalf. Producers never observe delivery or rule failures in their call
/// path; this is the signal the host application can monitor instead.
#[derive(Debug, Default)]
pub struct SinkStats {
    records_enqueued: AtomicU64,
    records_delivered: AtomicU64,
    batches_delivered: AtomicU64,
    failed_attempts: AtomicU64,
    records_dropped: AtomicU64,
    hook_failures: AtomicU64,
}

/// Point-in-time copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub records_enqueued: u64,
    pub records_delivered: u64,
    pub batches_delivered: u64,
    pub failed_attempts: u64,
    pub records_dropped: u64,
    pub hook_failures: u64,
}

impl SinkStats {
    pub fn record_enqueued(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_delivered(&self, records: u64) {
        self.records_delivered.fetch_add(records, Ordering::Relaxed);
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, records: u64) {
        self.records_dropped.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_hook_failure(&self) {
        self.hook_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
        }
    }
}
