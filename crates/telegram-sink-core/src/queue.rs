// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pending-record buffer shared between producers and the queue processor.
//!
//! Producers append under a short mutex critical section that never does
//! I/O. The processor swaps the whole buffer out at the start of a tick and
//! evaluates/delivers outside the lock, so producers are never blocked
//! behind a network call. A snapshot that no rule fired on is spliced back
//! at the front, keeping global enqueue order intact.

use crate::errors::ConfigError;
use crate::record::LogRecord;
use crate::stats::SinkStats;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// Bounds on the failed-delivery backlog. When deliveries keep failing the
/// retained batch would otherwise grow without limit; exceeding either bound
/// drops the oldest records and surfaces the count.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    max_records: usize,
    max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub const DEFAULT_MAX_RECORDS: usize = 1_000;
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

    pub fn new(max_records: usize, max_age: Option<Duration>) -> Result<Self, ConfigError> {
        if max_records == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if max_age.is_some_and(|age| age.is_zero()) {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(RetentionPolicy {
            max_records,
            max_age,
        })
    }

    /// Drop retained records that exceed the bounds, oldest first. Returns
    /// how many were dropped so the caller can surface the count.
    pub fn enforce(&self, batch: &mut Vec<LogRecord>) -> usize {
        let mut dropped = 0;

        if let Some(max_age) = self.max_age {
            let now = Utc::now();
            let expired = batch
                .iter()
                .take_while(|record| {
                    now.signed_duration_since(record.timestamp)
                        .to_std()
                        .map_or(false, |age| age > max_age)
                })
                .count();
            if expired > 0 {
                batch.drain(..expired);
                dropped += expired;
            }
        }

        if batch.len() > self.max_records {
            let excess = batch.len() - self.max_records;
            batch.drain(..excess);
            dropped += excess;
        }

        dropped
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            max_records: Self::DEFAULT_MAX_RECORDS,
            max_age: Some(Self::DEFAULT_MAX_AGE),
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: Vec<LogRecord>,
    closed: bool,
}

/// Thread-safe pending buffer. Insertion order is preserved; the buffer is
/// only ever replaced wholesale, never partially drained.
pub struct LogQueue {
    state: Mutex<QueueState>,
    stats: Arc<SinkStats>,
}

impl LogQueue {
    pub fn new(stats: Arc<SinkStats>) -> Self {
        LogQueue {
            state: Mutex::new(QueueState::default()),
            stats,
        }
    }

    /// Append one record. Records arriving after [`close`](Self::close) are
    /// counted as dropped instead of surfacing an error to the producer.
    pub fn push(&self, record: LogRecord) {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("lock poisoned");
        if state.closed {
            drop(state);
            self.stats.record_dropped(1);
            trace!("Record enqueued after shutdown, dropping");
            return;
        }
        state.pending.push(record);
        drop(state);
        self.stats.record_enqueued();
    }

    /// Swap the pending buffer out, leaving an empty one for producers.
    pub fn take_pending(&self) -> Vec<LogRecord> {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("lock poisoned");
        std::mem::take(&mut state.pending)
    }

    /// Hand a rejected snapshot back, splicing it in front of whatever was
    /// enqueued while it was out.
    pub fn put_back(&self, mut snapshot: Vec<LogRecord>) {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("lock poisoned");
        snapshot.append(&mut state.pending);
        state.pending = snapshot;
    }

    /// Stop accepting records. Idempotent.
    pub fn close(&self) {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("lock poisoned");
        state.closed = true;
    }

    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let state = self.state.lock().expect("lock poisoned");
        state.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
