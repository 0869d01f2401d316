// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Emission rules and the post-emission hook capability.
//!
//! A rule answers one question: given the current pending batch, should it
//! be emitted now? Rules are combined by OR, so adding a rule can only make
//! the sink emit more eagerly, never less. A rule that also implements
//! [`PostEmitHook`] is called back after every successful delivery; the hook
//! list is derived once at configuration build time, never per tick.

use crate::delivery::DeliveryOutcome;
use crate::record::LogRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A synchronous emission predicate.
pub trait Rule: Send + Sync {
    /// Returns true when the pending batch should be emitted now.
    fn should_emit(&self, batch: &[LogRecord]) -> bool;

    /// The post-emission hook derived from this rule, if it implements one.
    fn post_emit_hook(self: Arc<Self>) -> Option<Arc<dyn PostEmitHook>> {
        None
    }
}

/// An emission predicate that needs to suspend while evaluating, for
/// example to consult an external rate budget.
#[async_trait]
pub trait AsyncRule: Send + Sync {
    async fn should_emit(&self, batch: &[LogRecord]) -> bool;

    fn post_emit_hook(self: Arc<Self>) -> Option<Arc<dyn PostEmitHook>> {
        None
    }
}

/// Callback invoked after a successful delivery with the delivered batch
/// and the recorded outcome. Hook errors are isolated per hook and never
/// affect the delivery commit status.
#[async_trait]
pub trait PostEmitHook: Send + Sync {
    async fn after_emit(&self, batch: &[LogRecord], outcome: &DeliveryOutcome)
        -> anyhow::Result<()>;
}

/// Fires when the pending batch holds at least `threshold` records.
#[derive(Debug, Clone)]
pub struct BatchSizeRule {
    threshold: usize,
}

impl BatchSizeRule {
    pub fn new(threshold: usize) -> Self {
        BatchSizeRule {
            threshold: threshold.max(1),
        }
    }
}

impl Rule for BatchSizeRule {
    fn should_emit(&self, batch: &[LogRecord]) -> bool {
        batch.len() >= self.threshold
    }
}

/// Fires when the oldest pending record is older than `max_age`.
#[derive(Debug, Clone)]
pub struct BatchAgeRule {
    max_age: Duration,
}

impl BatchAgeRule {
    pub fn new(max_age: Duration) -> Self {
        BatchAgeRule { max_age }
    }
}

impl Rule for BatchAgeRule {
    fn should_emit(&self, batch: &[LogRecord]) -> bool {
        let Some(oldest) = batch.first() else {
            return false;
        };
        let age = Utc::now().signed_duration_since(oldest.timestamp);
        age.to_std().map_or(false, |age| age >= self.max_age)
    }
}

/// Fires at most once per `period`, measured from the last successful
/// emission. Implements [`PostEmitHook`] to record that emission time,
/// which exercises the derived-hook path end to end.
pub struct OncePerPeriodRule {
    period: Duration,
    last_emit: Mutex<Option<Instant>>,
}

impl OncePerPeriodRule {
    pub fn new(period: Duration) -> Self {
        OncePerPeriodRule {
            period,
            last_emit: Mutex::new(None),
        }
    }

    fn period_elapsed(&self) -> bool {
        #[allow(clippy::expect_used)]
        let last_emit = self.last_emit.lock().expect("lock poisoned");
        match *last_emit {
            Some(at) => at.elapsed() >= self.period,
            None => true,
        }
    }
}

impl Rule for OncePerPeriodRule {
    fn should_emit(&self, batch: &[LogRecord]) -> bool {
        !batch.is_empty() && self.period_elapsed()
    }

    fn post_emit_hook(self: Arc<Self>) -> Option<Arc<dyn PostEmitHook>> {
        Some(self)
    }
}

#[async_trait]
impl PostEmitHook for OncePerPeriodRule {
    async fn after_emit(
        &self,
        _batch: &[LogRecord],
        outcome: &DeliveryOutcome,
    ) -> anyhow::Result<()> {
        if outcome.is_delivered() {
            #[allow(clippy::expect_used)]
            let mut last_emit = self.last_emit.lock().expect("lock poisoned");
            *last_emit = Some(Instant::now());
        }
        Ok(())
    }
}
