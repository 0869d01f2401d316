// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Immutable rule set built once at startup.
//!
//! [`EmitRules::new`] validates the configuration, derives the post-emission
//! hook list from the rules that implement the capability, and installs a
//! default rule pair when the caller configured no rules at all. After
//! construction nothing is ever re-bound; the processor shares the rule set
//! read-only for its whole lifetime.

use crate::delivery::DeliveryOutcome;
use crate::errors::ConfigError;
use crate::record::LogRecord;
use crate::rules::{AsyncRule, BatchAgeRule, BatchSizeRule, PostEmitHook, Rule};
use crate::stats::SinkStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default rule pair installed when the caller configures no rules: emit at
/// ten pending records or when the oldest record is thirty seconds old.
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_BATCH_AGE: Duration = Duration::from_secs(30);

/// How often the pending batch is re-checked against the rules.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(5);

/// Caller-facing rule set configuration. Order within each list matters only
/// for short-circuiting latency, never for the decision.
pub struct EmitRulesConfig {
    pub check_period: Duration,
    pub rules: Vec<Arc<dyn Rule>>,
    pub async_rules: Vec<Arc<dyn AsyncRule>>,
}

impl Default for EmitRulesConfig {
    fn default() -> Self {
        EmitRulesConfig {
            check_period: DEFAULT_CHECK_PERIOD,
            rules: Vec::new(),
            async_rules: Vec::new(),
        }
    }
}

/// Validated, immutable rule set shared with the queue processor.
pub struct EmitRules {
    check_period: Duration,
    rules: Vec<Arc<dyn Rule>>,
    async_rules: Vec<Arc<dyn AsyncRule>>,
    hooks: Vec<Arc<dyn PostEmitHook>>,
}

impl EmitRules {
    /// Validate the configuration and derive the hook list.
    ///
    /// A zero check period is a construction-time error, never a first-use
    /// error. An empty rule set never reaches the processor: the default
    /// size/age pair is installed so the sink cannot silently degrade to
    /// "only shutdown ever flushes".
    pub fn new(config: EmitRulesConfig) -> Result<Self, ConfigError> {
        if config.check_period.is_zero() {
            return Err(ConfigError::ZeroCheckPeriod);
        }

        let mut rules = config.rules;
        let async_rules = config.async_rules;

        if rules.is_empty() && async_rules.is_empty() {
            debug!(
                "No emission rules configured, installing defaults (size >= {}, age >= {:?})",
                DEFAULT_BATCH_SIZE, DEFAULT_MAX_BATCH_AGE
            );
            rules.push(Arc::new(BatchSizeRule::new(DEFAULT_BATCH_SIZE)));
            rules.push(Arc::new(BatchAgeRule::new(DEFAULT_MAX_BATCH_AGE)));
        }

        // Hook order is fixed here: sync rules first, then async rules, each
        // in configured order.
        let mut hooks: Vec<Arc<dyn PostEmitHook>> = Vec::new();
        for rule in &rules {
            if let Some(hook) = Arc::clone(rule).post_emit_hook() {
                hooks.push(hook);
            }
        }
        for rule in &async_rules {
            if let Some(hook) = Arc::clone(rule).post_emit_hook() {
                hooks.push(hook);
            }
        }

        Ok(EmitRules {
            check_period: config.check_period,
            rules,
            async_rules,
            hooks,
        })
    }

    pub fn check_period(&self) -> Duration {
        self.check_period
    }

    /// Decide whether the snapshot should be emitted now.
    ///
    /// Pure OR over every rule: sync rules first with short-circuit, then
    /// async rules awaited in order, also short-circuiting. Permuting the
    /// rule lists changes latency only, never the decision.
    pub async fn evaluate(&self, batch: &[LogRecord]) -> bool {
        for rule in &self.rules {
            if rule.should_emit(batch) {
                return true;
            }
        }
        for rule in &self.async_rules {
            if rule.should_emit(batch).await {
                return true;
            }
        }
        false
    }

    /// Run every derived hook with the delivered batch and the recorded
    /// outcome, in derivation order. A failing hook is reported and counted
    /// but never stops the remaining hooks or alters the outcome.
    pub async fn dispatch_hooks(
        &self,
        batch: &[LogRecord],
        outcome: &DeliveryOutcome,
        stats: &SinkStats,
    ) {
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = hook.after_emit(batch, outcome).await {
                stats.record_hook_failure();
                warn!("Post-emission hook {index} failed: {e:#}");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}
