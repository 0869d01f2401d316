// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch-emission engine for chat-based log sinks.
//!
//! Buffers log records from any number of concurrent producers and decides,
//! on a fixed re-check cadence, when to flush them as one batch — under a
//! pluggable OR-combined rule set — without losing, duplicating, or
//! reordering records. Formatting and transport stay behind the
//! [`MessageFormatter`] and [`BatchDelivery`] traits; this crate has no HTTP
//! dependency.

pub mod delivery;
pub mod errors;
pub mod level;
pub mod processor;
pub mod queue;
pub mod record;
pub mod rules;
pub mod ruleset;
pub mod stats;

pub use delivery::{BatchDelivery, DeliveryOutcome, MessageFormatter};
pub use errors::{ConfigError, DeliveryError};
pub use level::LevelChecker;
pub use processor::{ProcessorConfig, ProcessorHandle, QueueProcessor};
pub use queue::RetentionPolicy;
pub use record::{Level, LogRecord};
pub use rules::{AsyncRule, BatchAgeRule, BatchSizeRule, OncePerPeriodRule, PostEmitHook, Rule};
pub use ruleset::{EmitRules, EmitRulesConfig};
pub use stats::{SinkStats, StatsSnapshot};
