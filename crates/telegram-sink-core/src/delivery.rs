// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::DeliveryError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Outcome of one delivery attempt, as observed by hooks and by the
/// processor's retry bookkeeping. Never silently dropped.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// The batch reached the endpoint; `messages` counts the endpoint
    /// messages it was split into.
    Delivered { messages: usize },
    /// The attempt failed; the batch stays retained for retry.
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Transport boundary to the remote chat endpoint.
///
/// The core hands over a fully formatted batch text and only observes
/// success or a classified failure; transport semantics (HTTP, auth,
/// message chunking) live entirely behind this trait.
#[async_trait]
pub trait BatchDelivery: Send + Sync {
    /// Send one batch. `Ok` carries the number of endpoint messages sent.
    async fn deliver(&self, batch_text: &str) -> Result<usize, DeliveryError>;
}

/// Converts a drained batch into the display text handed to delivery.
///
/// Pure: same batch in, same text out. Implementations live outside the
/// core crate.
pub trait MessageFormatter: Send + Sync {
    fn format(&self, batch: &[LogRecord]) -> String;
}
