// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use telegram_sink_core::{BatchDelivery, DeliveryError, LogRecord, MessageFormatter};

/// Formatter that renders one message per line, so tests can split a
/// delivered batch back into its records.
pub struct LineFormatter;

impl MessageFormatter for LineFormatter {
    fn format(&self, batch: &[LogRecord]) -> String {
        batch
            .iter()
            .map(|record| record.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Delivery double that records every successful batch and can be told to
/// fail the next N attempts.
#[derive(Default)]
pub struct MockDelivery {
    sent: Mutex<Vec<String>>,
    failures_left: AtomicUsize,
}

impl MockDelivery {
    pub fn new() -> Self {
        MockDelivery::default()
    }

    /// Fail the next `n` delivery attempts with a network error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Batches delivered so far, in delivery order.
    pub fn sent_batches(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Every delivered record line, across batches, in delivery order.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent_batches()
            .iter()
            .flat_map(|batch| batch.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

#[async_trait]
impl BatchDelivery for MockDelivery {
    async fn deliver(&self, batch_text: &str) -> Result<usize, DeliveryError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failing {
            return Err(DeliveryError::Network("connection refused".into()));
        }
        self.sent.lock().unwrap().push(batch_text.to_string());
        Ok(1)
    }
}
