// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::mocks::{LineFormatter, MockDelivery};
use std::sync::Arc;
use std::time::Duration;
use telegram_sink_core::{
    BatchSizeRule, EmitRules, EmitRulesConfig, Level, LogRecord, ProcessorConfig, QueueProcessor,
    RetentionPolicy, Rule,
};
use tokio::time::sleep;

struct NeverRule;

impl Rule for NeverRule {
    fn should_emit(&self, _batch: &[LogRecord]) -> bool {
        false
    }
}

fn record(i: usize) -> LogRecord {
    LogRecord::new(Level::Info, "test", format!("message {i}"))
}

fn processor_with(
    check_period: Duration,
    rules: Vec<Arc<dyn Rule>>,
    delivery: Arc<MockDelivery>,
) -> QueueProcessor {
    let rules = EmitRules::new(EmitRulesConfig {
        check_period,
        rules,
        async_rules: Vec::new(),
    })
    .expect("failed to build rule set");
    QueueProcessor::start(ProcessorConfig::new(rules, Arc::new(LineFormatter), delivery))
}

// The worked example from the sink's contract: a size-3 rule with a 5s
// check period, two records at t=0 and one at t=1, delivered together at
// the t=5 tick in enqueue order.
#[tokio::test(start_paused = true)]
async fn size_rule_fires_on_next_tick() {
    let delivery = Arc::new(MockDelivery::new());
    let processor = processor_with(
        Duration::from_secs(5),
        vec![Arc::new(BatchSizeRule::new(3))],
        Arc::clone(&delivery),
    );
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    handle.enqueue(record(0));
    handle.enqueue(record(1));
    sleep(Duration::from_secs(1)).await;
    handle.enqueue(record(2));

    // Nothing may go out before the tick fires.
    assert!(delivery.sent_batches().is_empty());

    sleep(Duration::from_millis(4500)).await;
    assert_eq!(
        delivery.sent_batches(),
        vec!["message 0\nmessage 1\nmessage 2".to_string()]
    );

    let stats = processor.stats();
    assert_eq!(stats.records_enqueued, 3);
    assert_eq!(stats.records_delivered, 3);
    assert_eq!(stats.batches_delivered, 1);

    processor.stop().await;
    // The buffer was empty after the flush, so stop() delivers nothing new.
    assert_eq!(delivery.sent_batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_snapshot_is_retained_for_later_ticks() {
    let delivery = Arc::new(MockDelivery::new());
    let processor = processor_with(
        Duration::from_secs(5),
        vec![Arc::new(BatchSizeRule::new(3))],
        Arc::clone(&delivery),
    );
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    handle.enqueue(record(0));
    handle.enqueue(record(1));

    // Several ticks pass below the threshold; the snapshot must come back.
    sleep(Duration::from_secs(12)).await;
    assert!(delivery.sent_batches().is_empty());

    handle.enqueue(record(2));
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        delivery.sent_batches(),
        vec!["message 0\nmessage 1\nmessage 2".to_string()]
    );

    processor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_flushes_all_pending_records() {
    let delivery = Arc::new(MockDelivery::new());
    let processor = processor_with(
        Duration::from_secs(60),
        vec![Arc::new(NeverRule)],
        Arc::clone(&delivery),
    );
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    for i in 0..5 {
        handle.enqueue(record(i));
    }

    // stop() returns only after the worker terminated and flushed.
    processor.stop().await;
    assert_eq!(
        delivery.sent_batches(),
        vec!["message 0\nmessage 1\nmessage 2\nmessage 3\nmessage 4".to_string()]
    );

    // Producers arriving after shutdown are counted, not panicking.
    handle.enqueue(record(99));
    assert_eq!(handle.stats().records_dropped, 1);
    assert_eq!(delivery.sent_batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_is_retried_with_retry_window_records() {
    let delivery = Arc::new(MockDelivery::new());
    delivery.fail_next(2);
    let processor = processor_with(
        Duration::from_secs(5),
        vec![Arc::new(BatchSizeRule::new(2))],
        Arc::clone(&delivery),
    );
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    handle.enqueue(record(0));
    handle.enqueue(record(1));

    // First tick: rule fires, delivery fails, batch retained.
    sleep(Duration::from_secs(5)).await;
    assert!(delivery.sent_batches().is_empty());

    // A record enqueued during the retry window rides along.
    handle.enqueue(record(2));

    // Second tick fails again, third succeeds.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(
        delivery.sent_batches(),
        vec!["message 0\nmessage 1\nmessage 2".to_string()]
    );

    let stats = processor.stats();
    assert_eq!(stats.failed_attempts, 2);
    assert_eq!(stats.records_delivered, 3);
    assert_eq!(stats.batches_delivered, 1);
    assert_eq!(stats.records_dropped, 0);

    processor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn overflowing_backlog_drops_oldest_with_count() {
    let delivery = Arc::new(MockDelivery::new());
    delivery.fail_next(1);

    let rules = EmitRules::new(EmitRulesConfig {
        check_period: Duration::from_secs(5),
        rules: vec![Arc::new(BatchSizeRule::new(1))],
        async_rules: Vec::new(),
    })
    .unwrap();
    let mut config = ProcessorConfig::new(
        rules,
        Arc::new(LineFormatter),
        Arc::clone(&delivery) as Arc<dyn telegram_sink_core::BatchDelivery>,
    );
    config.retention = RetentionPolicy::new(3, None).unwrap();
    let processor = QueueProcessor::start(config);
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    for i in 0..5 {
        handle.enqueue(record(i));
    }

    // Failing tick: all five earn emission, two oldest fall over the bound.
    sleep(Duration::from_secs(5)).await;
    assert!(delivery.sent_batches().is_empty());
    let stats = processor.stats();
    assert_eq!(stats.failed_attempts, 1);
    assert_eq!(stats.records_dropped, 2);

    // Next tick retries the surviving three.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        delivery.sent_batches(),
        vec!["message 2\nmessage 3\nmessage 4".to_string()]
    );

    processor.stop().await;
}

// Loss/duplication/order sweep: many records across many ticks end up
// delivered exactly once each, in enqueue order, across batches.
#[tokio::test(start_paused = true)]
async fn every_record_is_delivered_exactly_once_in_order() {
    let delivery = Arc::new(MockDelivery::new());
    let processor = processor_with(
        Duration::from_secs(1),
        vec![Arc::new(BatchSizeRule::new(1))],
        Arc::clone(&delivery),
    );
    let handle = processor.handle();

    sleep(Duration::from_millis(10)).await;
    let mut next_id = 0usize;
    for burst in 0..20 {
        for _ in 0..=(burst % 4) {
            handle.enqueue(record(next_id));
            next_id += 1;
        }
        sleep(Duration::from_millis(700)).await;
    }

    let handle = processor.handle();
    processor.stop().await;

    let expected: Vec<String> = (0..next_id).map(|i| format!("message {i}")).collect();
    assert_eq!(delivery.sent_lines(), expected);

    let stats = handle.stats();
    assert_eq!(stats.records_enqueued, next_id as u64);
    assert_eq!(stats.records_delivered, next_id as u64);
    assert_eq!(stats.records_dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_producers_lose_nothing() {
    let delivery = Arc::new(MockDelivery::new());
    let processor = processor_with(
        Duration::from_secs(1),
        vec![Arc::new(BatchSizeRule::new(1))],
        Arc::clone(&delivery),
    );

    let mut producers = Vec::new();
    for p in 0..4 {
        let handle = processor.handle();
        producers.push(tokio::spawn(async move {
            for i in 0..25 {
                handle.enqueue(LogRecord::new(
                    Level::Info,
                    "test",
                    format!("producer {p} message {i}"),
                ));
                sleep(Duration::from_millis(37)).await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let handle = processor.handle();
    processor.stop().await;

    let lines = delivery.sent_lines();
    assert_eq!(lines.len(), 100);

    // Per-producer order is preserved even though producers interleave.
    for p in 0..4 {
        let per_producer: Vec<&String> = lines
            .iter()
            .filter(|line| line.starts_with(&format!("producer {p} ")))
            .collect();
        let expected: Vec<String> = (0..25)
            .map(|i| format!("producer {p} message {i}"))
            .collect();
        assert_eq!(per_producer.len(), 25);
        for (got, want) in per_producer.iter().zip(&expected) {
            assert_eq!(got.as_str(), want);
        }
    }

    assert_eq!(handle.stats().records_enqueued, 100);
}
