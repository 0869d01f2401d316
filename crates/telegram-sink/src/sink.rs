// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Facade wiring the level checker, formatter, transport client, rules, and
//! queue processor into one sink the host application writes to.

use crate::client::{TelegramClient, TelegramClientConfig};
use crate::formatter::{HtmlMessageFormatter, PlainMessageFormatter};
use crate::options::TelegramSinkOptions;
use std::sync::Arc;
use telegram_sink_core::{
    BatchAgeRule, BatchDelivery, BatchSizeRule, ConfigError, EmitRules, EmitRulesConfig, Level,
    LevelChecker, LogRecord, MessageFormatter, ProcessorConfig, QueueProcessor, RetentionPolicy,
    StatsSnapshot,
};
use tracing::debug;

/// Builder for [`TelegramSink`], for swapping in custom rules, a custom
/// formatter, or a non-Telegram delivery (mostly in tests).
pub struct TelegramSinkBuilder {
    options: TelegramSinkOptions,
    rules: Option<EmitRulesConfig>,
    formatter: Option<Arc<dyn MessageFormatter>>,
    parse_mode: Option<String>,
    delivery: Option<Arc<dyn BatchDelivery>>,
    api_base_url: Option<String>,
}

impl TelegramSinkBuilder {
    pub fn new(options: TelegramSinkOptions) -> Self {
        TelegramSinkBuilder {
            options,
            rules: None,
            formatter: None,
            parse_mode: None,
            delivery: None,
            api_base_url: None,
        }
    }

    /// Replace the size/age rule pair derived from the options.
    pub fn with_rules(mut self, rules: EmitRulesConfig) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Replace the built-in formatter. `parse_mode` must match the markup
    /// the formatter emits (`Some("HTML")`, `Some("MarkdownV2")`, or none).
    pub fn with_formatter(
        mut self,
        formatter: Arc<dyn MessageFormatter>,
        parse_mode: Option<String>,
    ) -> Self {
        self.formatter = Some(formatter);
        self.parse_mode = parse_mode;
        self
    }

    /// Replace the Telegram client with a custom delivery.
    pub fn with_delivery(mut self, delivery: Arc<dyn BatchDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Point the Telegram client at a different API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Validate everything and start the background processor.
    pub fn start(self) -> Result<TelegramSink, ConfigError> {
        let options = self.options;
        options.validate()?;

        let checker = LevelChecker::new(
            options.default_level,
            options
                .category_levels
                .iter()
                .map(|(prefix, level)| (prefix.clone(), *level))
                .collect(),
        );

        let (formatter, parse_mode) = match self.formatter {
            Some(formatter) => (formatter, self.parse_mode),
            None if options.html_markup => (
                Arc::new(HtmlMessageFormatter::new(
                    options.source.clone(),
                    options.use_emoji,
                )) as Arc<dyn MessageFormatter>,
                Some("HTML".to_string()),
            ),
            None => (
                Arc::new(PlainMessageFormatter::new(
                    options.source.clone(),
                    options.use_emoji,
                )) as Arc<dyn MessageFormatter>,
                None,
            ),
        };

        let delivery: Arc<dyn BatchDelivery> = match self.delivery {
            Some(delivery) => delivery,
            None => Arc::new(TelegramClient::new(TelegramClientConfig {
                bot_token: options.bot_token.clone(),
                chat_id: options.chat_id.clone(),
                api_base_url: self
                    .api_base_url
                    .unwrap_or_else(|| crate::client::TELEGRAM_API_BASE.to_string()),
                parse_mode,
                disable_notification: options.disable_notification,
                disable_web_page_preview: true,
                timeout: options.request_timeout(),
            })?),
        };

        let rules_config = self.rules.unwrap_or_else(|| EmitRulesConfig {
            check_period: options.check_period(),
            rules: vec![
                Arc::new(BatchSizeRule::new(options.batch_size)),
                Arc::new(BatchAgeRule::new(options.max_batch_age())),
            ],
            async_rules: Vec::new(),
        });
        let rules = EmitRules::new(rules_config)?;

        let mut processor_config = ProcessorConfig::new(rules, formatter, delivery);
        processor_config.retention = RetentionPolicy::new(
            options.max_retained_records,
            Some(options.max_retained_age()),
        )?;
        processor_config.shutdown_grace = options.shutdown_grace();

        let processor = QueueProcessor::start(processor_config);
        debug!("Telegram sink started");

        Ok(TelegramSink { processor, checker })
    }
}

/// A running Telegram log sink.
///
/// `write` calls are fire-and-forget: the record is level-checked and
/// enqueued under a short lock, and everything that can fail (rule
/// evaluation, delivery, hooks) happens on the background processor, never
/// in the caller's path.
pub struct TelegramSink {
    processor: QueueProcessor,
    checker: LevelChecker,
}

impl TelegramSink {
    pub fn builder(options: TelegramSinkOptions) -> TelegramSinkBuilder {
        TelegramSinkBuilder::new(options)
    }

    /// Build and start a sink with the default formatter, rules, and
    /// Telegram client.
    pub fn start(options: TelegramSinkOptions) -> Result<Self, ConfigError> {
        TelegramSinkBuilder::new(options).start()
    }

    pub fn write(&self, level: Level, category: &str, message: impl Into<String>) {
        if !self.checker.should_log(level, category) {
            return;
        }
        self.processor
            .handle()
            .enqueue(LogRecord::new(level, category, message));
    }

    pub fn write_error(
        &self,
        level: Level,
        category: &str,
        message: impl Into<String>,
        error: &dyn std::error::Error,
    ) {
        if !self.checker.should_log(level, category) {
            return;
        }
        self.processor
            .handle()
            .enqueue(LogRecord::new(level, category, message).with_error(error.to_string()));
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.processor.stats()
    }

    /// Drain and shut down; see
    /// [`QueueProcessor::stop`](telegram_sink_core::QueueProcessor::stop).
    pub async fn stop(self) {
        self.processor.stop().await;
    }
}
