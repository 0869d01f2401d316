// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use telegram_sink_core::{ConfigError, Level};

/// Configuration surface for the Telegram sink.
///
/// Constructible in code, from the environment via [`from_env`]
/// (`TG_SINK_*` variables), or deserialized from a configuration file.
/// Validation fails fast at construction; a running sink never hits a
/// configuration error.
///
/// [`from_env`]: TelegramSinkOptions::from_env
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSinkOptions {
    /// Bot API token, as issued by BotFather.
    pub bot_token: String,
    /// Target chat, group, or channel id.
    pub chat_id: String,
    /// Optional label identifying the emitting application, rendered as a
    /// header on every batch.
    pub source: Option<String>,
    /// How often the pending batch is re-checked against the rules.
    pub check_period_secs: u64,
    /// Emit when this many records are pending.
    pub batch_size: usize,
    /// Emit when the oldest pending record is this old.
    pub max_batch_age_secs: u64,
    /// Failed-delivery backlog bound, in records.
    pub max_retained_records: usize,
    /// Failed-delivery backlog bound, in seconds of record age.
    pub max_retained_age_secs: u64,
    /// How long an in-flight delivery may keep running after stop().
    pub shutdown_grace_secs: u64,
    pub request_timeout_secs: u64,
    /// Default minimum severity.
    pub default_level: Level,
    /// Per-category-prefix minimum severity overrides.
    pub category_levels: HashMap<String, Level>,
    pub use_emoji: bool,
    /// Deliver messages silently (no client-side notification sound).
    pub disable_notification: bool,
    /// Render with Telegram HTML markup; plain text otherwise.
    pub html_markup: bool,
}

impl Default for TelegramSinkOptions {
    fn default() -> Self {
        TelegramSinkOptions {
            bot_token: String::new(),
            chat_id: String::new(),
            source: None,
            check_period_secs: 5,
            batch_size: 10,
            max_batch_age_secs: 30,
            max_retained_records: 1_000,
            max_retained_age_secs: 600,
            shutdown_grace_secs: 5,
            request_timeout_secs: 10,
            default_level: Level::Info,
            category_levels: HashMap::new(),
            use_emoji: true,
            disable_notification: true,
            html_markup: true,
        }
    }
}

impl TelegramSinkOptions {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        TelegramSinkOptions {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            ..Default::default()
        }
    }

    /// Read options from `TG_SINK_*` environment variables. Unset numeric
    /// variables keep their defaults; the result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TelegramSinkOptions::default();

        let options = TelegramSinkOptions {
            bot_token: env::var("TG_SINK_BOT_TOKEN").unwrap_or_default(),
            chat_id: env::var("TG_SINK_CHAT_ID").unwrap_or_default(),
            source: env::var("TG_SINK_SOURCE").ok(),
            check_period_secs: env_u64("TG_SINK_CHECK_PERIOD_SECS", defaults.check_period_secs),
            batch_size: env_u64("TG_SINK_BATCH_SIZE", defaults.batch_size as u64) as usize,
            max_batch_age_secs: env_u64("TG_SINK_MAX_BATCH_AGE_SECS", defaults.max_batch_age_secs),
            max_retained_records: env_u64(
                "TG_SINK_MAX_RETAINED_RECORDS",
                defaults.max_retained_records as u64,
            ) as usize,
            max_retained_age_secs: env_u64(
                "TG_SINK_MAX_RETAINED_AGE_SECS",
                defaults.max_retained_age_secs,
            ),
            shutdown_grace_secs: env_u64(
                "TG_SINK_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace_secs,
            ),
            request_timeout_secs: env_u64(
                "TG_SINK_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            default_level: env::var("TG_SINK_LEVEL")
                .ok()
                .and_then(|val| val.parse().ok())
                .unwrap_or(defaults.default_level),
            category_levels: HashMap::new(),
            use_emoji: env_bool("TG_SINK_USE_EMOJI", defaults.use_emoji),
            disable_notification: env_bool(
                "TG_SINK_DISABLE_NOTIFICATION",
                defaults.disable_notification,
            ),
            html_markup: env_bool("TG_SINK_HTML_MARKUP", defaults.html_markup),
        };

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid("Bot token cannot be empty".into()));
        }
        if self.chat_id.trim().is_empty() {
            return Err(ConfigError::Invalid("Chat id cannot be empty".into()));
        }
        if self.check_period_secs == 0 {
            return Err(ConfigError::ZeroCheckPeriod);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "Batch size must be greater than zero".into(),
            ));
        }
        if self.max_batch_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "Max batch age must be greater than zero".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Request timeout must be greater than zero".into(),
            ));
        }
        if self.max_retained_records == 0 || self.max_retained_age_secs == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(())
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_secs)
    }

    pub fn max_batch_age(&self) -> Duration {
        Duration::from_secs(self.max_batch_age_secs)
    }

    pub fn max_retained_age(&self) -> Duration {
        Duration::from_secs(self.max_retained_age_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|val| val.to_lowercase() != "false" && val != "0")
        .unwrap_or(default)
}
