// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telegram log sink: buffers application log events and forwards them as
//! batches to a Telegram chat, with rule-driven flush decisions.
//!
//! The batching engine lives in `telegram-sink-core`; this crate adds the
//! Bot API transport, the message formatters, the options surface, and the
//! [`TelegramSink`] facade.
//!
//! ```no_run
//! use telegram_sink::{TelegramSink, TelegramSinkOptions};
//! use telegram_sink_core::Level;
//!
//! # async fn example() -> Result<(), telegram_sink_core::ConfigError> {
//! let sink = TelegramSink::start(TelegramSinkOptions::new("123:abc", "-100200300"))?;
//! sink.write(Level::Error, "app.payments", "charge failed");
//! sink.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod formatter;
pub mod options;
pub mod sink;

pub use client::{TelegramClient, TelegramClientConfig};
pub use formatter::{HtmlMessageFormatter, PlainMessageFormatter};
pub use options::TelegramSinkOptions;
pub use sink::{TelegramSink, TelegramSinkBuilder};
