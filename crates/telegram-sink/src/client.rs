// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telegram Bot API transport.
//!
//! Implements [`BatchDelivery`] over `sendMessage`. A batch text longer
//! than Telegram's message limit is split on line boundaries into
//! sequential sends; a 429 inside such a sequence is retried internally
//! (bounded), so a batch either fully succeeds or fails as a unit and the
//! engine's per-tick retry applies uniformly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use telegram_sink_core::{BatchDelivery, ConfigError, DeliveryError};
use tracing::{debug, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Hard limit the Bot API puts on one message's text.
pub const MAX_MESSAGE_LEN: usize = 4096;

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramClientConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Overridable so tests can point the client at a mock server.
    pub api_base_url: String,
    pub parse_mode: Option<String>,
    pub disable_notification: bool,
    pub disable_web_page_preview: bool,
    pub timeout: Duration,
}

impl Default for TelegramClientConfig {
    fn default() -> Self {
        TelegramClientConfig {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: TELEGRAM_API_BASE.to_string(),
            parse_mode: None,
            disable_notification: true,
            disable_web_page_preview: true,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
    disable_notification: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramClientConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramClientConfig) -> Result<Self, ConfigError> {
        if config.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid("Bot token cannot be empty".into()));
        }
        if config.chat_id.trim().is_empty() {
            return Err(ConfigError::Invalid("Chat id cannot be empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to build HTTP client: {e}")))?;
        Ok(TelegramClient { http, config })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// Send one message, retrying bounded rate-limit answers internally.
    async fn send_message(&self, text: &str) -> Result<(), DeliveryError> {
        let url = self.send_message_url();
        let mut attempt = 0u32;

        loop {
            let body = SendMessageRequest {
                chat_id: &self.config.chat_id,
                text,
                parse_mode: self.config.parse_mode.as_deref(),
                disable_web_page_preview: self.config.disable_web_page_preview,
                disable_notification: self.config.disable_notification,
            };

            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| DeliveryError::Network(e.to_string()))?;

            let status = response.status();
            let raw = response
                .text()
                .await
                .map_err(|e| DeliveryError::Network(e.to_string()))?;
            let api: ApiResponse = serde_json::from_str(&raw).unwrap_or_default();

            if api.ok {
                return Ok(());
            }

            let description = api
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));

            match status.as_u16() {
                401 | 403 => return Err(DeliveryError::Auth(description)),
                429 => {
                    let retry_after = api.parameters.and_then(|p| p.retry_after);
                    attempt += 1;
                    if attempt > MAX_RATE_LIMIT_RETRIES {
                        return Err(DeliveryError::RateLimited { retry_after });
                    }
                    let wait = Duration::from_secs(retry_after.unwrap_or(1)).min(MAX_RETRY_AFTER);
                    warn!(
                        "Telegram rate limit hit, retrying in {:?} (attempt {attempt}/{MAX_RATE_LIMIT_RETRIES})",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => return Err(DeliveryError::Rejected(description)),
            }
        }
    }
}

#[async_trait]
impl BatchDelivery for TelegramClient {
    async fn deliver(&self, batch_text: &str) -> Result<usize, DeliveryError> {
        let chunks = split_message(batch_text, MAX_MESSAGE_LEN);
        for chunk in &chunks {
            self.send_message(chunk).await?;
        }
        debug!("Delivered batch as {} Telegram messages", chunks.len());
        Ok(chunks.len())
    }
}

/// Split `text` into chunks of at most `max_len` characters, preferring
/// line boundaries. A single line longer than the limit is hard-split.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.split('\n') {
        let line_chars = line.chars().count();

        if line_chars > max_len {
            // Oversized line: flush what we have, then hard-split it.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let mut piece = String::new();
            let mut piece_chars = 0usize;
            for ch in line.chars() {
                if piece_chars == max_len {
                    chunks.push(std::mem::take(&mut piece));
                    piece_chars = 0;
                }
                piece.push(ch);
                piece_chars += 1;
            }
            current = piece;
            current_chars = piece_chars;
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if current_chars + separator + line_chars > max_len {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_empty_credentials() {
        assert!(TelegramClient::new(TelegramClientConfig::default()).is_err());
        assert!(TelegramClient::new(TelegramClientConfig {
            bot_token: "123:abc".into(),
            ..Default::default()
        })
        .is_err());
        assert!(TelegramClient::new(TelegramClientConfig {
            bot_token: "123:abc".into(),
            chat_id: "-100200300".into(),
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn test_send_message_url_shape() {
        let client = TelegramClient::new(TelegramClientConfig {
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
            api_base_url: "https://example.test/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.send_message_url(),
            "https://example.test/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_split_message_short_text_untouched() {
        assert_eq!(split_message("hello\nworld", 4096), vec!["hello\nworld"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_split_message_prefers_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_message(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_message_hard_splits_oversized_line() {
        let text = "x".repeat(10);
        let chunks = split_message(&text, 4);
        assert_eq!(chunks, vec!["xxxx", "xxxx", "xx"]);
    }

    #[test]
    fn test_split_message_multibyte_safety() {
        let text = "héllo wörld ".repeat(50);
        for chunk in split_message(&text, 16) {
            assert!(chunk.chars().count() <= 16);
        }
    }

    #[test]
    fn test_api_response_parsing() {
        let raw = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(!api.ok);
        assert_eq!(api.parameters.unwrap().retry_after, Some(7));
    }
}
