// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch-to-text formatters for Telegram messages.

use telegram_sink_core::{Level, LogRecord, MessageFormatter};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn level_emoji(level: Level) -> &'static str {
    match level {
        Level::Trace => "⬜",
        Level::Debug => "🔹",
        Level::Info => "ℹ️",
        Level::Warn => "⚠️",
        Level::Error => "❌",
        Level::Critical => "🆘",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders records with Telegram HTML markup: bold level, italic category,
/// the error detail in a `<pre>` block. Pair with `parse_mode = "HTML"`.
pub struct HtmlMessageFormatter {
    source: Option<String>,
    use_emoji: bool,
}

impl HtmlMessageFormatter {
    pub fn new(source: Option<String>, use_emoji: bool) -> Self {
        HtmlMessageFormatter { source, use_emoji }
    }
}

impl Default for HtmlMessageFormatter {
    fn default() -> Self {
        HtmlMessageFormatter::new(None, true)
    }
}

impl MessageFormatter for HtmlMessageFormatter {
    fn format(&self, batch: &[LogRecord]) -> String {
        let mut blocks = Vec::with_capacity(batch.len() + 1);
        if let Some(source) = &self.source {
            blocks.push(format!("<b>{}</b>", escape_html(source)));
        }
        for record in batch {
            let mut block = String::new();
            if self.use_emoji {
                block.push_str(level_emoji(record.level));
                block.push(' ');
            }
            block.push_str(&format!(
                "<b>{}</b> <i>{}</i>\n{} UTC\n{}",
                record.level.as_str().to_uppercase(),
                escape_html(&record.category),
                record.timestamp.format(TIMESTAMP_FORMAT),
                escape_html(&record.message),
            ));
            if let Some(error) = &record.error {
                block.push_str(&format!("\n<pre>{}</pre>", escape_html(error)));
            }
            blocks.push(block);
        }
        blocks.join("\n\n")
    }
}

/// Same layout as [`HtmlMessageFormatter`] without markup or escaping.
pub struct PlainMessageFormatter {
    source: Option<String>,
    use_emoji: bool,
}

impl PlainMessageFormatter {
    pub fn new(source: Option<String>, use_emoji: bool) -> Self {
        PlainMessageFormatter { source, use_emoji }
    }
}

impl Default for PlainMessageFormatter {
    fn default() -> Self {
        PlainMessageFormatter::new(None, false)
    }
}

impl MessageFormatter for PlainMessageFormatter {
    fn format(&self, batch: &[LogRecord]) -> String {
        let mut blocks = Vec::with_capacity(batch.len() + 1);
        if let Some(source) = &self.source {
            blocks.push(source.clone());
        }
        for record in batch {
            let mut block = String::new();
            if self.use_emoji {
                block.push_str(level_emoji(record.level));
                block.push(' ');
            }
            block.push_str(&format!(
                "{} {}\n{} UTC\n{}",
                record.level.as_str().to_uppercase(),
                record.category,
                record.timestamp.format(TIMESTAMP_FORMAT),
                record.message,
            ));
            if let Some(error) = &record.error {
                block.push('\n');
                block.push_str(error);
            }
            blocks.push(block);
        }
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Warn, "app.payments", message)
    }

    #[test]
    fn test_html_formatter_escapes_markup() {
        let formatter = HtmlMessageFormatter::new(None, false);
        let text = formatter.format(&[record("a < b && c > d")]);
        assert!(text.contains("a &lt; b &amp;&amp; c &gt; d"));
        assert!(text.contains("<b>WARN</b> <i>app.payments</i>"));
        assert!(!text.contains("a < b"));
    }

    #[test]
    fn test_html_formatter_renders_error_in_pre_block() {
        let formatter = HtmlMessageFormatter::default();
        let text =
            formatter.format(&[record("query failed").with_error("timeout <after> 30s")]);
        assert!(text.contains("<pre>timeout &lt;after&gt; 30s</pre>"));
    }

    #[test]
    fn test_html_formatter_source_header() {
        let formatter = HtmlMessageFormatter::new(Some("orders-api".into()), false);
        let text = formatter.format(&[record("one"), record("two")]);
        assert!(text.starts_with("<b>orders-api</b>\n\n"));
        assert_eq!(text.matches("\n\n").count(), 2);
    }

    #[test]
    fn test_plain_formatter_has_no_markup() {
        let formatter = PlainMessageFormatter::default();
        let text = formatter.format(&[record("a < b").with_error("boom")]);
        assert!(text.contains("WARN app.payments"));
        assert!(text.contains("a < b"));
        assert!(text.contains("boom"));
        assert!(!text.contains("<b>"));
        assert!(!text.contains("<pre>"));
    }

    #[test]
    fn test_emoji_prefix() {
        let formatter = PlainMessageFormatter::new(None, true);
        let text = formatter.format(&[record("careful")]);
        assert!(text.starts_with("⚠️ WARN"));
    }
}
