// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::Level;

/// Pure per-record severity gate, built once from a default minimum level
/// plus category-prefix overrides. Evaluated before a record ever reaches
/// the queue; no side effects, no state beyond its configuration.
#[derive(Debug, Clone)]
pub struct LevelChecker {
    default_level: Level,
    // Sorted longest-prefix-first so the first match wins.
    overrides: Vec<(String, Level)>,
}

impl LevelChecker {
    pub fn new(default_level: Level, mut overrides: Vec<(String, Level)>) -> Self {
        overrides.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        LevelChecker {
            default_level,
            overrides,
        }
    }

    /// Minimum severity that applies to `category`: the longest matching
    /// prefix override, or the default when none matches.
    pub fn min_level(&self, category: &str) -> Level {
        self.overrides
            .iter()
            .find(|(prefix, _)| category.starts_with(prefix.as_str()))
            .map_or(self.default_level, |(_, level)| *level)
    }

    pub fn should_log(&self, level: Level, category: &str) -> bool {
        level >= self.min_level(category)
    }
}

impl Default for LevelChecker {
    fn default() -> Self {
        LevelChecker::new(Level::Info, Vec::new())
    }
}
