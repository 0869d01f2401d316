// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while building sink configuration.
///
/// All of these surface at construction time; a successfully built sink
/// never fails with a configuration error at runtime.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Rule check period must be greater than zero")]
    ZeroCheckPeriod,

    #[error("Retention bound must allow at least one record")]
    ZeroRetention,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by a delivery attempt to the remote endpoint.
///
/// Variants are kept distinguishable so callers can observe why a batch was
/// retained, but the processor's retry policy treats them uniformly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by endpoint (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Endpoint rejected batch: {0}")]
    Rejected(String),
}
