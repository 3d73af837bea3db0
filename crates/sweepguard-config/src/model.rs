// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sweepguard service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Sweepguard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Telegram transport settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Auto-delete engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Socket address for the Prometheus scrape endpoint, e.g.
    /// "127.0.0.1:9184". Disabled when unset; the engine still logs
    /// periodic summaries either way.
    #[serde(default)]
    pub metrics_listen: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_listen: None,
        }
    }
}

fn default_service_name() -> String {
    "sweepguard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required to run the service.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sweepguard").join("sweepguard.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "sweepguard.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Auto-delete engine configuration.
///
/// Timing values are validated in `validation.rs`; the defaults match the
/// operating envelope the engine is tuned for (200ms ticks, 100-id chunks).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Seconds between detecting an eligible message and deleting it.
    #[serde(default = "default_delete_delay_seconds")]
    pub delete_delay_seconds: u64,

    /// Scheduler tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum message ids per batch-delete call. Hard platform cap: 100.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Retries before a pending deletion is marked failed.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base of the exponential backoff, in seconds.
    #[serde(default = "default_retry_base_seconds")]
    pub retry_base_seconds: f64,

    /// Ceiling of the exponential backoff, in seconds.
    #[serde(default = "default_retry_max_seconds")]
    pub retry_max_seconds: f64,

    /// Fixed number of concurrent delete workers.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Per-call timeout for platform API requests, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Seconds between protected-chat cache refreshes.
    #[serde(default = "default_cache_refresh_seconds")]
    pub cache_refresh_seconds: u64,

    /// Seconds between metrics snapshot log lines.
    #[serde(default = "default_metrics_log_interval_seconds")]
    pub metrics_log_interval_seconds: u64,

    /// Mirror pending deletions to durable storage for crash recovery.
    #[serde(default)]
    pub persistence_enabled: bool,

    /// TTL for persisted pending-deletion records, in hours.
    #[serde(default = "default_persistence_ttl_hours")]
    pub persistence_ttl_hours: u64,

    /// Maximum records re-inserted on startup restore.
    #[serde(default = "default_restore_limit")]
    pub restore_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_delay_seconds: default_delete_delay_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            chunk_size: default_chunk_size(),
            retry_attempts: default_retry_attempts(),
            retry_base_seconds: default_retry_base_seconds(),
            retry_max_seconds: default_retry_max_seconds(),
            worker_concurrency: default_worker_concurrency(),
            request_timeout_seconds: default_request_timeout_seconds(),
            cache_refresh_seconds: default_cache_refresh_seconds(),
            metrics_log_interval_seconds: default_metrics_log_interval_seconds(),
            persistence_enabled: false,
            persistence_ttl_hours: default_persistence_ttl_hours(),
            restore_limit: default_restore_limit(),
        }
    }
}

fn default_delete_delay_seconds() -> u64 {
    35
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_chunk_size() -> usize {
    100
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_base_seconds() -> f64 {
    1.5
}

fn default_retry_max_seconds() -> f64 {
    35.0
}

fn default_worker_concurrency() -> usize {
    12
}

fn default_request_timeout_seconds() -> u64 {
    15
}

fn default_cache_refresh_seconds() -> u64 {
    20
}

fn default_metrics_log_interval_seconds() -> u64 {
    60
}

fn default_persistence_ttl_hours() -> u64 {
    24
}

fn default_restore_limit() -> usize {
    20_000
}
