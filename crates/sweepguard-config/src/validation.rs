// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as the platform's 100-id batch cap and timing bounds.

use crate::diagnostic::ConfigError;
use crate::model::SweepConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SweepConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let engine = &config.engine;

    if engine.delete_delay_seconds < 1 {
        errors.push(validation("engine.delete_delay_seconds must be >= 1"));
    }

    if !(50..=2000).contains(&engine.tick_interval_ms) {
        errors.push(validation(&format!(
            "engine.tick_interval_ms must be between 50 and 2000, got {}",
            engine.tick_interval_ms
        )));
    }

    // Telegram's deleteMessages accepts at most 100 ids per call.
    if !(1..=100).contains(&engine.chunk_size) {
        errors.push(validation(&format!(
            "engine.chunk_size must be between 1 and 100, got {}",
            engine.chunk_size
        )));
    }

    if engine.retry_attempts > 20 {
        errors.push(validation(&format!(
            "engine.retry_attempts must be at most 20, got {}",
            engine.retry_attempts
        )));
    }

    if engine.retry_base_seconds <= 0.0 {
        errors.push(validation("engine.retry_base_seconds must be positive"));
    }

    if engine.retry_max_seconds < engine.retry_base_seconds {
        errors.push(validation(
            "engine.retry_max_seconds must be >= engine.retry_base_seconds",
        ));
    }

    if !(1..=50).contains(&engine.worker_concurrency) {
        errors.push(validation(&format!(
            "engine.worker_concurrency must be between 1 and 50, got {}",
            engine.worker_concurrency
        )));
    }

    if engine.request_timeout_seconds < 1 {
        errors.push(validation("engine.request_timeout_seconds must be >= 1"));
    }

    if engine.cache_refresh_seconds < 5 {
        errors.push(validation(&format!(
            "engine.cache_refresh_seconds must be >= 5, got {}",
            engine.cache_refresh_seconds
        )));
    }

    if engine.metrics_log_interval_seconds < 10 {
        errors.push(validation("engine.metrics_log_interval_seconds must be >= 10"));
    }

    if !(1..=168).contains(&engine.persistence_ttl_hours) {
        errors.push(validation(&format!(
            "engine.persistence_ttl_hours must be between 1 and 168, got {}",
            engine.persistence_ttl_hours
        )));
    }

    if engine.restore_limit > 200_000 {
        errors.push(validation(&format!(
            "engine.restore_limit must be at most 200000, got {}",
            engine.restore_limit
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }

    if let Some(addr) = &config.service.metrics_listen {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(validation(&format!(
                "service.metrics_listen must be a socket address like 127.0.0.1:9184, got {addr:?}"
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SweepConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn chunk_size_over_platform_cap_is_rejected() {
        let mut config = SweepConfig::default();
        config.engine.chunk_size = 101;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("chunk_size")));
    }

    #[test]
    fn all_errors_are_collected_not_just_first() {
        let mut config = SweepConfig::default();
        config.engine.chunk_size = 0;
        config.engine.tick_interval_ms = 10;
        config.engine.cache_refresh_seconds = 1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn retry_max_below_base_is_rejected() {
        let mut config = SweepConfig::default();
        config.engine.retry_base_seconds = 10.0;
        config.engine.retry_max_seconds = 5.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let mut config = SweepConfig::default();
        config.storage.database_path = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn metrics_listen_must_be_a_socket_address() {
        let mut config = SweepConfig::default();
        config.service.metrics_listen = Some("localhost".to_string());
        assert!(validate_config(&config).is_err());

        config.service.metrics_listen = Some("127.0.0.1:9184".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
