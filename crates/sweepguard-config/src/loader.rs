// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sweepguard.toml` > `~/.config/sweepguard/sweepguard.toml`
//! > `/etc/sweepguard/sweepguard.toml` with environment variable overrides via
//! `SWEEPGUARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SweepConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sweepguard/sweepguard.toml` (system-wide)
/// 3. `~/.config/sweepguard/sweepguard.toml` (user XDG config)
/// 4. `./sweepguard.toml` (local directory)
/// 5. `SWEEPGUARD_*` environment variables
pub fn load_config() -> Result<SweepConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<SweepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SweepConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SweepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SweepConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SweepConfig::default()))
        .merge(Toml::file("/etc/sweepguard/sweepguard.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sweepguard/sweepguard.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sweepguard.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SWEEPGUARD_TELEGRAM_BOT_TOKEN` must map
/// to `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("SWEEPGUARD_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped,
        // e.g. SWEEPGUARD_ENGINE_CHUNK_SIZE -> "engine_chunk_size".
        let mapped = key
            .as_str()
            .replacen("service_", "service.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("engine_", "engine.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_string_overrides_defaults() {
        let cfg = load_config_from_str(
            r#"
            [engine]
            delete_delay_seconds = 10
            chunk_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.delete_delay_seconds, 10);
        assert_eq!(cfg.engine.chunk_size, 50);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.engine.tick_interval_ms, 200);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
            [engine]
            delete_dealy_seconds = 10
            "#,
        );
        assert!(result.is_err(), "typoed key should be rejected");
    }

    #[test]
    fn empty_input_yields_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.engine.worker_concurrency, 12);
        assert!(cfg.telegram.bot_token.is_none());
    }
}
