// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and diagnostics.

use sweepguard_config::{ConfigError, load_and_validate_str};

#[test]
fn minimal_config_with_token_validates() {
    let config = load_and_validate_str(
        r#"
        [telegram]
        bot_token = "123456:ABC-DEF"

        [storage]
        database_path = "/tmp/sweepguard-test.db"
        "#,
    )
    .expect("config should be valid");

    assert_eq!(config.telegram.bot_token.as_deref(), Some("123456:ABC-DEF"));
    assert_eq!(config.engine.delete_delay_seconds, 35);
}

#[test]
fn unknown_engine_key_gets_suggestion() {
    let errors = load_and_validate_str(
        r#"
        [engine]
        chunck_size = 50
        "#,
    )
    .expect_err("typoed key should fail");

    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { key, suggestion, .. } => {
                Some((key.clone(), suggestion.clone()))
            }
            _ => None,
        })
        .expect("should surface an UnknownKey diagnostic");

    assert_eq!(unknown.0, "chunck_size");
    assert_eq!(unknown.1.as_deref(), Some("chunk_size"));
}

#[test]
fn out_of_range_values_surface_validation_errors() {
    let errors = load_and_validate_str(
        r#"
        [engine]
        chunk_size = 500
        tick_interval_ms = 5
        "#,
    )
    .expect_err("out-of-range values should fail validation");

    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert!(matches!(error, ConfigError::Validation { .. }));
    }
}

#[test]
fn wrong_type_reports_invalid_type() {
    let errors = load_and_validate_str(
        r#"
        [engine]
        chunk_size = "a lot"
        "#,
    )
    .expect_err("string chunk_size should fail");

    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_))),
        "expected a type diagnostic, got: {errors:?}"
    );
}

#[test]
fn persistence_section_round_trips() {
    let config = load_and_validate_str(
        r#"
        [engine]
        persistence_enabled = true
        persistence_ttl_hours = 48
        restore_limit = 30
        "#,
    )
    .unwrap();

    assert!(config.engine.persistence_enabled);
    assert_eq!(config.engine.persistence_ttl_hours, 48);
    assert_eq!(config.engine.restore_limit, 30);
}
