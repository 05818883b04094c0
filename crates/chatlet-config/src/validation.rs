// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express. All
//! violations are collected; validation does not stop at the first one.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ChatletConfig;

const KNOWN_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ChatletConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !KNOWN_LOG_LEVELS.contains(&config.bot.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::invalid(
            "bot.log_level",
            format!(
                "`{}` is not one of {}",
                config.bot.log_level,
                KNOWN_LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }

    validate_host(config, &mut errors);
    validate_sandbox(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_host(config: &ChatletConfig, errors: &mut Vec<ConfigError>) {
    let host = &config.host;

    let mut marker = host.command_marker.chars();
    match (marker.next(), marker.next()) {
        (Some(c), None) if !c.is_whitespace() && !c.is_alphanumeric() => {}
        _ => errors.push(ConfigError::invalid(
            "host.command_marker",
            format!(
                "must be a single punctuation character, got `{}`",
                host.command_marker
            ),
        )),
    }

    let finish = normalized_set(&host.finish_words);
    let cont = normalized_set(&host.continue_words);
    if finish.is_empty() {
        errors.push(ConfigError::invalid(
            "host.finish_words",
            "at least one word is required",
        ));
    }
    if cont.is_empty() {
        errors.push(ConfigError::invalid(
            "host.continue_words",
            "at least one word is required",
        ));
    }
    let mut overlap: Vec<_> = finish.intersection(&cont).cloned().collect();
    if !overlap.is_empty() {
        overlap.sort();
        errors.push(ConfigError::invalid(
            "host.continue_words",
            format!("words also listed in finish_words: {}", overlap.join(", ")),
        ));
    }

    for ext in &host.document_extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            errors.push(ConfigError::invalid(
                "host.document_extensions",
                format!("`{ext}` must start with `.`, e.g. `.txt`"),
            ));
        }
    }

    for (key, value) in [
        ("host.inline_view_limit", host.inline_view_limit),
        ("host.edit_preview_limit", host.edit_preview_limit),
        ("host.error_message_limit", host.error_message_limit),
    ] {
        if value == 0 {
            errors.push(ConfigError::invalid(key, "must be greater than zero"));
        }
    }

    if host.worker_idle_secs == 0 {
        errors.push(ConfigError::invalid(
            "host.worker_idle_secs",
            "must be greater than zero",
        ));
    }
}

fn validate_sandbox(config: &ChatletConfig, errors: &mut Vec<ConfigError>) {
    let sandbox = &config.sandbox;

    if sandbox.execution_timeout_secs == Some(0) {
        errors.push(ConfigError::invalid(
            "sandbox.execution_timeout_secs",
            "must be greater than zero; omit it to disable the deadline",
        ));
    }

    if sandbox.hook_instruction_interval == 0 {
        errors.push(ConfigError::invalid(
            "sandbox.hook_instruction_interval",
            "must be greater than zero",
        ));
    }

    for (key, name) in [
        ("sandbox.entry_point", &sandbox.entry_point),
        ("sandbox.trigger_entry_point", &sandbox.trigger_entry_point),
    ] {
        if !is_lua_identifier(name) {
            errors.push(ConfigError::invalid(
                key,
                format!("`{name}` is not a valid function name"),
            ));
        }
    }

    let mut seen = HashSet::new();
    for name in &sandbox.callback_handlers {
        if !is_lua_identifier(name) {
            errors.push(ConfigError::invalid(
                "sandbox.callback_handlers",
                format!("`{name}` is not a valid function name"),
            ));
        }
        if !seen.insert(name.as_str()) {
            errors.push(ConfigError::invalid(
                "sandbox.callback_handlers",
                format!("duplicate handler name `{name}`"),
            ));
        }
    }
}

fn normalized_set(words: &[String]) -> HashSet<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ChatletConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ChatletConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ChatletConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|e| e.contains("storage.database_path")));
    }

    #[test]
    fn multi_char_marker_is_rejected() {
        let mut config = ChatletConfig::default();
        config.host.command_marker = "//".to_string();
        assert!(messages(&config)[0].contains("host.command_marker"));

        config.host.command_marker = "a".to_string();
        assert!(validate_config(&config).is_err());

        config.host.command_marker = "!".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn overlapping_vocabularies_are_rejected() {
        let mut config = ChatletConfig::default();
        config.host.continue_words.push("DONE".to_string());
        let errors = messages(&config);
        assert!(errors.iter().any(|e| e.contains("done")));
    }

    #[test]
    fn empty_finish_words_are_rejected() {
        let mut config = ChatletConfig::default();
        config.host.finish_words = vec!["   ".to_string()];
        assert!(messages(&config)
            .iter()
            .any(|e| e.contains("host.finish_words")));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = ChatletConfig::default();
        config.sandbox.execution_timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());
        config.sandbox.execution_timeout_secs = Some(5);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = ChatletConfig::default();
        config.bot.log_level = "loud".to_string();
        config.host.document_extensions = vec!["txt".to_string()];
        config.sandbox.callback_handlers =
            vec!["handle_callback".to_string(), "handle_callback".to_string()];
        config.sandbox.entry_point = "1run".to_string();
        assert_eq!(validate_config(&config).unwrap_err().len(), 4);
    }
}
