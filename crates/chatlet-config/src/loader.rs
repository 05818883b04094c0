// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chatlet.toml` > `~/.config/chatlet/chatlet.toml` >
//! `/etc/chatlet/chatlet.toml` with environment variable overrides via `CHATLET_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ChatletConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/chatlet/chatlet.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "chatlet.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatlet").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatlet/chatlet.toml`
/// 3. `~/.config/chatlet/chatlet.toml`
/// 4. `./chatlet.toml`
/// 5. `CHATLET_*` environment variables
pub fn load_config() -> Result<ChatletConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatletConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatletConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatletConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration from explicit path");
    Figment::new()
        .merge(Serialized::defaults(ChatletConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatletConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `CHATLET_TELEGRAM_BOT_TOKEN` must become `telegram.bot_token`,
/// and `CHATLET_HOST_SUPER_OPERATOR` must become `host.super_operator`.
fn env_provider() -> Env {
    Env::prefixed("CHATLET_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 5] = ["bot", "telegram", "storage", "host", "sandbox"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
