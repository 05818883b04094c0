// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatlet serve` command implementation.
//!
//! Opens the store, connects the Telegram channel, starts the extension host
//! and routes events until SIGINT or SIGTERM. Workers get a bounded window to
//! finish in-flight scripts before the store is closed.

use std::sync::Arc;
use std::time::Duration;

use chatlet_config::model::ChatletConfig;
use chatlet_core::{ChannelAdapter, ChatletError, StorageAdapter};
use chatlet_host::{EventRouter, ExtensionHost};
use chatlet_storage::SqliteStorage;
use chatlet_telegram::TelegramChannel;
use tracing::{error, info, warn};

use crate::shutdown;

/// How long in-flight events may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the `chatlet serve` command.
pub async fn run_serve(config: ChatletConfig) -> Result<(), ChatletError> {
    init_tracing(&config.bot.log_level);

    info!(name = %config.bot.name, "starting chatlet serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);
    info!(path = %config.storage.database_path, "storage initialized");

    let mut telegram = TelegramChannel::new(config.telegram.clone()).map_err(|e| {
        error!(error = %e, "failed to initialize Telegram channel");
        eprintln!(
            "error: Telegram bot token required. Set telegram.bot_token in chatlet.toml or CHATLET_TELEGRAM_BOT_TOKEN"
        );
        e
    })?;
    telegram.connect().await?;
    let channel: Arc<dyn ChannelAdapter + Send + Sync> = Arc::new(telegram);

    let host = Arc::new(
        ExtensionHost::start(&config, storage, Arc::clone(&channel)).await?,
    );

    let cancel = shutdown::install_signal_handler();
    let router = EventRouter::new(Arc::clone(&host));
    let result = router.run(cancel, DRAIN_TIMEOUT).await;

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    host.shutdown().await?;
    info!("chatlet stopped");
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatlet={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
