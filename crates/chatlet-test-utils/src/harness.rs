// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete host over a mock transport and a temp
//! SQLite database. Events go straight into `ExtensionHost::handle_event`, so
//! every helper returns only after the event has been fully processed.

use std::sync::Arc;

use chatlet_config::model::{ChatletConfig, StorageConfig};
use chatlet_core::{
    AccessMode, ChannelAdapter, ChatId, ChatKind, ChatRef, ChatletError, InboundEvent, Sender,
    StorageAdapter, UserId,
};
use chatlet_host::ExtensionHost;
use chatlet_storage::SqliteStorage;

use crate::mock_channel::MockChannel;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ChatletConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ChatletConfig::default(),
        }
    }

    pub fn with_super_operator(mut self, user_id: i64) -> Self {
        self.config.host.super_operator = Some(user_id);
        self
    }

    pub fn with_default_access_mode(mut self, mode: AccessMode) -> Self {
        self.config.host.default_access_mode = mode;
        self
    }

    pub fn with_execution_timeout(mut self, secs: u64) -> Self {
        self.config.sandbox.execution_timeout_secs = Some(secs);
        self
    }

    /// Apply arbitrary changes to the configuration.
    pub fn with_config(mut self, change: impl FnOnce(&mut ChatletConfig)) -> Self {
        change(&mut self.config);
        self
    }

    /// Build the harness, creating the temp database and starting the host.
    pub async fn build(self) -> Result<TestHarness, ChatletError> {
        let temp_dir = tempfile::TempDir::new().map_err(ChatletError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;
        let channel = Arc::new(MockChannel::new());

        let store: Arc<dyn StorageAdapter + Send + Sync> = storage.clone();
        let transport: Arc<dyn ChannelAdapter + Send + Sync> = channel.clone();
        let host = Arc::new(ExtensionHost::start(&config, store, transport).await?);

        Ok(TestHarness {
            channel,
            storage,
            host,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock transport and temp storage.
pub struct TestHarness {
    /// The mock transport.
    pub channel: Arc<MockChannel>,
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The running host.
    pub host: Arc<ExtensionHost>,
    pub config: ChatletConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default configuration.
    pub async fn new() -> Result<Self, ChatletError> {
        Self::builder().build().await
    }

    pub fn private_chat(id: i64) -> ChatRef {
        ChatRef {
            id: ChatId(id),
            kind: ChatKind::Private,
        }
    }

    pub fn group_chat(id: i64) -> ChatRef {
        ChatRef {
            id: ChatId(id),
            kind: ChatKind::Supergroup,
        }
    }

    pub fn user(id: i64, username: &str) -> Sender {
        Sender {
            id: UserId(id),
            username: Some(username.to_string()),
            first_name: None,
        }
    }

    /// Deliver a text message and wait for it to be handled.
    pub async fn send_text(&self, chat: ChatRef, sender: &Sender, text: &str) {
        self.host
            .handle_event(InboundEvent::Text {
                chat,
                sender: sender.clone(),
                text: text.to_string(),
            })
            .await;
    }

    /// Deliver an uploaded document and wait for it to be handled.
    pub async fn send_document(&self, chat: ChatRef, sender: &Sender, filename: &str, body: &str) {
        self.host
            .handle_event(InboundEvent::Document {
                chat,
                sender: sender.clone(),
                filename: filename.to_string(),
                bytes: body.as_bytes().to_vec(),
            })
            .await;
    }

    /// Deliver a button press and wait for it to be handled.
    pub async fn press_button(&self, chat: ChatRef, sender: &Sender, query_id: &str, payload: &str) {
        self.host
            .handle_event(InboundEvent::Callback {
                chat,
                sender: sender.clone(),
                query_id: query_id.to_string(),
                payload: payload.to_string(),
            })
            .await;
    }

    /// Submit a script through `/addscript`, a single chunk, and the first
    /// finish word.
    pub async fn add_script(&self, chat: ChatRef, sender: &Sender, submission: &str) {
        let marker = &self.config.host.command_marker;
        self.send_text(chat, sender, &format!("{marker}addscript")).await;
        self.send_text(chat, sender, submission).await;
        let finish = self
            .config
            .host
            .finish_words
            .first()
            .cloned()
            .unwrap_or_else(|| "done".to_string());
        self.send_text(chat, sender, &finish).await;
    }
}

/// Build a submission with all three directives.
pub fn submission(command: &str, description: &str, code: &str) -> String {
    format!("###COMMAND: {command}\n###DESCRIPTION: {description}\n###CODE:\n{code}")
}
