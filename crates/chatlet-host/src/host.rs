// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The extension host: owns every component and routes one event at a time.

use std::sync::Arc;

use chatlet_config::model::{ChatletConfig, HostConfig};
use chatlet_core::{
    ChannelAdapter, ChatId, ChatletError, InboundEvent, PluginAdapter, StorageAdapter, UserId,
};
use chatlet_sandbox::ScriptSandbox;
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::commands::ManagementCommand;
use crate::dispatcher::Dispatcher;
use crate::format::{send_host_text, HostText};
use crate::ingestion::{IngestionEngine, IngestionOutcome, SessionKind};
use crate::policy::PermissionPolicy;
use crate::registry::ScriptRegistry;

/// Process-wide state, built once at startup and shared behind an `Arc`.
pub struct ExtensionHost {
    pub(crate) config: HostConfig,
    pub(crate) channel: Arc<dyn ChannelAdapter + Send + Sync>,
    store: Arc<dyn StorageAdapter + Send + Sync>,
    sandbox: Arc<ScriptSandbox>,
    pub(crate) registry: Arc<ScriptRegistry>,
    pub(crate) policy: Arc<PermissionPolicy>,
    pub(crate) ingestion: Arc<IngestionEngine>,
    dispatcher: Arc<Dispatcher>,
}

impl ExtensionHost {
    /// Wire up every component and load the registry from an initialized store.
    pub async fn start(
        config: &ChatletConfig,
        store: Arc<dyn StorageAdapter + Send + Sync>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
    ) -> Result<Self, ChatletError> {
        let host = &config.host;
        let sandbox = Arc::new(ScriptSandbox::new(config.sandbox.clone()));
        let registry = Arc::new(
            ScriptRegistry::new(Arc::clone(&store)).with_compile_cache(Arc::clone(&sandbox)),
        );
        let loaded = registry.warm().await?;

        let policy = Arc::new(PermissionPolicy::new(
            Arc::clone(&store),
            Arc::clone(&channel),
            host.super_operator.map(UserId),
            host.default_access_mode,
        ));
        let ingestion = Arc::new(IngestionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            host,
            &config.sandbox,
        ));
        let audit = Arc::new(AuditSink::new(Arc::clone(&store), host.error_message_limit));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&sandbox),
            Arc::clone(&channel),
            audit,
            host.command_marker.clone(),
        ));

        info!(
            scripts = loaded,
            chats = registry.chat_count().await,
            marker = %host.command_marker,
            "extension host started"
        );
        Ok(Self {
            config: host.clone(),
            channel,
            store,
            sandbox,
            registry,
            policy,
            ingestion,
            dispatcher,
        })
    }

    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<PermissionPolicy> {
        &self.policy
    }

    pub fn ingestion(&self) -> &Arc<IngestionEngine> {
        &self.ingestion
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn sandbox(&self) -> &Arc<ScriptSandbox> {
        &self.sandbox
    }

    pub(crate) fn marker(&self) -> &str {
        &self.config.command_marker
    }

    pub(crate) fn finish_word(&self) -> &str {
        self.config
            .finish_words
            .first()
            .map(String::as_str)
            .unwrap_or("done")
    }

    /// Process one inbound event to completion. Never fails; problems are
    /// reported to the chat or logged.
    pub async fn handle_event(&self, event: InboundEvent) {
        match &event {
            InboundEvent::Text { chat, sender, text } => {
                if let Some(command) = ManagementCommand::parse(text, self.marker()) {
                    debug!(chat_id = %chat.id, user_id = %sender.id, ?command, "management command");
                    if let Err(e) = self.run_management(*chat, sender, command).await {
                        self.report(chat.id, &e).await;
                    }
                    return;
                }

                let is_command = text.trim_start().starts_with(self.marker());
                if !is_command && self.ingestion.has_session(sender.id) {
                    let outcome = self.ingestion.handle_text(sender, text).await;
                    if !matches!(outcome, IngestionOutcome::NotConsumed) {
                        self.render_outcome(chat.id, outcome).await;
                        return;
                    }
                }

                self.dispatcher.run_triggers(&event).await;
                if is_command {
                    self.dispatcher.dispatch_command(&event).await;
                }
            }
            InboundEvent::Document {
                chat,
                sender,
                filename,
                bytes,
            } => {
                if !self.ingestion.has_session(sender.id)
                    || !self.ingestion.accepts_document(filename)
                {
                    debug!(chat_id = %chat.id, user_id = %sender.id, filename, "document ignored");
                    return;
                }
                let outcome = self
                    .ingestion
                    .handle_document(sender, filename, bytes)
                    .await;
                self.render_outcome(chat.id, outcome).await;
            }
            InboundEvent::Callback { .. } => {
                self.dispatcher.dispatch_callback(&event).await;
            }
        }
    }

    async fn render_outcome(&self, chat_id: ChatId, outcome: IngestionOutcome) {
        let text = match outcome {
            IngestionOutcome::NotConsumed => return,
            IngestionOutcome::ChunkAccepted {
                command,
                buffered_chars,
                ..
            } => {
                let mut text = HostText::from("Code received");
                if let Some(command) = command {
                    text = text.literal(" for ").user(&command);
                }
                text.literal(&format!(
                    " ({buffered_chars} characters so far). Send more, or \"{}\" to save.",
                    self.finish_word()
                ))
            }
            IngestionOutcome::AwaitingMore => HostText::from("Send the next part of the code."),
            IngestionOutcome::Committed { kind, script } => match kind {
                SessionKind::Add => HostText::from("Script ")
                    .user(&script.command)
                    .literal(" saved.\nDescription: ")
                    .user(&script.description),
                SessionKind::Edit => HostText::from("Script ")
                    .user(&script.command)
                    .literal(" updated."),
            },
            IngestionOutcome::Rejected { error, .. } => {
                HostText::from("The script was not saved: ").user(&error.user_message())
            }
        };
        self.reply(chat_id, text).await.unwrap_or_else(|e| {
            warn!(chat_id = %chat_id, error = %e, "failed to send ingestion reply");
        });
    }

    pub(crate) async fn reply(
        &self,
        chat_id: ChatId,
        text: impl Into<HostText>,
    ) -> Result<(), ChatletError> {
        send_host_text(self.channel.as_ref(), chat_id, &text.into())
            .await
            .map(drop)
    }

    async fn report(&self, chat_id: ChatId, error: &ChatletError) {
        match error {
            ChatletError::Validation(_)
            | ChatletError::PermissionDenied(_)
            | ChatletError::NotFound(_) => debug!(chat_id = %chat_id, error = %error, "command refused"),
            _ => warn!(chat_id = %chat_id, error = %error, "management command failed"),
        }
        let text = HostText::default().user(&error.user_message());
        if let Err(e) = self.reply(chat_id, text).await {
            warn!(chat_id = %chat_id, error = %e, "failed to report error");
        }
    }

    /// Release the runtime and close the store.
    pub async fn shutdown(&self) -> Result<(), ChatletError> {
        info!(
            sessions = self.ingestion.active_sessions(),
            "extension host shutting down"
        );
        self.sandbox.shutdown().await?;
        self.store.close().await
    }
}
