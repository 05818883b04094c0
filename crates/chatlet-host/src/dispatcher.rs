// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes events into scripts and delivers what they produce.
//!
//! Three paths share one runtime:
//!
//! - **command**: a text starting with the marker runs that script's `execute`.
//!   Every attempt is audited; failures are reported in the chat.
//! - **trigger**: every plain text runs each trigger-capable script in the chat,
//!   in command order. A failing script never stops the others.
//! - **callback**: a button press is offered to each script with a callback
//!   handler until one returns a truthy value.

use std::sync::Arc;

use chatlet_core::{
    ChannelAdapter, ChatId, ChatletError, ExecutionKind, FormatMode, InboundEvent,
    OutboundDocument, Script,
};
use chatlet_sandbox::{EntryPoint, Invocation, InvocationResult, ScriptAction, ScriptSandbox};
use tracing::{debug, info, warn};

use crate::audit::{truncate_message, AuditSink};
use crate::format::{send_formatted, send_with_mode};
use crate::header::split_command;
use crate::registry::ScriptRegistry;

/// Result of the command path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No script is registered under the command; the event falls through.
    Declined,
    Executed { command: String, success: bool },
}

/// Result of the callback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A handler returned truthy.
    Claimed { command: String },
    /// No handler claimed the press.
    Unclaimed { handlers_run: usize },
}

pub struct Dispatcher {
    registry: Arc<ScriptRegistry>,
    sandbox: Arc<ScriptSandbox>,
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    audit: Arc<AuditSink>,
    marker: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ScriptRegistry>,
        sandbox: Arc<ScriptSandbox>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        audit: Arc<AuditSink>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sandbox,
            channel,
            audit,
            marker: marker.into(),
        }
    }

    /// Run the script named by a command message.
    pub async fn dispatch_command(&self, event: &InboundEvent) -> DispatchOutcome {
        let InboundEvent::Text { chat, sender, text } = event else {
            return DispatchOutcome::Declined;
        };
        let Some((command, args)) = split_command(text, &self.marker) else {
            return DispatchOutcome::Declined;
        };
        let Some(script) = self.registry.get(chat.id, &command).await else {
            debug!(chat_id = %chat.id, command, "no script for command");
            return DispatchOutcome::Declined;
        };

        let entry = EntryPoint::Execute {
            args: args.into_iter().map(str::to_string).collect(),
        };
        match self.invoke(&script, event, entry).await {
            Ok(result) => {
                self.deliver(chat.id, None, &result).await;
                if let Some(output) = result.output.as_deref() {
                    if let Err(e) = send_formatted(self.channel.as_ref(), chat.id, output, None).await
                    {
                        warn!(chat_id = %chat.id, command, error = %e, "failed to deliver script output");
                    }
                }
                self.audit
                    .record_success(chat.id, sender.id, &command, ExecutionKind::Command)
                    .await;
                info!(chat_id = %chat.id, user_id = %sender.id, command, "script executed");
                DispatchOutcome::Executed {
                    command,
                    success: true,
                }
            }
            Err(e) => {
                let message = e.user_message();
                warn!(chat_id = %chat.id, command, error = %e, "script execution failed");
                let reply = format!(
                    "Script {command} failed:\n{}",
                    truncate_message(&message, self.audit.error_limit())
                );
                if let Err(send_err) = send_with_mode(
                    self.channel.as_ref(),
                    chat.id,
                    &reply,
                    FormatMode::Plain,
                    None,
                )
                .await
                {
                    warn!(chat_id = %chat.id, error = %send_err, "failed to report script error");
                }
                self.audit
                    .record_failure(chat.id, sender.id, &command, ExecutionKind::Command, &message)
                    .await;
                DispatchOutcome::Executed {
                    command,
                    success: false,
                }
            }
        }
    }

    /// Run every trigger-capable script in the chat against a text message.
    ///
    /// Returns how many scripts ran without error.
    pub async fn run_triggers(&self, event: &InboundEvent) -> usize {
        let InboundEvent::Text { chat, sender, .. } = event else {
            return 0;
        };
        let mut succeeded = 0;
        for script in self.registry.scripts_in_chat(chat.id).await {
            if !script.capabilities.has_trigger {
                continue;
            }
            match self.invoke(&script, event, EntryPoint::Trigger).await {
                Ok(result) => {
                    self.deliver(chat.id, None, &result).await;
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(chat_id = %chat.id, command = %script.command, error = %e, "trigger failed");
                    self.audit
                        .record_failure(
                            chat.id,
                            sender.id,
                            &script.command,
                            ExecutionKind::Trigger,
                            &e.user_message(),
                        )
                        .await;
                }
            }
        }
        succeeded
    }

    /// Offer a button press to the chat's callback handlers.
    ///
    /// An unclaimed press gets a default acknowledgement with no text unless a
    /// handler already answered it through `ctx:answer`.
    pub async fn dispatch_callback(&self, event: &InboundEvent) -> CallbackOutcome {
        let InboundEvent::Callback {
            chat,
            sender,
            query_id,
            payload,
        } = event
        else {
            return CallbackOutcome::Unclaimed { handlers_run: 0 };
        };

        let mut answered = false;
        let mut handlers_run = 0;
        let mut claimed = None;
        for script in self.registry.scripts_in_chat(chat.id).await {
            let Some(handler) = script.capabilities.callback.clone() else {
                continue;
            };
            handlers_run += 1;
            let entry = EntryPoint::Callback {
                handler,
                payload: payload.clone(),
            };
            match self.invoke(&script, event, entry).await {
                Ok(result) => {
                    answered |= result.answered();
                    self.deliver(chat.id, Some(query_id), &result).await;
                    if result.truthy {
                        claimed = Some(script.command.clone());
                        break;
                    }
                }
                Err(e) => {
                    warn!(chat_id = %chat.id, command = %script.command, error = %e, "callback handler failed");
                    self.audit
                        .record_failure(
                            chat.id,
                            sender.id,
                            &script.command,
                            ExecutionKind::Callback,
                            &e.user_message(),
                        )
                        .await;
                }
            }
        }

        if !answered && claimed.is_none() {
            if let Err(e) = self.channel.acknowledge_callback(query_id, None).await {
                warn!(chat_id = %chat.id, error = %e, "failed to acknowledge callback");
            }
        }
        match claimed {
            Some(command) => {
                debug!(chat_id = %chat.id, command, "callback claimed");
                CallbackOutcome::Claimed { command }
            }
            None => CallbackOutcome::Unclaimed { handlers_run },
        }
    }

    async fn invoke(
        &self,
        script: &Arc<Script>,
        event: &InboundEvent,
        entry: EntryPoint,
    ) -> Result<InvocationResult, ChatletError> {
        self.sandbox
            .invoke(Invocation {
                script: Arc::clone(script),
                event: event.clone(),
                entry,
            })
            .await
    }

    /// Perform the side effects a script queued on `ctx`, in order.
    async fn deliver(&self, chat_id: ChatId, query_id: Option<&str>, result: &InvocationResult) {
        for action in &result.actions {
            let delivered = match action {
                ScriptAction::Reply {
                    text,
                    format,
                    keyboard,
                } => match format {
                    Some(mode) => {
                        send_with_mode(self.channel.as_ref(), chat_id, text, *mode, keyboard.as_ref())
                            .await
                            .map(drop)
                    }
                    None => send_formatted(self.channel.as_ref(), chat_id, text, keyboard.as_ref())
                        .await
                        .map(drop),
                },
                ScriptAction::Document {
                    filename,
                    bytes,
                    caption,
                } => self
                    .channel
                    .send_document(OutboundDocument {
                        chat_id,
                        bytes: bytes.clone(),
                        filename: filename.clone(),
                        caption: caption.clone(),
                    })
                    .await
                    .map(drop),
                ScriptAction::Answer { text } => match query_id {
                    Some(query_id) => {
                        self.channel
                            .acknowledge_callback(query_id, text.as_deref())
                            .await
                    }
                    None => Ok(()),
                },
            };
            if let Err(e) = delivered {
                warn!(chat_id = %chat_id, error = %e, "failed to deliver script action");
            }
        }
    }
}
