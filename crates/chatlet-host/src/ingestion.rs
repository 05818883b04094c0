// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-turn script ingestion.
//!
//! A user opens a session with an add or edit intent, sends the script in one
//! or more chunks, and ends with a finish word. A document upload commits in one
//! shot. Each user has at most one session; opening a new one replaces the old.
//!
//! ```text
//! NONE -> AwaitingFirstChunk -> AwaitingMore -> commit | reject | cancel -> NONE
//! ```

use std::sync::Arc;

use chatlet_config::model::{HostConfig, SandboxConfig};
use chatlet_core::{
    ChatId, ChatletError, Script, Sender, StorageAdapter, UserId, UserRecord,
    DEFAULT_DESCRIPTION,
};
use chatlet_sandbox::capabilities;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::header::parse_script_text;
use crate::now_timestamp;
use crate::registry::ScriptRegistry;
use crate::vocabulary::{Sentinel, Vocabulary};

/// Progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingFirstChunk,
    AwaitingMore,
}

/// Whether a session creates a script or replaces an existing one's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Add,
    Edit,
}

/// Transient per-user ingestion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSession {
    Pending {
        chat_id: ChatId,
        command: Option<String>,
        description: Option<String>,
        code_buffer: String,
        stage: Stage,
    },
    Editing {
        chat_id: ChatId,
        command: String,
        new_description: Option<String>,
        code_buffer: String,
        stage: Stage,
    },
}

impl UploadSession {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Pending { .. } => SessionKind::Add,
            Self::Editing { .. } => SessionKind::Edit,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Pending { chat_id, .. } | Self::Editing { chat_id, .. } => *chat_id,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Pending { stage, .. } | Self::Editing { stage, .. } => *stage,
        }
    }

    pub fn code_buffer(&self) -> &str {
        match self {
            Self::Pending { code_buffer, .. } | Self::Editing { code_buffer, .. } => code_buffer,
        }
    }

    /// Fold one text chunk into the session.
    ///
    /// The first chunk is parsed for directives; later chunks are appended raw.
    fn accept_chunk(&mut self, text: &str, marker: &str) {
        match self {
            Self::Pending {
                command,
                description,
                code_buffer,
                stage,
                ..
            } => {
                if *stage == Stage::AwaitingFirstChunk {
                    let header = parse_script_text(text, marker);
                    if header.command.is_some() {
                        *command = header.command.clone();
                    }
                    if header.description.is_some() {
                        *description = header.description.clone();
                    }
                    *code_buffer = header.code_or(text).to_string();
                    *stage = Stage::AwaitingMore;
                } else {
                    code_buffer.push('\n');
                    code_buffer.push_str(text);
                }
            }
            Self::Editing {
                new_description,
                code_buffer,
                stage,
                ..
            } => {
                if *stage == Stage::AwaitingFirstChunk {
                    let header = parse_script_text(text, marker);
                    if header.description.is_some() {
                        *new_description = header.description.clone();
                    }
                    *code_buffer = header.code_or(text).to_string();
                    *stage = Stage::AwaitingMore;
                } else {
                    code_buffer.push('\n');
                    code_buffer.push_str(text);
                }
            }
        }
    }

    fn command(&self) -> Option<&str> {
        match self {
            Self::Pending { command, .. } => command.as_deref(),
            Self::Editing { command, .. } => Some(command),
        }
    }
}

/// Result of feeding an event to the ingestion engine.
#[derive(Debug)]
pub enum IngestionOutcome {
    /// The sender has no session, or the event is not ingestible.
    NotConsumed,
    /// A chunk was buffered.
    ChunkAccepted {
        kind: SessionKind,
        command: Option<String>,
        buffered_chars: usize,
    },
    /// A continue word; the buffer is unchanged.
    AwaitingMore,
    /// The script was persisted.
    Committed {
        kind: SessionKind,
        script: Arc<Script>,
    },
    /// The submission was refused and the session destroyed.
    Rejected {
        kind: SessionKind,
        error: ChatletError,
    },
}

/// Drives upload sessions and commits finished scripts through the registry.
pub struct IngestionEngine {
    sessions: DashMap<UserId, UploadSession>,
    registry: Arc<ScriptRegistry>,
    store: Arc<dyn StorageAdapter + Send + Sync>,
    vocabulary: Vocabulary,
    marker: String,
    extensions: Vec<String>,
    sandbox: SandboxConfig,
}

impl IngestionEngine {
    pub fn new(
        registry: Arc<ScriptRegistry>,
        store: Arc<dyn StorageAdapter + Send + Sync>,
        host: &HostConfig,
        sandbox: &SandboxConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            registry,
            store,
            vocabulary: Vocabulary::from_config(host),
            marker: host.command_marker.clone(),
            extensions: host
                .document_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            sandbox: sandbox.clone(),
        }
    }

    /// Open an add session for `user_id`, replacing any existing one.
    pub fn begin_add(&self, user_id: UserId, chat_id: ChatId) {
        let replaced = self.sessions.insert(
            user_id,
            UploadSession::Pending {
                chat_id,
                command: None,
                description: None,
                code_buffer: String::new(),
                stage: Stage::AwaitingFirstChunk,
            },
        );
        debug!(user_id = %user_id, chat_id = %chat_id, replaced = replaced.is_some(), "add session opened");
    }

    /// Open an edit session for an existing script and return its current version.
    pub async fn begin_edit(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        command: &str,
    ) -> Result<Arc<Script>, ChatletError> {
        let script = self
            .registry
            .get(chat_id, command)
            .await
            .ok_or_else(|| ChatletError::NotFound(format!("script {command} not found")))?;
        self.sessions.insert(
            user_id,
            UploadSession::Editing {
                chat_id,
                command: script.command.clone(),
                new_description: None,
                code_buffer: String::new(),
                stage: Stage::AwaitingFirstChunk,
            },
        );
        debug!(user_id = %user_id, chat_id = %chat_id, command, "edit session opened");
        Ok(script)
    }

    /// Destroy the user's session. Returns whether one existed.
    pub fn cancel(&self, user_id: UserId) -> bool {
        self.sessions.remove(&user_id).is_some()
    }

    pub fn has_session(&self, user_id: UserId) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Snapshot of a user's session.
    pub fn session(&self, user_id: UserId) -> Option<UploadSession> {
        self.sessions.get(&user_id).map(|s| s.value().clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether `filename` has an accepted script extension.
    pub fn accepts_document(&self, filename: &str) -> bool {
        let lowered = filename.to_lowercase();
        self.extensions.iter().any(|ext| lowered.ends_with(ext.as_str()))
    }

    /// Feed a text message from `sender`.
    pub async fn handle_text(&self, sender: &Sender, text: &str) -> IngestionOutcome {
        match self.vocabulary.classify(text) {
            Some(Sentinel::Finish) => {
                let Some((_, session)) = self.sessions.remove(&sender.id) else {
                    return IngestionOutcome::NotConsumed;
                };
                self.finalize(sender, session).await
            }
            Some(Sentinel::Continue) => {
                if self.has_session(sender.id) {
                    IngestionOutcome::AwaitingMore
                } else {
                    IngestionOutcome::NotConsumed
                }
            }
            None => {
                let Some(mut session) = self.sessions.get_mut(&sender.id) else {
                    return IngestionOutcome::NotConsumed;
                };
                session.accept_chunk(text, &self.marker);
                IngestionOutcome::ChunkAccepted {
                    kind: session.kind(),
                    command: session.command().map(str::to_string),
                    buffered_chars: session.code_buffer().chars().count(),
                }
            }
        }
    }

    /// Feed an uploaded document from `sender`. Commits immediately.
    pub async fn handle_document(
        &self,
        sender: &Sender,
        filename: &str,
        bytes: &[u8],
    ) -> IngestionOutcome {
        if !self.accepts_document(filename) {
            return IngestionOutcome::NotConsumed;
        }
        let Some((_, session)) = self.sessions.remove(&sender.id) else {
            return IngestionOutcome::NotConsumed;
        };

        let body = match std::str::from_utf8(bytes) {
            Ok(body) => body,
            Err(_) => {
                return IngestionOutcome::Rejected {
                    kind: session.kind(),
                    error: ChatletError::Validation(format!("{filename} is not valid UTF-8 text")),
                };
            }
        };
        let header = parse_script_text(body, &self.marker);
        let code = header.code_or(body).to_string();

        let session = match session {
            UploadSession::Pending {
                chat_id,
                command,
                description,
                ..
            } => UploadSession::Pending {
                chat_id,
                command: header.command.clone().or(command),
                description: header.description.clone().or(description),
                code_buffer: code,
                stage: Stage::AwaitingMore,
            },
            UploadSession::Editing {
                chat_id,
                command,
                new_description,
                ..
            } => UploadSession::Editing {
                chat_id,
                command,
                new_description: header.description.clone().or(new_description),
                code_buffer: code,
                stage: Stage::AwaitingMore,
            },
        };
        debug!(user_id = %sender.id, filename, "document ingested");
        self.finalize(sender, session).await
    }

    async fn finalize(&self, sender: &Sender, session: UploadSession) -> IngestionOutcome {
        let kind = session.kind();
        let result = match session {
            UploadSession::Pending {
                chat_id,
                command,
                description,
                code_buffer,
                ..
            } => self.commit_add(sender, chat_id, command, description, code_buffer).await,
            UploadSession::Editing {
                chat_id,
                command,
                new_description,
                code_buffer,
                ..
            } => self.commit_edit(chat_id, &command, new_description, code_buffer).await,
        };
        match result {
            Ok(script) => IngestionOutcome::Committed { kind, script },
            Err(error) => {
                debug!(user_id = %sender.id, error = %error, "submission rejected");
                IngestionOutcome::Rejected { kind, error }
            }
        }
    }

    async fn commit_add(
        &self,
        sender: &Sender,
        chat_id: ChatId,
        command: Option<String>,
        description: Option<String>,
        code: String,
    ) -> Result<Arc<Script>, ChatletError> {
        let command = command.ok_or_else(|| {
            ChatletError::Validation(
                "no command given; start the script with ###COMMAND: <name>".into(),
            )
        })?;
        let caps = self.require_entry_point(&code)?;

        let now = now_timestamp();
        let script = Script {
            chat_id,
            command,
            description: description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            code,
            author: sender.display_name(),
            author_id: sender.id,
            capabilities: caps,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let stored = self.registry.put(script).await?;

        let user = UserRecord {
            user_id: sender.id,
            username: sender.username.clone(),
            first_name: sender.first_name.clone(),
            created_at: now,
        };
        if let Err(e) = self.store.upsert_user(&user).await {
            warn!(user_id = %sender.id, error = %e, "failed to record script author");
        }

        info!(
            chat_id = %stored.chat_id,
            command = %stored.command,
            author = %stored.author,
            "script added"
        );
        Ok(stored)
    }

    async fn commit_edit(
        &self,
        chat_id: ChatId,
        command: &str,
        new_description: Option<String>,
        code: String,
    ) -> Result<Arc<Script>, ChatletError> {
        if code.trim().is_empty() {
            return Err(ChatletError::Validation("the new code is empty".into()));
        }
        let caps = self.require_entry_point(&code)?;
        let existing = self.registry.get(chat_id, command).await.ok_or_else(|| {
            ChatletError::NotFound(format!("script {command} was deleted during the edit"))
        })?;

        let script = Script {
            description: new_description.unwrap_or_else(|| existing.description.clone()),
            code,
            capabilities: caps,
            updated_at: now_timestamp(),
            ..(*existing).clone()
        };
        let stored = self.registry.put(script).await?;
        info!(chat_id = %stored.chat_id, command = %stored.command, "script edited");
        Ok(stored)
    }

    fn require_entry_point(
        &self,
        code: &str,
    ) -> Result<chatlet_core::ScriptCapabilities, ChatletError> {
        let caps = capabilities::detect(code, &self.sandbox);
        if caps.has_execute {
            Ok(caps)
        } else {
            Err(ChatletError::Validation(format!(
                "the script does not define {}()",
                self.sandbox.entry_point
            )))
        }
    }
}
