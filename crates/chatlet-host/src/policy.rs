// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat permission policy for registry mutations.
//!
//! Private chats and the super-operator always pass. Otherwise the chat's
//! settings decide; they are created on first use from the transport's
//! administrator roster.

use std::collections::BTreeSet;
use std::sync::Arc;

use chatlet_core::{
    AccessMode, ChannelAdapter, ChatId, ChatKind, ChatSettings, ChatletError, StorageAdapter,
    UserId,
};
use tracing::{info, warn};

use crate::now_timestamp;

/// Evaluates and edits per-chat access rules.
pub struct PermissionPolicy {
    store: Arc<dyn StorageAdapter + Send + Sync>,
    channel: Arc<dyn ChannelAdapter + Send + Sync>,
    super_operator: Option<UserId>,
    default_mode: AccessMode,
}

impl PermissionPolicy {
    pub fn new(
        store: Arc<dyn StorageAdapter + Send + Sync>,
        channel: Arc<dyn ChannelAdapter + Send + Sync>,
        super_operator: Option<UserId>,
        default_mode: AccessMode,
    ) -> Self {
        Self {
            store,
            channel,
            super_operator,
            default_mode,
        }
    }

    fn bypasses(&self, user_id: UserId, kind: ChatKind) -> bool {
        kind == ChatKind::Private || self.super_operator == Some(user_id)
    }

    /// Whether `user_id` may add, edit, or delete scripts in `chat_id`.
    pub async fn can_mutate(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
    ) -> Result<bool, ChatletError> {
        if self.bypasses(user_id, kind) {
            return Ok(true);
        }
        let settings = self.settings(chat_id, user_id).await?;
        if settings.creator_id == user_id {
            return Ok(true);
        }
        Ok(match settings.access_mode {
            AccessMode::CreatorOnly => false,
            AccessMode::AdminsOnly => self.is_live_admin(chat_id, user_id).await,
            AccessMode::AllowList => settings.allowed_users.contains(&user_id),
            AccessMode::Everyone => true,
        })
    }

    /// Whether `user_id` owns the chat's settings.
    pub async fn is_creator(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
    ) -> Result<bool, ChatletError> {
        if self.bypasses(user_id, kind) {
            return Ok(true);
        }
        let settings = self.settings(chat_id, user_id).await?;
        if settings.creator_id == user_id {
            return Ok(true);
        }
        Ok(match self.channel.get_administrators(chat_id).await {
            Ok(admins) => admins
                .iter()
                .any(|a| a.is_creator && a.user_id == user_id),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "administrator lookup failed");
                false
            }
        })
    }

    /// Settings of a chat, created and persisted on first access.
    ///
    /// The creator is the roster entry flagged as creator. When the roster is
    /// unavailable or names no creator, `acting_user` becomes the creator.
    pub async fn settings(
        &self,
        chat_id: ChatId,
        acting_user: UserId,
    ) -> Result<ChatSettings, ChatletError> {
        if let Some(settings) = self.store.get_settings(chat_id).await? {
            return Ok(settings);
        }

        let creator = match self.channel.get_administrators(chat_id).await {
            Ok(admins) => admins.iter().find(|a| a.is_creator).map(|a| a.user_id),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "administrator lookup failed");
                None
            }
        };
        let creator_id = creator.unwrap_or(acting_user);
        let now = now_timestamp();
        let settings = ChatSettings {
            chat_id,
            creator_id,
            access_mode: self.default_mode,
            allowed_users: BTreeSet::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_settings(&settings).await?;
        info!(
            chat_id = %chat_id,
            creator_id = %creator_id,
            mode = %settings.access_mode,
            "chat settings initialized"
        );
        Ok(settings)
    }

    pub async fn set_access_mode(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
        mode: AccessMode,
    ) -> Result<ChatSettings, ChatletError> {
        self.update(chat_id, user_id, kind, |settings| {
            settings.access_mode = mode;
        })
        .await
    }

    pub async fn allow_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
        target: UserId,
    ) -> Result<ChatSettings, ChatletError> {
        self.update(chat_id, user_id, kind, |settings| {
            settings.allowed_users.insert(target);
        })
        .await
    }

    pub async fn deny_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
        target: UserId,
    ) -> Result<ChatSettings, ChatletError> {
        self.update(chat_id, user_id, kind, |settings| {
            settings.allowed_users.remove(&target);
        })
        .await
    }

    async fn update(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        kind: ChatKind,
        change: impl FnOnce(&mut ChatSettings),
    ) -> Result<ChatSettings, ChatletError> {
        if !self.is_creator(chat_id, user_id, kind).await? {
            return Err(ChatletError::PermissionDenied(
                "only the chat creator can change script access settings".into(),
            ));
        }
        let mut settings = self.settings(chat_id, user_id).await?;
        change(&mut settings);
        settings.updated_at = now_timestamp();
        self.store.put_settings(&settings).await?;
        info!(
            chat_id = %chat_id,
            user_id = %user_id,
            mode = %settings.access_mode,
            allowed = settings.allowed_users.len(),
            "chat settings updated"
        );
        Ok(settings)
    }

    async fn is_live_admin(&self, chat_id: ChatId, user_id: UserId) -> bool {
        match self.channel.get_administrators(chat_id).await {
            Ok(admins) => admins.iter().any(|a| a.user_id == user_id),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "administrator lookup failed, denying");
                false
            }
        }
    }
}
