// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory script registry kept coherent with the store.
//!
//! Mutations write the store first and the cache second, so a failed write
//! never leaves the cache ahead of durable state. After [`ScriptRegistry::warm`]
//! every read is served from memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chatlet_core::{ChatId, ChatletError, Script, ScriptSummary, StorageAdapter};
use chatlet_sandbox::ScriptSandbox;
use tokio::sync::RwLock;
use tracing::{debug, info};

type ChatScripts = BTreeMap<String, Arc<Script>>;

/// Read-through cache `chat -> command -> script`.
pub struct ScriptRegistry {
    store: Arc<dyn StorageAdapter + Send + Sync>,
    cache: RwLock<HashMap<ChatId, ChatScripts>>,
    compiled: Option<Arc<ScriptSandbox>>,
}

impl ScriptRegistry {
    pub fn new(store: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            compiled: None,
        }
    }

    /// Also drop compiled versions from `sandbox` whenever a script changes.
    pub fn with_compile_cache(mut self, sandbox: Arc<ScriptSandbox>) -> Self {
        self.compiled = Some(sandbox);
        self
    }

    /// Rebuild the cache from the store. Returns the number of scripts loaded.
    pub async fn warm(&self) -> Result<usize, ChatletError> {
        let scripts = self.store.list_all_scripts().await?;
        let count = scripts.len();
        let mut rebuilt: HashMap<ChatId, ChatScripts> = HashMap::new();
        for script in scripts {
            rebuilt
                .entry(script.chat_id)
                .or_default()
                .insert(script.command.clone(), Arc::new(script));
        }
        let chats = rebuilt.len();
        *self.cache.write().await = rebuilt;
        info!(scripts = count, chats, "script registry warmed");
        Ok(count)
    }

    pub async fn get(&self, chat_id: ChatId, command: &str) -> Option<Arc<Script>> {
        self.cache
            .read()
            .await
            .get(&chat_id)
            .and_then(|scripts| scripts.get(command))
            .cloned()
    }

    pub async fn contains(&self, chat_id: ChatId, command: &str) -> bool {
        self.get(chat_id, command).await.is_some()
    }

    /// Snapshot of a chat's scripts in ascending command order.
    pub async fn scripts_in_chat(&self, chat_id: ChatId) -> Vec<Arc<Script>> {
        self.cache
            .read()
            .await
            .get(&chat_id)
            .map(|scripts| scripts.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Listing rows for a chat, in command order.
    pub async fn list(&self, chat_id: ChatId) -> Vec<ScriptSummary> {
        self.scripts_in_chat(chat_id)
            .await
            .iter()
            .map(|s| ScriptSummary {
                command: s.command.clone(),
                description: s.description.clone(),
                author: s.author.clone(),
            })
            .collect()
    }

    /// Persist a script and cache the stored row.
    ///
    /// The returned script is the row as stored, so an upsert over an existing
    /// key carries the original `created_at` and author.
    pub async fn put(&self, script: Script) -> Result<Arc<Script>, ChatletError> {
        self.store.put_script(&script).await?;
        let stored = self
            .store
            .get_script(script.chat_id, &script.command)
            .await?
            .ok_or_else(|| {
                ChatletError::Internal(format!("script {} vanished after write", script.command))
            })?;
        let stored = Arc::new(stored);

        self.cache
            .write()
            .await
            .entry(stored.chat_id)
            .or_default()
            .insert(stored.command.clone(), Arc::clone(&stored));
        self.invalidate_compiled(stored.chat_id, &stored.command);
        debug!(chat_id = %stored.chat_id, command = %stored.command, "script registered");
        Ok(stored)
    }

    /// Remove a script. Returns whether it existed in the store.
    pub async fn delete(&self, chat_id: ChatId, command: &str) -> Result<bool, ChatletError> {
        let removed = self.store.delete_script(chat_id, command).await?;

        let mut cache = self.cache.write().await;
        if let Some(scripts) = cache.get_mut(&chat_id) {
            scripts.remove(command);
            if scripts.is_empty() {
                cache.remove(&chat_id);
            }
        }
        drop(cache);

        self.invalidate_compiled(chat_id, command);
        debug!(chat_id = %chat_id, command, removed, "script deleted");
        Ok(removed)
    }

    /// Number of chats with at least one script.
    pub async fn chat_count(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn script_count(&self) -> usize {
        self.cache.read().await.values().map(BTreeMap::len).sum()
    }

    fn invalidate_compiled(&self, chat_id: ChatId, command: &str) {
        if let Some(sandbox) = &self.compiled {
            sandbox.invalidate(chat_id, command);
        }
    }
}
