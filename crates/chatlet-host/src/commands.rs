// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in management commands.
//!
//! These are matched before ingestion and dispatch, so a script can never
//! shadow them and they never end up in an upload buffer.

use std::str::FromStr;

use chatlet_core::{
    AccessMode, ChatKind, ChatRef, ChatSettings, ChatletError, OutboundDocument, Script, Sender,
    UserId,
};
use tracing::info;

use crate::audit::truncate_message;
use crate::format::HostText;
use crate::header::{normalize_command, split_command};
use crate::host::ExtensionHost;

/// A parsed management command. Script-name arguments are already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCommand {
    Start,
    Help,
    AddScript,
    ListScripts,
    ViewScript(Option<String>),
    EditScript(Option<String>),
    DeleteScript(Option<String>),
    Cancel,
    ScriptAccess(Option<String>),
    ScriptAllow(Option<String>),
    ScriptDeny(Option<String>),
}

impl ManagementCommand {
    /// Recognize a management command, ignoring any `@botname` suffix.
    pub fn parse(text: &str, marker: &str) -> Option<Self> {
        let (command, args) = split_command(text, marker)?;
        let name = command.strip_prefix(marker)?;
        let script_arg = || args.first().map(|a| normalize_command(a, marker));
        let raw_arg = || args.first().map(|a| a.to_string());
        Some(match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "addscript" => Self::AddScript,
            "listscripts" => Self::ListScripts,
            "viewscript" => Self::ViewScript(script_arg()),
            "editscript" => Self::EditScript(script_arg()),
            "deletescript" => Self::DeleteScript(script_arg()),
            "cancel" => Self::Cancel,
            "scriptaccess" => Self::ScriptAccess(raw_arg()),
            "scriptallow" => Self::ScriptAllow(raw_arg()),
            "scriptdeny" => Self::ScriptDeny(raw_arg()),
            _ => return None,
        })
    }
}

/// Parse the short access-mode names accepted by `/scriptaccess`.
pub fn parse_access_mode(raw: &str) -> Option<AccessMode> {
    match raw.trim().to_lowercase().as_str() {
        "creator" => Some(AccessMode::CreatorOnly),
        "admins" => Some(AccessMode::AdminsOnly),
        "allowlist" => Some(AccessMode::AllowList),
        "everyone" => Some(AccessMode::Everyone),
        other => AccessMode::from_str(other).ok(),
    }
}

fn required(arg: Option<String>, usage: &str) -> Result<String, ChatletError> {
    arg.ok_or_else(|| ChatletError::Validation(format!("usage: {usage}")))
}

fn parse_user_id(arg: Option<String>, usage: &str) -> Result<UserId, ChatletError> {
    let raw = required(arg, usage)?;
    raw.parse::<i64>()
        .map(UserId)
        .map_err(|_| ChatletError::Validation(format!("`{raw}` is not a numeric user id")))
}

impl ExtensionHost {
    pub(crate) async fn run_management(
        &self,
        chat: ChatRef,
        sender: &Sender,
        command: ManagementCommand,
    ) -> Result<(), ChatletError> {
        let m = self.marker();
        match command {
            ManagementCommand::Start => self.reply(chat.id, self.greeting()).await,
            ManagementCommand::Help => self.reply(chat.id, self.help_text()).await,
            ManagementCommand::AddScript => {
                self.require_mutate(chat, sender).await?;
                self.ingestion.begin_add(sender.id, chat.id);
                let text = format!(
                    "Send the script in this format:\n\n```\n###COMMAND: mycommand\n###DESCRIPTION: What it does\n###CODE:\nfunction execute(event, ctx, args)\n  return \"hello\"\nend\n```\n\nLong code can be sent in several messages. Finish with \"{}\", or upload a .txt file. {m}cancel aborts.",
                    self.finish_word()
                );
                self.reply(chat.id, text).await
            }
            ManagementCommand::ListScripts => {
                let scripts = self.registry.list(chat.id).await;
                if scripts.is_empty() {
                    let text = format!("No scripts in this chat yet. Add one with {m}addscript.");
                    return self.reply(chat.id, text).await;
                }
                let mut text =
                    HostText::from(format!("Scripts in this chat ({}):\n", scripts.len()));
                for s in &scripts {
                    text = text
                        .literal("\n")
                        .user(&s.command)
                        .literal(" - ")
                        .user(&s.description)
                        .literal(" (")
                        .user(&s.author)
                        .literal(")");
                }
                self.reply(chat.id, text).await
            }
            ManagementCommand::ViewScript(arg) => {
                let name = required(arg, &format!("{m}viewscript <command>"))?;
                let script = self.script_or_not_found(chat, &name).await?;
                self.show_script(&script).await
            }
            ManagementCommand::EditScript(arg) => {
                let name = required(arg, &format!("{m}editscript <command>"))?;
                self.require_mutate(chat, sender).await?;
                let script = self.ingestion.begin_edit(sender.id, chat.id, &name).await?;
                let preview = truncate_message(&script.code, self.config.edit_preview_limit);
                let text = HostText::from("Editing ")
                    .user(&script.command)
                    .literal("\nDescription: ")
                    .user(&script.description)
                    .literal(&format!(
                        "\n\n```\n{preview}\n```\n\nSend the new code, optionally starting with ###DESCRIPTION: to change the description. Finish with \"{}\".",
                        self.finish_word()
                    ));
                self.reply(chat.id, text).await
            }
            ManagementCommand::DeleteScript(arg) => {
                let name = required(arg, &format!("{m}deletescript <command>"))?;
                self.require_mutate(chat, sender).await?;
                if self.registry.delete(chat.id, &name).await? {
                    info!(chat_id = %chat.id, user_id = %sender.id, command = %name, "script deleted");
                    let text = HostText::from("Script ").user(&name).literal(" deleted.");
                    self.reply(chat.id, text).await
                } else {
                    Err(ChatletError::NotFound(format!("script {name} not found")))
                }
            }
            ManagementCommand::Cancel => {
                let text = if self.ingestion.cancel(sender.id) {
                    "Submission cancelled."
                } else {
                    "Nothing to cancel."
                };
                self.reply(chat.id, text).await
            }
            ManagementCommand::ScriptAccess(arg) => {
                if chat.kind == ChatKind::Private {
                    return self
                        .reply(chat.id, "Access settings only apply to group chats.")
                        .await;
                }
                let settings = match arg {
                    None => self.policy.settings(chat.id, sender.id).await?,
                    Some(raw) => {
                        let mode = parse_access_mode(&raw).ok_or_else(|| {
                            ChatletError::Validation(format!(
                                "unknown access mode `{raw}`; use creator, admins, allowlist or everyone"
                            ))
                        })?;
                        self.policy
                            .set_access_mode(chat.id, sender.id, chat.kind, mode)
                            .await?
                    }
                };
                self.reply(chat.id, describe_settings(&settings)).await
            }
            ManagementCommand::ScriptAllow(arg) => {
                let target = parse_user_id(arg, &format!("{m}scriptallow <user_id>"))?;
                let settings = self
                    .policy
                    .allow_user(chat.id, sender.id, chat.kind, target)
                    .await?;
                self.reply(chat.id, describe_settings(&settings)).await
            }
            ManagementCommand::ScriptDeny(arg) => {
                let target = parse_user_id(arg, &format!("{m}scriptdeny <user_id>"))?;
                let settings = self
                    .policy
                    .deny_user(chat.id, sender.id, chat.kind, target)
                    .await?;
                self.reply(chat.id, describe_settings(&settings)).await
            }
        }
    }

    async fn require_mutate(&self, chat: ChatRef, sender: &Sender) -> Result<(), ChatletError> {
        if self.policy.can_mutate(chat.id, sender.id, chat.kind).await? {
            Ok(())
        } else {
            Err(ChatletError::PermissionDenied(
                "you are not allowed to manage scripts in this chat".into(),
            ))
        }
    }

    async fn script_or_not_found(
        &self,
        chat: ChatRef,
        name: &str,
    ) -> Result<std::sync::Arc<Script>, ChatletError> {
        self.registry
            .get(chat.id, name)
            .await
            .ok_or_else(|| ChatletError::NotFound(format!("script {name} not found")))
    }

    async fn show_script(&self, script: &Script) -> Result<(), ChatletError> {
        let chars = script.code.chars().count();
        let header = HostText::from("Script ")
            .user(&script.command)
            .literal("\nAuthor: ")
            .user(&script.author)
            .literal("\nDescription: ")
            .user(&script.description)
            .literal(&format!(
                "\nCreated: {}\nUpdated: {}\nSize: {chars} characters",
                script.created_at, script.updated_at
            ));
        if chars <= self.config.inline_view_limit {
            let text = header.literal(&format!("\n\n```\n{}\n```", script.code));
            return self.reply(script.chat_id, text).await;
        }

        self.reply(
            script.chat_id,
            header.literal("\n\nThe code is attached as a file."),
        )
        .await?;
        let name = script
            .command
            .strip_prefix(self.marker())
            .unwrap_or(&script.command);
        let body = format!(
            "-- Command: {}\n-- Description: {}\n-- Author: {}\n-- Created: {}\n-- Updated: {}\n\n{}",
            script.command,
            script.description,
            script.author,
            script.created_at,
            script.updated_at,
            script.code
        );
        self.channel
            .send_document(OutboundDocument {
                chat_id: script.chat_id,
                bytes: body.into_bytes(),
                filename: format!("script_{name}.txt"),
                caption: Some(script.command.clone()),
            })
            .await?;
        Ok(())
    }

    fn greeting(&self) -> String {
        let m = self.marker();
        format!(
            "Hi! I run chat scripts written in Lua.\n\n\
             {m}addscript - add a script\n\
             {m}listscripts - list this chat's scripts\n\
             {m}viewscript <command> - show a script\n\
             {m}editscript <command> - change a script\n\
             {m}deletescript <command> - delete a script\n\
             {m}scriptaccess [mode] - who may manage scripts\n\
             {m}cancel - abort a submission\n\
             {m}help - details"
        )
    }

    fn help_text(&self) -> String {
        let m = self.marker();
        format!(
            "Scripts start with a header:\n\
             ###COMMAND: name\n\
             ###DESCRIPTION: text\n\
             ###CODE:\n\
             followed by the code.\n\n\
             Entry points:\n\
             execute(event, ctx, args) - runs on {m}name; required\n\
             `check_triggers(event, ctx)` - runs on every message\n\
             `handle_callback(event, ctx, data)` - runs on button presses; return true to claim it\n\n\
             `ctx:reply(text, opts)`, `ctx:send_document(name, content)`, `ctx:answer(text)`\n\n\
             Send long code in several messages and finish with \"{}\", or upload a .txt file.\n\n\
             Access modes for {m}scriptaccess: creator, admins, allowlist, everyone. \
             {m}scriptallow and {m}scriptdeny edit the allow list.",
            self.finish_word()
        )
    }
}

fn describe_settings(settings: &ChatSettings) -> HostText {
    let allowed = if settings.allowed_users.is_empty() {
        "nobody".to_string()
    } else {
        settings
            .allowed_users
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    HostText::from("Script access: ")
        .user(&settings.access_mode.to_string())
        .literal(&format!(
            "\nCreator: {}\nAllow list: {allowed}",
            settings.creator_id
        ))
}
