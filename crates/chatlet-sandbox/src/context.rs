// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `ctx` handle and `event` table passed to every entry point.
//!
//! Scripts never talk to the transport directly. Every `ctx` call records a
//! [`ScriptAction`] that the dispatcher delivers after the script returns.

use std::str::FromStr;

use chatlet_core::{FormatMode, InboundEvent, InlineButton, InlineKeyboard};
use mlua::{Lua, Table, UserData, UserDataFields, UserDataMethods};

/// A side effect requested by a script through `ctx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    /// `ctx:reply(text [, opts])`. `format: None` leaves the choice to the host.
    Reply {
        text: String,
        format: Option<FormatMode>,
        keyboard: Option<InlineKeyboard>,
    },
    /// `ctx:send_document(filename, content [, caption])`.
    Document {
        filename: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
    /// `ctx:answer([text])`. Only recorded on the callback path.
    Answer { text: Option<String> },
}

/// Userdata behind the `ctx` argument.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    chat_id: i64,
    user_id: i64,
    username: Option<String>,
    command: String,
    allow_answer: bool,
    actions: Vec<ScriptAction>,
}

impl ScriptContext {
    pub fn new(event: &InboundEvent, command: &str) -> Self {
        Self {
            chat_id: event.chat().id.0,
            user_id: event.sender().id.0,
            username: event.sender().username.clone(),
            command: command.to_string(),
            allow_answer: matches!(event, InboundEvent::Callback { .. }),
            actions: Vec::new(),
        }
    }

    /// Drain the recorded actions.
    pub fn take_actions(&mut self) -> Vec<ScriptAction> {
        std::mem::take(&mut self.actions)
    }
}

impl UserData for ScriptContext {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("chat_id", |_, this| Ok(this.chat_id));
        fields.add_field_method_get("user_id", |_, this| Ok(this.user_id));
        fields.add_field_method_get("username", |_, this| Ok(this.username.clone()));
        fields.add_field_method_get("command", |_, this| Ok(this.command.clone()));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut(
            "reply",
            |_, this, (text, opts): (String, Option<Table>)| {
                let (format, keyboard) = match opts {
                    Some(opts) => parse_reply_options(&opts)?,
                    None => (None, None),
                };
                this.actions.push(ScriptAction::Reply {
                    text,
                    format,
                    keyboard,
                });
                Ok(())
            },
        );

        methods.add_method_mut(
            "send_document",
            |_, this, (filename, content, caption): (String, mlua::String, Option<String>)| {
                this.actions.push(ScriptAction::Document {
                    filename,
                    bytes: content.as_bytes().to_vec(),
                    caption,
                });
                Ok(())
            },
        );

        methods.add_method_mut("answer", |_, this, text: Option<String>| {
            if !this.allow_answer {
                return Err(mlua::Error::runtime(
                    "ctx:answer is only available in callback handlers",
                ));
            }
            this.actions.push(ScriptAction::Answer { text });
            Ok(())
        });
    }
}

fn parse_reply_options(
    opts: &Table,
) -> mlua::Result<(Option<FormatMode>, Option<InlineKeyboard>)> {
    let format = match opts.get::<Option<String>>("format")? {
        Some(name) => Some(FormatMode::from_str(&name).map_err(|_| {
            mlua::Error::runtime(format!(
                "unknown format `{name}`, expected markdown, markdown_v2, html or plain"
            ))
        })?),
        None => None,
    };

    let keyboard = match opts.get::<Option<Table>>("keyboard")? {
        Some(rows) => {
            let mut keyboard = InlineKeyboard::default();
            for row in rows.sequence_values::<Table>() {
                let mut buttons = Vec::new();
                for button in row?.sequence_values::<Table>() {
                    let button = button?;
                    buttons.push(InlineButton {
                        text: button.get("text")?,
                        data: button.get("data")?,
                    });
                }
                keyboard.rows.push(buttons);
            }
            Some(keyboard)
        }
        None => None,
    };

    Ok((format, keyboard))
}

/// Build the script-visible `event` table.
pub fn event_table(lua: &Lua, event: &InboundEvent) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    let chat = event.chat();
    let sender = event.sender();
    table.set("kind", event.kind_str())?;
    table.set("chat_id", chat.id.0)?;
    table.set("chat_type", chat.kind.to_string())?;
    table.set("user_id", sender.id.0)?;
    table.set("username", sender.username.clone())?;
    table.set("first_name", sender.first_name.clone())?;
    match event {
        InboundEvent::Text { text, .. } => table.set("text", text.as_str())?,
        InboundEvent::Document { filename, .. } => table.set("filename", filename.as_str())?,
        InboundEvent::Callback { payload, .. } => table.set("payload", payload.as_str())?,
    }
    Ok(table)
}
