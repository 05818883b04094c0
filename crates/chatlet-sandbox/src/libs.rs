// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library namespaces exposed to scripts.
//!
//! Standard Lua libraries are selected when the VM is created. Host namespaces
//! (`json`, `log`, `time`) are installed as globals afterwards. Names that match
//! neither are skipped with a warning.

use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib, Table, Value};
use tracing::{debug, error, info, warn};

/// Log target used by the `log` namespace.
pub const SCRIPT_LOG_TARGET: &str = "chatlet::script";

const HOST_NAMESPACES: [&str; 3] = ["json", "log", "time"];

fn std_lib(name: &str) -> Option<StdLib> {
    match name {
        "string" => Some(StdLib::STRING),
        "table" => Some(StdLib::TABLE),
        "math" => Some(StdLib::MATH),
        "utf8" => Some(StdLib::UTF8),
        "os" => Some(StdLib::OS),
        "io" => Some(StdLib::IO),
        "coroutine" => Some(StdLib::COROUTINE),
        _ => None,
    }
}

/// Create a VM carrying the configured libraries.
///
/// `label` names the script in log lines emitted through the `log` namespace.
pub fn new_vm(modules: &[String], label: &str) -> mlua::Result<Lua> {
    let mut libs = StdLib::NONE;
    for name in modules {
        if let Some(lib) = std_lib(name) {
            libs |= lib;
        } else if !HOST_NAMESPACES.contains(&name.as_str()) {
            warn!(module = %name, "unknown script module, skipping");
        }
    }

    // SAFETY: the runtime loads only bytecode it dumped itself from source in
    // this process. Script-visible loaders are pinned to text mode below.
    let lua = unsafe { Lua::unsafe_new_with(libs, LuaOptions::new()) };
    pin_text_loaders(&lua)?;
    for name in modules {
        match name.as_str() {
            "json" => install_json(&lua)?,
            "log" => install_log(&lua, label)?,
            "time" => install_time(&lua)?,
            _ => {}
        }
    }
    Ok(lua)
}

fn pin_text_loaders(lua: &Lua) -> mlua::Result<()> {
    lua.load(
        r#"
        local raw_load, raw_loadfile = load, loadfile
        load = function(chunk, name, _, env) return raw_load(chunk, name, "t", env) end
        loadfile = function(path, _, env) return raw_loadfile(path, "t", env) end
        dofile = function(path) return assert(loadfile(path))() end
        "#,
    )
    .set_name("=loaders")
    .exec()
}

fn install_json(lua: &Lua) -> mlua::Result<()> {
    let json = lua.create_table()?;
    json.set(
        "encode",
        lua.create_function(|lua, value: Value| {
            let value: serde_json::Value = lua.from_value(value)?;
            serde_json::to_string(&value).map_err(mlua::Error::external)
        })?,
    )?;
    json.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(mlua::Error::external)?;
            lua.to_value(&value)
        })?,
    )?;
    lua.globals().set("json", json)
}

fn install_log(lua: &Lua, label: &str) -> mlua::Result<()> {
    let log: Table = lua.create_table()?;

    let script = label.to_string();
    log.set(
        "debug",
        lua.create_function(move |_, msg: String| {
            debug!(target: SCRIPT_LOG_TARGET, script = %script, "{msg}");
            Ok(())
        })?,
    )?;
    let script = label.to_string();
    log.set(
        "info",
        lua.create_function(move |_, msg: String| {
            info!(target: SCRIPT_LOG_TARGET, script = %script, "{msg}");
            Ok(())
        })?,
    )?;
    let script = label.to_string();
    log.set(
        "warn",
        lua.create_function(move |_, msg: String| {
            warn!(target: SCRIPT_LOG_TARGET, script = %script, "{msg}");
            Ok(())
        })?,
    )?;
    let script = label.to_string();
    log.set(
        "error",
        lua.create_function(move |_, msg: String| {
            error!(target: SCRIPT_LOG_TARGET, script = %script, "{msg}");
            Ok(())
        })?,
    )?;

    lua.globals().set("log", log)
}

fn install_time(lua: &Lua) -> mlua::Result<()> {
    let time = lua.create_table()?;
    time.set(
        "now",
        lua.create_function(|_, ()| Ok(chrono::Utc::now().timestamp()))?,
    )?;
    time.set(
        "iso",
        lua.create_function(|_, ()| Ok(chrono::Utc::now().to_rfc3339()))?,
    )?;
    lua.globals().set("time", time)
}
