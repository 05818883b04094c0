// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Textual detection of the entry points a script defines.
//!
//! Detection runs once when a script is committed. The result is stored with the
//! script so dispatch never has to inspect code. Matching is purely textual: a
//! `local function execute(...)` counts the same as a global one.

use std::collections::HashMap;
use std::sync::LazyLock;

use chatlet_config::model::SandboxConfig;
use chatlet_core::{CallbackArity, CallbackHandler, ScriptCapabilities};
use regex::Regex;

/// `function name(params)`
static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)")
        .expect("function definition pattern is valid")
});

/// `name = function(params)`
static ASSIGNED_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*=\s*function\s*\(([^)]*)\)")
        .expect("assigned function pattern is valid")
});

/// Map of every function name defined in `code` to its parameter list.
///
/// The first definition of a name wins.
fn definitions(code: &str) -> HashMap<&str, Vec<&str>> {
    let mut defs = HashMap::new();
    for pattern in [&*FUNCTION_DEF, &*ASSIGNED_DEF] {
        for caps in pattern.captures_iter(code) {
            let (Some(name), Some(params)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let params: Vec<&str> = params
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            defs.entry(name.as_str()).or_insert(params);
        }
    }
    defs
}

/// Whether `code` defines a function called `name`.
pub fn defines(code: &str, name: &str) -> bool {
    definitions(code).contains_key(name)
}

/// Resolve the capability descriptor of `code`.
///
/// The callback handler is the first name in `config.callback_handlers` that the
/// code defines.
pub fn detect(code: &str, config: &SandboxConfig) -> ScriptCapabilities {
    let defs = definitions(code);
    let callback = config.callback_handlers.iter().find_map(|name| {
        defs.get(name.as_str()).map(|params| CallbackHandler {
            name: name.clone(),
            arity: arity_of(params),
        })
    });

    ScriptCapabilities {
        has_execute: defs.contains_key(config.entry_point.as_str()),
        has_trigger: defs.contains_key(config.trigger_entry_point.as_str()),
        callback,
    }
}

fn arity_of(params: &[&str]) -> CallbackArity {
    if params.len() >= 3 || params.contains(&"...") {
        CallbackArity::WithPayload
    } else {
        CallbackArity::WithoutPayload
    }
}
