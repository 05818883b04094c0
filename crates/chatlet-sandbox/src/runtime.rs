// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lua script runtime.
//!
//! Each script version is compiled to bytecode once and kept in a cache keyed
//! by `(chat, command, updated_at)`. Every invocation loads that bytecode into a
//! fresh VM on a blocking thread, runs the chunk, calls one entry point, and
//! hands back the rendered return value plus every action queued on `ctx`.
//! Globals never outlive the invocation that set them.
//!
//! When `sandbox.execution_timeout_secs` is set, an instruction-count hook
//! aborts the VM once the deadline passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chatlet_config::model::SandboxConfig;
use chatlet_core::{
    CallbackArity, CallbackHandler, ChatId, ChatletError, InboundEvent, Script,
};
use dashmap::DashMap;
use mlua::{ChunkMode, Function, HookTriggers, Lua, LuaSerdeExt, Value, VmState};
use tracing::{debug, info};

use crate::context::{event_table, ScriptAction, ScriptContext};
use crate::libs;

type CacheKey = (ChatId, String, String);

/// A script version compiled to bytecode. Immutable once cached.
pub struct CompiledScript {
    bytecode: Vec<u8>,
}

/// Which entry point to call and with what extra argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// `execute(event, ctx, args)`
    Execute { args: Vec<String> },
    /// `check_triggers(event, ctx)`
    Trigger,
    /// The script's callback handler, called per its recorded arity.
    Callback {
        handler: CallbackHandler,
        payload: String,
    },
}

impl EntryPoint {
    fn function_name<'a>(&'a self, config: &'a SandboxConfig) -> &'a str {
        match self {
            Self::Execute { .. } => &config.entry_point,
            Self::Trigger => &config.trigger_entry_point,
            Self::Callback { handler, .. } => &handler.name,
        }
    }
}

/// One call into a script.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub script: Arc<Script>,
    pub event: InboundEvent,
    pub entry: EntryPoint,
}

/// What a script produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationResult {
    /// The return value rendered as reply text, if it renders to anything.
    pub output: Option<String>,
    /// Lua truthiness of the return value.
    pub truthy: bool,
    /// Side effects queued on `ctx`, in call order.
    pub actions: Vec<ScriptAction>,
}

impl InvocationResult {
    /// Whether the script answered a callback query itself.
    pub fn answered(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, ScriptAction::Answer { .. }))
    }
}

/// The script runtime shared by every dispatch path.
pub struct ScriptSandbox {
    config: Arc<SandboxConfig>,
    cache: Arc<DashMap<CacheKey, Arc<CompiledScript>>>,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        info!(
            modules = config.modules.len(),
            timeout_secs = ?config.execution_timeout_secs,
            "script sandbox initialized"
        );
        Self {
            config: Arc::new(config),
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Number of cached script versions.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached version of a script.
    pub fn invalidate(&self, chat_id: ChatId, command: &str) {
        self.cache
            .retain(|(chat, cmd, _), _| !(*chat == chat_id && cmd == command));
    }

    /// Run one entry point of a script on a blocking thread.
    ///
    /// Load and runtime errors become [`ChatletError::Execution`]; a fired
    /// deadline becomes [`ChatletError::Timeout`].
    pub async fn invoke(&self, invocation: Invocation) -> Result<InvocationResult, ChatletError> {
        let config = Arc::clone(&self.config);
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || run(&config, &cache, invocation))
            .await
            .map_err(|e| ChatletError::Internal(format!("script task panicked: {e}")))?
    }
}

fn run(
    config: &SandboxConfig,
    cache: &DashMap<CacheKey, Arc<CompiledScript>>,
    invocation: Invocation,
) -> Result<InvocationResult, ChatletError> {
    let compiled = compiled_for(cache, &invocation.script)?;
    let lua = libs::new_vm(&config.modules, &invocation.script.command).map_err(|e| {
        ChatletError::Internal(format!("failed to create script VM: {e}"))
    })?;
    with_deadline(&lua, config, || {
        lua.load(compiled.bytecode.as_slice())
            .set_mode(ChunkMode::Binary)
            .exec()?;
        call_entry(&lua, config, &invocation)
    })
}

fn compiled_for(
    cache: &DashMap<CacheKey, Arc<CompiledScript>>,
    script: &Script,
) -> Result<Arc<CompiledScript>, ChatletError> {
    let key = (
        script.chat_id,
        script.command.clone(),
        script.updated_at.clone(),
    );
    if let Some(hit) = cache.get(&key) {
        return Ok(Arc::clone(hit.value()));
    }

    // Parse only. No user code runs here.
    let lua = Lua::new();
    let chunk = lua
        .load(script.code.as_str())
        .set_name(script.command.as_str())
        .set_mode(ChunkMode::Text)
        .into_function()
        .map_err(execution_error)?;
    let compiled = Arc::new(CompiledScript {
        bytecode: chunk.dump(false),
    });

    // Older versions of the same script are no longer reachable.
    cache.retain(|(chat, cmd, version), _| {
        !(*chat == script.chat_id && *cmd == script.command && *version != script.updated_at)
    });
    cache.insert(key, Arc::clone(&compiled));
    debug!(
        chat_id = %script.chat_id,
        command = %script.command,
        bytes = compiled.bytecode.len(),
        "script compiled"
    );
    Ok(compiled)
}

/// Run `f` with the deadline hook armed, translating Lua errors.
fn with_deadline<T>(
    lua: &Lua,
    config: &SandboxConfig,
    f: impl FnOnce() -> mlua::Result<T>,
) -> Result<T, ChatletError> {
    let Some(secs) = config.execution_timeout_secs else {
        return f().map_err(execution_error);
    };

    let duration = Duration::from_secs(secs);
    let deadline = Instant::now() + duration;
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(config.hook_instruction_interval),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::SeqCst);
                Err(mlua::Error::runtime("execution deadline exceeded"))
            } else {
                Ok(VmState::Continue)
            }
        },
    );
    let result = f();
    lua.remove_hook();

    match result {
        Ok(value) => Ok(value),
        Err(_) if fired.load(Ordering::SeqCst) => Err(ChatletError::Timeout { duration }),
        Err(e) => Err(execution_error(e)),
    }
}

fn call_entry(
    lua: &Lua,
    config: &SandboxConfig,
    invocation: &Invocation,
) -> mlua::Result<InvocationResult> {
    let name = invocation.entry.function_name(config);
    let func = match lua.globals().get::<Value>(name)? {
        Value::Function(func) => func,
        _ => {
            return Err(mlua::Error::runtime(format!(
                "script does not define {name}()"
            )));
        }
    };

    let event = event_table(lua, &invocation.event)?;
    let ctx = lua.create_userdata(ScriptContext::new(
        &invocation.event,
        &invocation.script.command,
    ))?;

    let value = call_with_arguments(lua, &func, &invocation.entry, event, ctx.clone())?;

    let actions = ctx.borrow_mut::<ScriptContext>()?.take_actions();
    Ok(InvocationResult {
        output: render_return(lua, &value)?,
        truthy: !matches!(value, Value::Nil | Value::Boolean(false)),
        actions,
    })
}

fn call_with_arguments(
    lua: &Lua,
    func: &Function,
    entry: &EntryPoint,
    event: mlua::Table,
    ctx: mlua::AnyUserData,
) -> mlua::Result<Value> {
    match entry {
        EntryPoint::Execute { args } => {
            let args = lua.create_sequence_from(args.iter().map(String::as_str))?;
            func.call::<Value>((event, ctx, args))
        }
        EntryPoint::Trigger => func.call::<Value>((event, ctx)),
        EntryPoint::Callback { handler, payload } => match handler.arity {
            CallbackArity::WithPayload => func.call::<Value>((event, ctx, payload.as_str())),
            CallbackArity::WithoutPayload => func.call::<Value>((event, ctx)),
        },
    }
}

/// Render a return value as reply text.
///
/// `nil`, `false` and the empty string render to nothing; numbers and `true`
/// to their display form; tables to compact JSON.
pub fn render_return(lua: &Lua, value: &Value) -> mlua::Result<Option<String>> {
    let text = match value {
        Value::Nil | Value::Boolean(false) => return Ok(None),
        Value::Boolean(true) => "true".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => String::from_utf8_lossy(&s.as_bytes()).into_owned(),
        Value::Table(_) => {
            let json: serde_json::Value = lua.from_value(value.clone())?;
            serde_json::to_string(&json).map_err(mlua::Error::external)?
        }
        other => {
            debug!(kind = other.type_name(), "return value is not renderable");
            return Ok(None);
        }
    };
    Ok((!text.is_empty()).then_some(text))
}

fn execution_error(err: mlua::Error) -> ChatletError {
    ChatletError::Execution {
        message: describe(&err),
    }
}

/// The innermost human-readable message of a Lua error, without tracebacks.
fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) | mlua::Error::SyntaxError { message: msg, .. } => {
            msg.clone()
        }
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        mlua::Error::ExternalError(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl chatlet_core::PluginAdapter for ScriptSandbox {
    fn name(&self) -> &str {
        "lua"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> chatlet_core::AdapterType {
        chatlet_core::AdapterType::ScriptRuntime
    }

    async fn health_check(&self) -> Result<chatlet_core::HealthStatus, ChatletError> {
        let modules = self.config.modules.clone();
        let probe = tokio::task::spawn_blocking(move || -> mlua::Result<i64> {
            libs::new_vm(&modules, "health")?.load("return 1 + 1").eval()
        })
        .await
        .map_err(|e| ChatletError::Internal(format!("health probe panicked: {e}")))?;
        Ok(match probe {
            Ok(2) => chatlet_core::HealthStatus::Healthy,
            Ok(other) => chatlet_core::HealthStatus::Degraded(format!("probe returned {other}")),
            Err(e) => chatlet_core::HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ChatletError> {
        self.cache.clear();
        Ok(())
    }
}
