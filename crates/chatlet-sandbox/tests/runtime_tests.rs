// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocation tests for the Lua runtime.

use std::sync::Arc;

use chatlet_config::model::SandboxConfig;
use chatlet_core::{
    CallbackArity, CallbackHandler, ChatId, ChatKind, ChatRef, ChatletError, FormatMode,
    InboundEvent, Script, Sender, UserId,
};
use chatlet_sandbox::capabilities::detect;
use chatlet_sandbox::{EntryPoint, Invocation, ScriptAction, ScriptSandbox};

fn script(command: &str, code: &str, version: &str) -> Arc<Script> {
    Arc::new(Script {
        chat_id: ChatId(-1),
        command: command.to_string(),
        description: "test".to_string(),
        code: code.to_string(),
        author: "alice".to_string(),
        author_id: UserId(1),
        capabilities: detect(code, &SandboxConfig::default()),
        created_at: version.to_string(),
        updated_at: version.to_string(),
    })
}

fn sender() -> Sender {
    Sender {
        id: UserId(1),
        username: Some("alice".into()),
        first_name: Some("Alice".into()),
    }
}

fn text_event(text: &str) -> InboundEvent {
    InboundEvent::Text {
        chat: ChatRef {
            id: ChatId(-1),
            kind: ChatKind::Group,
        },
        sender: sender(),
        text: text.to_string(),
    }
}

fn callback_event(payload: &str) -> InboundEvent {
    InboundEvent::Callback {
        chat: ChatRef {
            id: ChatId(-1),
            kind: ChatKind::Group,
        },
        sender: sender(),
        query_id: "q1".into(),
        payload: payload.to_string(),
    }
}

fn execute(script: Arc<Script>, text: &str, args: &[&str]) -> Invocation {
    Invocation {
        script,
        event: text_event(text),
        entry: EntryPoint::Execute {
            args: args.iter().map(|s| s.to_string()).collect(),
        },
    }
}

#[tokio::test]
async fn execute_returns_rendered_string() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = "function execute(event, ctx, args)\n  return 'pong'\nend";
    let result = sandbox
        .invoke(execute(script("/ping", code, "v1"), "/ping", &[]))
        .await
        .unwrap();
    assert_eq!(result.output.as_deref(), Some("pong"));
    assert!(result.truthy);
    assert!(result.actions.is_empty());
}

#[tokio::test]
async fn arguments_and_event_fields_are_visible() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = r#"
function execute(event, ctx, args)
  return event.kind .. ':' .. event.username .. ':' .. table.concat(args, ',') .. ':' .. ctx.command
end"#;
    let result = sandbox
        .invoke(execute(script("/echo", code, "v1"), "/echo a b", &["a", "b"]))
        .await
        .unwrap();
    assert_eq!(result.output.as_deref(), Some("text:alice:a,b:/echo"));
}

#[tokio::test]
async fn return_values_render_per_type() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let cases = [
        ("return nil", None),
        ("return false", None),
        ("return ''", None),
        ("return 42", Some("42")),
        ("return true", Some("true")),
        ("return {ok = true}", Some(r#"{"ok":true}"#)),
    ];
    for (i, (body, expected)) in cases.into_iter().enumerate() {
        let code = format!("function execute(event, ctx, args) {body} end");
        let result = sandbox
            .invoke(execute(script("/r", &code, &format!("v{i}")), "/r", &[]))
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), expected, "case {body}");
    }
}

#[tokio::test]
async fn ctx_actions_are_recorded_in_order() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = r#"
function execute(event, ctx, args)
  ctx:reply('*hi*', { format = 'markdown', keyboard = { { { text = 'Go', data = 'go' } } } })
  ctx:send_document('out.txt', 'content', 'cap')
end"#;
    let result = sandbox
        .invoke(execute(script("/act", code, "v1"), "/act", &[]))
        .await
        .unwrap();
    assert_eq!(result.output, None);
    assert_eq!(result.actions.len(), 2);
    match &result.actions[0] {
        ScriptAction::Reply {
            text,
            format,
            keyboard,
        } => {
            assert_eq!(text, "*hi*");
            assert_eq!(*format, Some(FormatMode::Markdown));
            let keyboard = keyboard.as_ref().unwrap();
            assert_eq!(keyboard.rows[0][0].data, "go");
        }
        other => panic!("expected reply, got {other:?}"),
    }
    assert_eq!(
        result.actions[1],
        ScriptAction::Document {
            filename: "out.txt".into(),
            bytes: b"content".to_vec(),
            caption: Some("cap".into()),
        }
    );
}

#[tokio::test]
async fn runtime_error_becomes_execution_error() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = "function execute(event, ctx, args) error('boom') end";
    let err = sandbox
        .invoke(execute(script("/bad", code, "v1"), "/bad", &[]))
        .await
        .unwrap_err();
    match err {
        ChatletError::Execution { message } => assert!(message.contains("boom")),
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn syntax_error_becomes_execution_error() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let err = sandbox
        .invoke(execute(script("/bad", "function execute(", "v1"), "/bad", &[]))
        .await
        .unwrap_err();
    assert!(err.is_script_failure());
    assert_eq!(sandbox.cached(), 0);
}

#[tokio::test]
async fn answer_outside_callback_is_rejected() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = "function execute(event, ctx, args) ctx:answer('x') end";
    let err = sandbox
        .invoke(execute(script("/a", code, "v1"), "/a", &[]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("callback"));
}

#[tokio::test]
async fn callback_arity_controls_payload() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());

    let with = "function handle_callback(event, ctx, payload)\n  ctx:answer(payload)\n  return true\nend";
    let result = sandbox
        .invoke(Invocation {
            script: script("/cb", with, "v1"),
            event: callback_event("btn:1"),
            entry: EntryPoint::Callback {
                handler: CallbackHandler {
                    name: "handle_callback".into(),
                    arity: CallbackArity::WithPayload,
                },
                payload: "btn:1".into(),
            },
        })
        .await
        .unwrap();
    assert!(result.truthy);
    assert!(result.answered());
    assert_eq!(
        result.actions[0],
        ScriptAction::Answer {
            text: Some("btn:1".into())
        }
    );

    let without = "function on_callback(event, ctx, extra)\n  return extra == nil and event.payload\nend";
    let result = sandbox
        .invoke(Invocation {
            script: script("/cb2", without, "v1"),
            event: callback_event("btn:2"),
            entry: EntryPoint::Callback {
                handler: CallbackHandler {
                    name: "on_callback".into(),
                    arity: CallbackArity::WithoutPayload,
                },
                payload: "btn:2".into(),
            },
        })
        .await
        .unwrap();
    assert_eq!(result.output.as_deref(), Some("btn:2"));
}

#[tokio::test]
async fn compiled_versions_are_cached_and_invalidated() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = "function execute(event, ctx, args)\n  return 'ok'\nend";
    let v1 = script("/count", code, "v1");

    sandbox.invoke(execute(v1.clone(), "/count", &[])).await.unwrap();
    sandbox.invoke(execute(v1.clone(), "/count", &[])).await.unwrap();
    assert_eq!(sandbox.cached(), 1);

    let v2 = script("/count", code, "v2");
    sandbox.invoke(execute(v2, "/count", &[])).await.unwrap();
    assert_eq!(sandbox.cached(), 1);

    sandbox.invalidate(ChatId(-1), "/count");
    assert_eq!(sandbox.cached(), 0);
}

#[tokio::test]
async fn globals_start_fresh_on_every_invocation() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let code = "n = 0\nfunction execute(event, ctx, args)\n  n = n + 1\n  leaked = (leaked or 0) + 1\n  return tostring(n) .. ':' .. leaked\nend";
    let count = script("/count", code, "v1");

    for _ in 0..3 {
        let result = sandbox
            .invoke(execute(count.clone(), "/count", &[]))
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("1:1"));
    }
    assert_eq!(sandbox.cached(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hung_invocation_does_not_block_the_same_script() {
    let config = SandboxConfig {
        execution_timeout_secs: Some(5),
        hook_instruction_interval: 1000,
        ..SandboxConfig::default()
    };
    let sandbox = Arc::new(ScriptSandbox::new(config));
    let code = "function execute(event, ctx, args)\n  if args[1] == 'hang' then while true do end end\n  return 'done'\nend";
    let loop_script = script("/loop", code, "v1");

    let hung = {
        let sandbox = Arc::clone(&sandbox);
        let loop_script = loop_script.clone();
        tokio::spawn(async move {
            sandbox
                .invoke(execute(loop_script, "/loop hang", &["hang"]))
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        sandbox.invoke(execute(loop_script, "/loop", &[])),
    )
    .await
    .expect("second invocation blocked behind the hung one")
    .unwrap();
    assert_eq!(result.output.as_deref(), Some("done"));
    assert!(!hung.is_finished());

    let err = hung.await.unwrap().unwrap_err();
    assert!(matches!(err, ChatletError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn deadline_aborts_runaway_script() {
    let config = SandboxConfig {
        execution_timeout_secs: Some(1),
        hook_instruction_interval: 1000,
        ..SandboxConfig::default()
    };
    let sandbox = ScriptSandbox::new(config);
    let code = "function execute(event, ctx, args) while true do end end";
    let err = sandbox
        .invoke(execute(script("/spin", code, "v1"), "/spin", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatletError::Timeout { .. }), "got {err:?}");

    let ok = "function execute(event, ctx, args) return 'fine' end";
    let result = sandbox
        .invoke(execute(script("/ok", ok, "v1"), "/ok", &[]))
        .await
        .unwrap();
    assert_eq!(result.output.as_deref(), Some("fine"));
}

#[tokio::test]
async fn missing_entry_point_is_reported() {
    let sandbox = ScriptSandbox::new(SandboxConfig::default());
    let err = sandbox
        .invoke(Invocation {
            script: script("/x", "function execute() end", "v1"),
            event: text_event("hi"),
            entry: EntryPoint::Trigger,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("check_triggers"));
}
