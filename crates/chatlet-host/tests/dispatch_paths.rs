// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger and callback dispatch through the full host.

use chatlet_core::{ChatAdministrator, ChatId, ExecutionKind, StorageAdapter};
use chatlet_test_utils::mock_channel::Acknowledgement;
use chatlet_test_utils::{submission, TestHarness};

fn with_execute(body: &str) -> String {
    format!("function execute(event, ctx, args) return 'ok' end\n{body}")
}

#[tokio::test]
async fn first_truthy_callback_claims_the_press() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::group_chat(-100);
    let alice = TestHarness::user(1, "alice");
    h.channel
        .set_administrators(
            ChatId(-100),
            vec![ChatAdministrator {
                user_id: alice.id,
                is_creator: true,
            }],
        )
        .await;
    h.add_script(
        chat,
        &alice,
        &submission(
            "a",
            "claims",
            &with_execute(
                "function handle_callback(event, ctx, data)\n  ctx:reply('a got ' .. data)\n  return true\nend",
            ),
        ),
    )
    .await;
    h.add_script(
        chat,
        &alice,
        &submission(
            "b",
            "never runs",
            &with_execute("function handle_callback(event, ctx, data)\n  ctx:reply('b ran')\n  return true\nend"),
        ),
    )
    .await;
    h.channel.clear_sent().await;

    h.press_button(chat, &alice, "q1", "vote").await;

    assert_eq!(h.channel.sent_texts().await, vec!["a got vote"]);
    assert!(h.channel.acknowledgements().await.is_empty());
}

#[tokio::test]
async fn unclaimed_press_gets_one_default_acknowledgement() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::private_chat(5);
    let alice = TestHarness::user(1, "alice");
    h.add_script(
        chat,
        &alice,
        &submission(
            "a",
            "falsy",
            &with_execute("function on_callback(event, ctx)\n  ctx:reply('seen ' .. event.payload)\n  return false\nend"),
        ),
    )
    .await;
    h.add_script(
        chat,
        &alice,
        &submission(
            "b",
            "raises",
            &with_execute("function handle_callback(event, ctx, data)\n  error('broken')\nend"),
        ),
    )
    .await;
    h.channel.clear_sent().await;

    h.press_button(chat, &alice, "q2", "x").await;

    assert_eq!(h.channel.sent_texts().await, vec!["seen x"]);
    assert_eq!(
        h.channel.acknowledgements().await,
        vec![Acknowledgement {
            query_id: "q2".into(),
            text: None,
        }]
    );
    let logs = h.storage.recent_logs(ChatId(5), 10).await.unwrap();
    let failure = logs
        .iter()
        .find(|l| l.kind == ExecutionKind::Callback)
        .unwrap();
    assert_eq!(failure.command, "/b");
    assert!(!failure.success);
}

#[tokio::test]
async fn handler_answer_replaces_the_default_acknowledgement() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::private_chat(5);
    let alice = TestHarness::user(1, "alice");
    h.add_script(
        chat,
        &alice,
        &submission(
            "poll",
            "answers",
            &with_execute("function handle_callback(event, ctx, data)\n  ctx:answer('thanks')\nend"),
        ),
    )
    .await;

    h.press_button(chat, &alice, "q3", "yes").await;

    assert_eq!(
        h.channel.acknowledgements().await,
        vec![Acknowledgement {
            query_id: "q3".into(),
            text: Some("thanks".into()),
        }]
    );
}

#[tokio::test]
async fn press_without_handlers_is_still_acknowledged() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::private_chat(5);
    let alice = TestHarness::user(1, "alice");

    h.press_button(chat, &alice, "q4", "stale").await;
    assert_eq!(h.channel.acknowledgements().await.len(), 1);
}

#[tokio::test]
async fn broken_trigger_does_not_block_others_or_commands() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::private_chat(5);
    let alice = TestHarness::user(1, "alice");
    h.add_script(
        chat,
        &alice,
        &submission(
            "a",
            "broken",
            &with_execute("function check_triggers(event, ctx)\n  error('always fails')\nend"),
        ),
    )
    .await;
    h.add_script(
        chat,
        &alice,
        &submission(
            "b",
            "echo",
            "function execute(event, ctx, args) return 'cmd' end\nfunction check_triggers(event, ctx)\n  ctx:reply('seen ' .. event.text)\nend",
        ),
    )
    .await;
    h.channel.clear_sent().await;

    h.send_text(chat, &alice, "hello").await;
    assert_eq!(h.channel.sent_texts().await, vec!["seen hello"]);

    h.channel.clear_sent().await;
    h.send_text(chat, &alice, "/b").await;
    assert_eq!(h.channel.sent_texts().await, vec!["seen /b", "cmd"]);

    let logs = h.storage.recent_logs(ChatId(5), 10).await.unwrap();
    let trigger_failures = logs
        .iter()
        .filter(|l| l.kind == ExecutionKind::Trigger && !l.success)
        .count();
    assert_eq!(trigger_failures, 2);
    assert!(logs
        .iter()
        .any(|l| l.kind == ExecutionKind::Command && l.command == "/b" && l.success));
}

#[tokio::test]
async fn raising_trigger_does_not_stop_another_chats_trigger() {
    let h = TestHarness::new().await.unwrap();
    let alice = TestHarness::user(1, "alice");
    let bob = TestHarness::user(2, "bob");
    let chat_a = TestHarness::private_chat(5);
    let chat_b = TestHarness::private_chat(6);
    h.add_script(
        chat_a,
        &alice,
        &submission(
            "broken",
            "always raises",
            &with_execute("function check_triggers(event, ctx)\n  error('always fails')\nend"),
        ),
    )
    .await;
    h.add_script(
        chat_b,
        &bob,
        &submission(
            "echo",
            "echoes",
            &with_execute("function check_triggers(event, ctx)\n  ctx:reply('seen ' .. event.text)\nend"),
        ),
    )
    .await;
    h.channel.clear_sent().await;

    h.send_text(chat_a, &alice, "hello").await;
    assert_eq!(h.channel.sent_count().await, 0);
    h.send_text(chat_b, &bob, "hello").await;
    assert_eq!(h.channel.sent_texts().await, vec!["seen hello"]);

    let failures = h.storage.recent_logs(ChatId(5), 10).await.unwrap();
    assert!(failures
        .iter()
        .any(|l| l.kind == ExecutionKind::Trigger && !l.success));
    assert!(h.storage.recent_logs(ChatId(6), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn triggers_are_scoped_to_their_chat() {
    let h = TestHarness::new().await.unwrap();
    let alice = TestHarness::user(1, "alice");
    h.add_script(
        TestHarness::private_chat(5),
        &alice,
        &submission(
            "echo",
            "d",
            &with_execute("function check_triggers(event, ctx)\n  ctx:reply('echo')\nend"),
        ),
    )
    .await;
    h.channel.clear_sent().await;

    h.send_text(TestHarness::private_chat(6), &alice, "hi").await;
    assert_eq!(h.channel.sent_count().await, 0);
}

#[tokio::test]
async fn submission_chunks_do_not_fire_triggers() {
    let h = TestHarness::new().await.unwrap();
    let chat = TestHarness::private_chat(5);
    let alice = TestHarness::user(1, "alice");
    h.add_script(
        chat,
        &alice,
        &submission(
            "echo",
            "d",
            &with_execute("function check_triggers(event, ctx)\n  ctx:reply('echo')\nend"),
        ),
    )
    .await;

    h.send_text(chat, &alice, "/addscript").await;
    h.channel.clear_sent().await;
    h.send_text(chat, &alice, "-- some code").await;
    assert!(!h.channel.sent_texts().await.contains(&"echo".to_string()));
}
