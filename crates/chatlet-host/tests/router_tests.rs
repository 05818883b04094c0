// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user ordering and worker lifecycle of the event router.

use std::sync::Arc;
use std::time::Duration;

use chatlet_core::{ChatAdministrator, ChatId, InboundEvent};
use chatlet_host::EventRouter;
use chatlet_test_utils::{submission, MockChannel, TestHarness};
use tokio_util::sync::CancellationToken;

fn text(chat: i64, user: i64, body: &str) -> InboundEvent {
    InboundEvent::Text {
        chat: TestHarness::private_chat(chat),
        sender: TestHarness::user(user, &format!("user{user}")),
        text: body.to_string(),
    }
}

async fn wait_for(channel: &MockChannel, expected: &str) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if channel.sent_texts().await.iter().any(|t| t == expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw {expected:?}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_users_events_are_handled_in_order() {
    let h = TestHarness::new().await.unwrap();
    let router = EventRouter::new(Arc::clone(&h.host));
    let code = "function execute(event, ctx, args) return 'pong-' .. event.user_id end";

    for user in [1, 2] {
        router.route(text(user, user, "/addscript")).unwrap();
        router
            .route(text(user, user, &submission("ping", "d", code)))
            .unwrap();
        router.route(text(user, user, "done")).unwrap();
        router.route(text(user, user, "/ping")).unwrap();
    }

    wait_for(&h.channel, "pong-1").await;
    wait_for(&h.channel, "pong-2").await;
    assert!(h.host.registry().contains(ChatId(1), "/ping").await);
    assert!(h.host.registry().contains(ChatId(2), "/ping").await);
    assert_eq!(router.active_workers(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hung_trigger_does_not_stall_another_users_command() {
    let h = TestHarness::builder()
        .with_execution_timeout(6)
        .build()
        .await
        .unwrap();
    let chat = TestHarness::group_chat(-100);
    let alice = TestHarness::user(1, "alice");
    let bob = TestHarness::user(2, "bob");
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
            "hang",
            "spins on one word",
            "function execute(event, ctx, args) return 'hang' end\nfunction check_triggers(event, ctx)\n  if event.text == 'hang' then while true do end end\nend",
        ),
    )
    .await;
    h.add_script(
        chat,
        &alice,
        &submission(
            "other",
            "replies",
            "function execute(event, ctx, args) return 'other done' end",
        ),
    )
    .await;
    h.channel.clear_sent().await;

    let router = EventRouter::new(Arc::clone(&h.host));
    let in_group = |sender: &chatlet_core::Sender, body: &str| InboundEvent::Text {
        chat,
        sender: sender.clone(),
        text: body.to_string(),
    };
    router.route(in_group(&alice, "hang")).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    router.route(in_group(&bob, "/other")).unwrap();

    tokio::time::timeout(Duration::from_secs(3), async {
        while !h.channel.sent_texts().await.iter().any(|t| t == "other done") {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("bob's command waited on alice's hung trigger");
    assert_eq!(router.active_workers(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_workers_retire_and_respawn() {
    let h = TestHarness::builder()
        .with_config(|c| c.host.worker_idle_secs = 1)
        .build()
        .await
        .unwrap();
    let router = EventRouter::new(Arc::clone(&h.host));

    router.route(text(1, 1, "/start")).unwrap();
    assert_eq!(router.active_workers(), 1);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(router.active_workers(), 0);

    h.channel.clear_sent().await;
    router.route(text(1, 1, "/cancel")).unwrap();
    wait_for(&h.channel, "Nothing to cancel.").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_stops_on_cancellation() {
    let h = TestHarness::new().await.unwrap();
    let router = Arc::new(EventRouter::new(Arc::clone(&h.host)));
    let cancel = CancellationToken::new();

    let loop_router = Arc::clone(&router);
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        loop_router
            .run(loop_cancel, Duration::from_secs(5))
            .await
    });

    h.channel.inject_event(text(1, 1, "/cancel")).await;
    wait_for(&h.channel, "Nothing to cancel.").await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("router did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(router.active_workers(), 0);
}
