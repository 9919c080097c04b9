//! Chat front behaviour over a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use agent_bridge::bridge::{ChatBridge, QueryOutcome};
use agent_bridge::models::event::StreamEvent;
use agent_bridge::models::session::Session;
use tokio::sync::{mpsc, Notify};

use super::test_helpers::{drain, ScriptedTransport};

fn bridge_with(transport: ScriptedTransport) -> (ChatBridge, mpsc::UnboundedReceiver<StreamEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let bridge = ChatBridge::new(
        Arc::new(Session::new("chat")),
        Arc::new(transport),
        Arc::new(tx),
    );
    (bridge, rx)
}

#[tokio::test]
async fn user_message_is_echoed_before_agent_events() {
    let (bridge, mut rx) = bridge_with(ScriptedTransport::replaying(vec![
        StreamEvent::Assistant {
            content: "hello back".into(),
        },
        StreamEvent::Result {
            stop_reason: Some("end_turn".into()),
            cost: None,
            turns: None,
        },
    ]));

    let handle = bridge.chat("hello").expect("message accepted");
    assert_eq!(handle.await.expect("join"), QueryOutcome::Completed);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        StreamEvent::User {
            content: "hello".into()
        }
    );
    assert!(events[2].is_terminal());
}

#[tokio::test]
async fn blank_message_is_ignored() {
    let (bridge, mut rx) = bridge_with(ScriptedTransport::replaying(vec![StreamEvent::error(
        "should not run",
    )]));

    assert!(bridge.chat("   \n").is_none());
    assert!(bridge.chat("").is_none());
    assert!(drain(&mut rx).is_empty());
}

/// `chat` returns before the agent finishes, and a message sent meanwhile is
/// dropped.
#[tokio::test]
async fn overlapping_message_is_dropped() {
    let gate = Arc::new(Notify::new());
    let mut transport = ScriptedTransport::replaying(vec![StreamEvent::Assistant {
        content: "first answer".into(),
    }]);
    transport.gate = Some(Arc::clone(&gate));
    let (bridge, mut rx) = bridge_with(transport);

    let first = bridge.chat("first").expect("accepted");
    while !bridge.session().is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let second = bridge.chat("second").expect("accepted");
    assert_eq!(second.await.expect("join"), QueryOutcome::Dropped);

    gate.notify_one();
    assert_eq!(first.await.expect("join"), QueryOutcome::Completed);

    let agent_events: Vec<StreamEvent> = drain(&mut rx)
        .into_iter()
        .filter(|event| !matches!(event, StreamEvent::User { .. }))
        .collect();
    assert_eq!(
        agent_events,
        vec![StreamEvent::Assistant {
            content: "first answer".into()
        }]
    );
    assert!(!bridge.session().is_busy());
}

#[tokio::test]
async fn worker_panic_becomes_error_event() {
    let mut transport = ScriptedTransport::replaying(Vec::new());
    transport.panic_with = Some("transport exploded");
    let (bridge, mut rx) = bridge_with(transport);

    let handle = bridge.chat("boom").expect("accepted");
    assert_eq!(handle.await.expect("join"), QueryOutcome::Completed);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], StreamEvent::error("Error: transport exploded"));
    assert!(!bridge.session().is_busy());
}
