use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout, Instant};

use shared::domain::{TaskCategory, VibratePattern};

use super::support::*;
use crate::{CommandDispatcher, DeviceSession, SessionStatus};

const ENDPOINT: &str = "ws://stone.local/ws";

#[tokio::test]
async fn connect_opens_transport_and_reports_connected() {
    let transport = FakeTransport::new();
    let _link = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;

    wait_for_status(&mut events, SessionStatus::Connecting).await;
    wait_for_status(&mut events, SessionStatus::Connected).await;
    assert_eq!(session.status().await, SessionStatus::Connected);
    assert_eq!(transport.connected_endpoints().await, vec![ENDPOINT]);
}

#[tokio::test]
async fn connect_supersedes_existing_link() {
    let transport = FakeTransport::new();
    let mut link1 = transport.accept_next().await;
    let _link2 = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Connected).await;

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Connected).await;
    assert_eq!(transport.connect_count().await, 2);

    // The superseded link is fully closed: its outbound side drains to None.
    timeout(Duration::from_secs(2), async {
        while link1.outbound.recv().await.is_some() {}
    })
    .await
    .expect("first link never closed");
}

#[tokio::test]
async fn failed_connect_retries_after_one_interval() {
    let transport = FakeTransport::new();
    transport.refuse_next().await;
    let _link = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;

    wait_for_status(&mut events, SessionStatus::Reconnecting).await;
    wait_for_status(&mut events, SessionStatus::Connecting).await;
    wait_for_status(&mut events, SessionStatus::Connected).await;
    assert_eq!(transport.connect_count().await, 2);
}

#[tokio::test]
async fn remote_close_reconnects_and_repushes_current_task() {
    let transport = FakeTransport::new();
    let link1 = transport.accept_next().await;
    let mut link2 = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::new(sample_tasks()),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Connected).await;

    // Not a manual disconnect: the device side goes away.
    drop(link1.inbound);

    wait_for_status(&mut events, SessionStatus::Reconnecting).await;
    let reconnecting_seen = Instant::now();
    wait_for_status(&mut events, SessionStatus::Connecting).await;
    assert!(reconnecting_seen.elapsed() >= Duration::from_millis(30));
    wait_for_status(&mut events, SessionStatus::Connected).await;
    assert_eq!(transport.connect_count().await, 2);

    // The fresh link immediately receives the current task's display state.
    let color: serde_json::Value =
        serde_json::from_str(&next_outbound(&mut link2).await).expect("json");
    assert_eq!(color, json!({"cmd": "color", "value": "blue"}));
    let display: serde_json::Value =
        serde_json::from_str(&next_outbound(&mut link2).await).expect("json");
    assert_eq!(display, json!({"cmd": "display", "icon": "run"}));
}

#[tokio::test]
async fn disconnect_cancels_pending_retry() {
    let transport = FakeTransport::new();
    transport.refuse_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Reconnecting).await;

    session.disconnect().await;
    assert_eq!(session.status().await, SessionStatus::Disconnected);

    sleep(fast_policy().interval * 4).await;
    assert_eq!(transport.connect_count().await, 1);
    assert_eq!(session.status().await, SessionStatus::Disconnected);
}

#[tokio::test]
async fn manual_disconnect_does_not_reconnect() {
    let transport = FakeTransport::new();
    let _link = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Connected).await;

    session.disconnect().await;
    sleep(fast_policy().interval * 3).await;
    assert_eq!(transport.connect_count().await, 1);
    assert_eq!(session.status().await, SessionStatus::Disconnected);
}

#[tokio::test]
async fn commands_while_disconnected_touch_no_transport() {
    let transport = FakeTransport::new();
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let dispatcher = CommandDispatcher::new(session.clone());

    dispatcher.vibrate(VibratePattern::Short).await;

    assert_eq!(transport.connect_count().await, 0);
    assert_eq!(session.status().await, SessionStatus::Disconnected);
}

#[tokio::test]
async fn push_task_normalizes_legacy_hex_color() {
    let transport = FakeTransport::new();
    let mut link = transport.accept_next().await;
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        fast_policy(),
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();
    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Connected).await;

    let dispatcher = CommandDispatcher::new(session.clone());
    let care_task = task("t1", "Pour a glass of water", TaskCategory::Care, "#4CAF50");
    dispatcher.push_task(&care_task).await;

    let color: serde_json::Value =
        serde_json::from_str(&next_outbound(&mut link).await).expect("json");
    assert_eq!(color, json!({"cmd": "color", "value": "green"}));
    let display: serde_json::Value =
        serde_json::from_str(&next_outbound(&mut link).await).expect("json");
    assert_eq!(display, json!({"cmd": "display", "icon": "leaf"}));
}

#[tokio::test]
async fn max_attempts_gives_up_instead_of_retrying_forever() {
    let transport = FakeTransport::new();
    transport.refuse_next().await;
    transport.refuse_next().await;
    let policy = crate::RetryPolicy {
        interval: Duration::from_millis(20),
        max_attempts: Some(1),
    };
    let session = DeviceSession::new(
        transport.clone(),
        ScriptedHost::empty(),
        policy,
        ENDPOINT.to_string(),
    );
    let mut events = session.subscribe();

    session.connect().await;
    wait_for_status(&mut events, SessionStatus::Reconnecting).await;
    wait_for_status(&mut events, SessionStatus::Disconnected).await;

    sleep(Duration::from_millis(80)).await;
    assert_eq!(transport.connect_count().await, 2);
}
