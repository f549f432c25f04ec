//! Workspace facade tests: resync, dispatch and the patch log.

use std::time::Duration;

use orbit_protocol::{ConnectionStatus, Intent, ServerStatus};
use serde_json::json;
use tokio::time::sleep;

mod common;
use common::{MockConnector, add, connect, ids, patch, patches_applied, workspace};

#[tokio::test(start_paused = true)]
async fn test_sync_after_reconnect_replaces_collection() {
    let (connector, mut accepted) = MockConnector::new();
    let ws = workspace(&connector);
    let server = connect(&ws, &mut accepted).await;

    server.push_json(patch(vec![add("a", "Alpha"), add("b", "Beta")]));
    server.push_json(patch(vec![add("c", "Gamma")]));
    patches_applied(&ws, 2).await;
    assert_eq!(ids(&ws), vec!["a", "b", "c"]);

    // While we are away, a and c get deleted by someone else.
    server.close();
    sleep(Duration::from_millis(2_100)).await;
    let mut second = accepted.recv().await.unwrap();
    assert_eq!(second.next_frame().await, json!({ "type": "sync_request" }));

    second.push_json(patch(vec![add("b", "Beta")]));
    patches_applied(&ws, 3).await;
    assert_eq!(ids(&ws), vec!["b"]);

    second.push_json(patch(vec![add("d", "Delta")]));
    patches_applied(&ws, 4).await;
    assert_eq!(ids(&ws), vec!["b", "d"]);

    let resync: Vec<bool> = ws.patch_log().entries().map(|e| e.resync).collect();
    assert_eq!(resync, vec![true, false, true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_request_sync_on_demand() {
    let (connector, mut accepted) = MockConnector::new();
    let ws = workspace(&connector);
    let mut server = connect(&ws, &mut accepted).await;

    server.push_json(patch(vec![add("a", "Alpha"), add("b", "Beta")]));
    patches_applied(&ws, 1).await;

    ws.request_sync();
    assert_eq!(server.next_frame().await, json!({ "type": "sync_request" }));
    server.push_json(patch(vec![add("b", "Beta")]));
    patches_applied(&ws, 2).await;
    assert_eq!(ids(&ws), vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn test_status_and_intents_exposed() {
    let (connector, mut accepted) = MockConnector::new();
    let ws = workspace(&connector);
    let server = connect(&ws, &mut accepted).await;
    assert_eq!(ws.server_status(), ServerStatus::Listening);

    server.push_json(json!({
        "type": "status",
        "status": "thinking",
        "message": "Processing your input...",
    }));
    server.push_json(json!({
        "type": "intent_parsed",
        "intents": [
            { "type": "set_priority", "target": "the Bob call", "priority": "urgent" },
            { "type": "set_priority", "target": "missing priority" },
            { "type": "summon_llama" },
        ],
    }));
    server.push_json(json!({ "type": "status", "status": "synced" }));

    ws.subscribe_server_status()
        .wait_for(|s| *s == ServerStatus::Synced)
        .await
        .unwrap();

    let intents = ws.last_intents();
    assert_eq!(intents.len(), 2);
    assert_eq!(intents[0].target(), Some("the Bob call"));
    assert_eq!(intents[1], Intent::Unknown);
    assert!(ws.status_message().is_none());

    // Informational messages never touch the collection.
    assert!(ws.components().is_empty());
    assert!(ws.patch_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_updates_and_reorders_flow_through() {
    let (connector, mut accepted) = MockConnector::new();
    let ws = workspace(&connector);
    let server = connect(&ws, &mut accepted).await;

    server.push_json(patch(vec![
        add("a", "Alpha"),
        add("b", "Beta"),
        add("c", "Gamma"),
    ]));
    server.push_json(patch(vec![
        json!({ "op": "update", "componentId": "b", "changes": { "title": "Z", "priority": "high", "date": null } }),
        json!({ "op": "reorder", "componentId": "a", "newIndex": 99 }),
        json!({ "op": "remove", "componentId": "nope" }),
    ]));
    patches_applied(&ws, 2).await;

    assert_eq!(ids(&ws), vec!["b", "c", "a"]);
    let b = ws.component("b").unwrap();
    assert_eq!(b.title, "Z");
    assert_eq!(b.description.as_deref(), Some(""));
    // No updatedAt in the change set, so the server's stamp stands.
    assert_eq!(b.updated_at, b.created_at);
    assert_eq!(ws.component("a").unwrap().updated_at, b.created_at);
    assert!(ws.component("nope").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_connection_status_tracks_transport() {
    let (connector, mut accepted) = MockConnector::new();
    let ws = workspace(&connector);
    assert_eq!(ws.connection_status(), ConnectionStatus::Disconnected);

    let server = connect(&ws, &mut accepted).await;
    assert_eq!(ws.connection_status(), ConnectionStatus::Connected);

    drop(server);
    ws.subscribe_connection()
        .wait_for(|s| *s == ConnectionStatus::Disconnected)
        .await
        .unwrap();

    ws.shutdown().await;
}
