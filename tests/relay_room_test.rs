use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use interview_backend::relay::{RelayEnvelope, RelayMessage, RelayRoom, RoomRegistry};
use interview_backend::services::execution_client::ExecutionClient;
use interview_backend::store::{InterviewStore, MemoryStore};
use interview_backend::sync::{
    CodeEdit, CollaborativeCursor, CursorPosition, EditKind, EditRange,
};

async fn setup_room() -> (Arc<MemoryStore>, Arc<RoomRegistry>, Arc<RelayRoom>, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let execution = Arc::new(ExecutionClient::new(None, 30));
    let registry = Arc::new(RoomRegistry::new(
        Arc::clone(&store) as Arc<dyn InterviewStore>,
        execution,
    ));
    let interview_id = Uuid::new_v4();
    let room = registry.get_or_create(interview_id).await.unwrap();
    (store, registry, room, interview_id)
}

async fn join_peer(room: &Arc<RelayRoom>, user_id: &str) -> mpsc::UnboundedReceiver<RelayEnvelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    room.join(user_id, tx).await;
    rx
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<RelayEnvelope>) -> RelayEnvelope {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for relay message")
        .expect("relay channel closed")
}

fn replace_all_with(text: &str) -> RelayEnvelope {
    RelayEnvelope::new(
        "user-a",
        RelayMessage::CodeEdit(CodeEdit {
            kind: EditKind::Replace,
            range: EditRange {
                start_line: 1,
                start_column: 1,
                end_line: 9999,
                end_column: 9999,
            },
            text: text.to_string(),
            user_id: "user-a".to_string(),
            timestamp: Utc::now(),
        }),
    )
}

#[tokio::test]
async fn edits_fan_out_to_everyone_but_the_sender() {
    let (_store, _registry, room, _id) = setup_room().await;
    let mut rx_a = join_peer(&room, "user-a").await;
    let mut rx_b = join_peer(&room, "user-b").await;

    room.handle("user-a", replace_all_with("print(1)")).await;

    let received = recv(&mut rx_b).await;
    assert_eq!(received.sender_id, "user-a");
    match received.message {
        RelayMessage::CodeEdit(edit) => assert_eq!(edit.text, "print(1)"),
        other => panic!("unexpected message: {:?}", other),
    }
    // The sender does not get its own edit back.
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn sync_response_carries_the_authoritative_state() {
    let (_store, _registry, room, _id) = setup_room().await;
    let mut rx_a = join_peer(&room, "user-a").await;
    let mut rx_b = join_peer(&room, "user-b").await;

    room.handle("user-a", replace_all_with("print(1)")).await;
    let _ = recv(&mut rx_b).await;

    room.handle(
        "user-b",
        RelayEnvelope::new("user-b", RelayMessage::SyncRequest {}),
    )
    .await;

    let reply = recv(&mut rx_b).await;
    assert_eq!(reply.sender_id, "gateway");
    match reply.message {
        RelayMessage::SyncResponse(snapshot) => {
            assert_eq!(snapshot.code, "print(1)");
            assert_eq!(snapshot.language, "javascript");
        }
        other => panic!("unexpected message: {:?}", other),
    }
    // Resync is a direct reply, not a broadcast.
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn edits_write_through_to_the_persisted_session() {
    let (store, _registry, room, interview_id) = setup_room().await;
    let _rx_a = join_peer(&room, "user-a").await;

    room.handle("user-a", replace_all_with("print(1)")).await;

    let session = store
        .get_code_session(interview_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.code, "print(1)");
}

#[tokio::test]
async fn language_change_snapshots_old_code_and_resets_the_buffer() {
    let (store, _registry, room, interview_id) = setup_room().await;
    let _rx_a = join_peer(&room, "user-a").await;
    let mut rx_b = join_peer(&room, "user-b").await;

    room.handle("user-a", replace_all_with("console.log(1)")).await;
    let _ = recv(&mut rx_b).await;

    room.handle(
        "user-a",
        RelayEnvelope::new(
            "user-a",
            RelayMessage::LanguageChange {
                language: "python".to_string(),
            },
        ),
    )
    .await;

    let received = recv(&mut rx_b).await;
    assert!(matches!(
        received.message,
        RelayMessage::LanguageChange { .. }
    ));

    let session = store
        .get_code_session(interview_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.language, "python");
    assert!(session.code.starts_with("# Python"));
    assert_eq!(session.snapshots.len(), 1);
    assert_eq!(session.snapshots[0].reason, "language_change");
    assert_eq!(session.snapshots[0].code, "console.log(1)");
    assert_eq!(session.snapshots[0].language, "javascript");
}

#[tokio::test]
async fn leaving_drops_the_cursor_and_notifies_the_room() {
    let (_store, _registry, room, _id) = setup_room().await;
    let _rx_a = join_peer(&room, "user-a").await;
    let mut rx_b = join_peer(&room, "user-b").await;

    room.handle(
        "user-a",
        RelayEnvelope::new(
            "user-a",
            RelayMessage::CursorMove {
                cursor: CollaborativeCursor {
                    user_id: "user-a".to_string(),
                    user_name: "Ana".to_string(),
                    color: "#ff0000".to_string(),
                    position: CursorPosition { line: 1, column: 4 },
                    selection: None,
                },
            },
        ),
    )
    .await;
    let _ = recv(&mut rx_b).await;

    room.leave("user-a").await;

    let received = recv(&mut rx_b).await;
    match received.message {
        RelayMessage::ParticipantLeave { user_id } => assert_eq!(user_id, "user-a"),
        other => panic!("unexpected message: {:?}", other),
    }

    room.handle(
        "user-b",
        RelayEnvelope::new("user-b", RelayMessage::SyncRequest {}),
    )
    .await;
    match recv(&mut rx_b).await.message {
        RelayMessage::SyncResponse(snapshot) => assert!(snapshot.cursors.is_empty()),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn execution_results_reach_everyone_including_the_requester() {
    let (store, _registry, room, interview_id) = setup_room().await;
    let mut rx_a = join_peer(&room, "user-a").await;
    let mut rx_b = join_peer(&room, "user-b").await;

    room.handle(
        "user-a",
        RelayEnvelope::new(
            "user-a",
            RelayMessage::CodeExecute {
                code: "print(1)".to_string(),
                language: "python".to_string(),
            },
        ),
    )
    .await;

    // Others see the run starting; the requester does not get an echo.
    match recv(&mut rx_b).await.message {
        RelayMessage::CodeExecute { language, .. } => assert_eq!(language, "python"),
        other => panic!("unexpected message: {:?}", other),
    }

    // Without an execution backend the gateway answers with a placeholder
    // result, fanned out to the whole room.
    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await.message {
            RelayMessage::ExecutionResult(result) => {
                assert_eq!(result.exit_code, 0);
                assert!(result.output.is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    let session = store
        .get_code_session(interview_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.execution_history.len(), 1);
}

#[tokio::test]
async fn registry_drops_empty_rooms_and_keeps_occupied_ones() {
    let (_store, registry, room, interview_id) = setup_room().await;
    let _rx_a = join_peer(&room, "user-a").await;

    registry.remove_if_empty(interview_id).await;
    assert!(registry.get(interview_id).await.is_some());

    room.leave("user-a").await;
    registry.remove_if_empty(interview_id).await;
    assert!(registry.get(interview_id).await.is_none());

    // A later connection recreates the room from the persisted session.
    let recreated = registry.get_or_create(interview_id).await.unwrap();
    assert_eq!(recreated.interview_id(), interview_id);
}
