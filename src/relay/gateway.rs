use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::relay::message::{RelayEnvelope, RelayMessage, GATEWAY_SENDER};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user_id: String,
}

/// WebSocket upgrade for the interview session relay. The connection is
/// authorized against the participant list before the upgrade completes.
pub async fn session_ws(
    ws: WebSocketUpgrade,
    Path(interview_id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let participant = state
        .interview_service
        .authorize_session(interview_id, &query.user_id)
        .await?;

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, interview_id, query.user_id, participant.display_name, participant.role)
    }))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    interview_id: Uuid,
    user_id: String,
    user_name: String,
    role: crate::models::participant::ParticipantRole,
) {
    let room = match state.rooms.get_or_create(interview_id).await {
        Ok(room) => room,
        Err(e) => {
            tracing::error!(%interview_id, error = ?e, "failed to open relay room");
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<RelayEnvelope>();
    room.join(&user_id, tx).await;
    room.broadcast_from(
        &user_id,
        RelayEnvelope::new(
            GATEWAY_SENDER,
            RelayMessage::ParticipantJoin {
                user_id: user_id.clone(),
                user_name,
                role,
            },
        ),
    )
    .await;
    tracing::info!(%interview_id, user_id, "relay peer connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = ?e, "failed to encode relay envelope");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%interview_id, user_id, error = ?e, "relay socket error");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                let mut envelope: RelayEnvelope = match serde_json::from_str(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(user_id, error = ?e, "dropping malformed relay message");
                        continue;
                    }
                };
                // The connection identity wins over whatever the client
                // put in the envelope.
                envelope.sender_id = user_id.clone();
                room.handle(&user_id, envelope).await;
            }
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            _ => {}
        }
    }

    room.leave(&user_id).await;
    writer.abort();
    state.rooms.remove_if_empty(interview_id).await;
    if let Err(e) = state
        .interview_service
        .mark_left(interview_id, &user_id)
        .await
    {
        tracing::warn!(%interview_id, user_id, error = ?e, "failed to record leave time");
    }
    tracing::info!(%interview_id, user_id, "relay peer disconnected");
}
