use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::models::code_session::ExecutionResult;
use crate::relay::message::{RelayEnvelope, RelayMessage, GATEWAY_SENDER};
use crate::services::execution_client::ExecutionClient;
use crate::store::InterviewStore;
use crate::sync::CodeSyncEngine;

pub type PeerSender = mpsc::UnboundedSender<RelayEnvelope>;

/// One relay room per live interview. Holds the connected peers and the
/// authoritative editor state used to answer resync requests.
pub struct RelayRoom {
    interview_id: Uuid,
    peers: RwLock<HashMap<String, PeerSender>>,
    engine: Mutex<CodeSyncEngine>,
    store: Arc<dyn InterviewStore>,
    execution: Arc<ExecutionClient>,
}

impl RelayRoom {
    pub fn new(
        interview_id: Uuid,
        engine: CodeSyncEngine,
        store: Arc<dyn InterviewStore>,
        execution: Arc<ExecutionClient>,
    ) -> Self {
        Self {
            interview_id,
            peers: RwLock::new(HashMap::new()),
            engine: Mutex::new(engine),
            store,
            execution,
        }
    }

    pub fn interview_id(&self) -> Uuid {
        self.interview_id
    }

    pub async fn join(&self, user_id: &str, sender: PeerSender) {
        self.peers.write().await.insert(user_id.to_string(), sender);
    }

    /// Removes the peer, drops its cursor and notifies the rest of the room.
    pub async fn leave(&self, user_id: &str) {
        self.peers.write().await.remove(user_id);
        self.engine.lock().await.remove_participant(user_id);
        self.broadcast_from(
            user_id,
            RelayEnvelope::new(
                GATEWAY_SENDER,
                RelayMessage::ParticipantLeave {
                    user_id: user_id.to_string(),
                },
            ),
        )
        .await;
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Dispatches one incoming message. Fire-and-forget semantics: fanout
    /// failures prune the dead peer, nothing is retried or queued.
    pub async fn handle(self: &Arc<Self>, sender_id: &str, envelope: RelayEnvelope) {
        match &envelope.message {
            RelayMessage::CodeEdit(edit) => {
                let (code, language) = {
                    let mut engine = self.engine.lock().await;
                    engine.apply_edit(edit);
                    (engine.code(), engine.language().to_string())
                };
                self.persist_code(&code, &language).await;
                self.broadcast_from(sender_id, envelope).await;
            }
            RelayMessage::CursorMove { cursor } => {
                self.engine.lock().await.update_cursor(cursor.clone());
                self.broadcast_from(sender_id, envelope).await;
            }
            RelayMessage::LanguageChange { language } => {
                let (old_code, old_language, new_code) = {
                    let mut engine = self.engine.lock().await;
                    let old_code = engine.code();
                    let old_language = engine.language().to_string();
                    let new_code = engine.change_language(language);
                    (old_code, old_language, new_code)
                };
                if let Err(e) = self
                    .store
                    .append_snapshot(self.interview_id, &old_language, &old_code, "language_change")
                    .await
                {
                    tracing::error!(interview_id = %self.interview_id, error = ?e, "failed to persist snapshot");
                }
                self.persist_code(&new_code, language).await;
                self.broadcast_from(sender_id, envelope).await;
            }
            RelayMessage::CodeExecute { code, language } => {
                self.broadcast_from(sender_id, envelope.clone()).await;
                let room = Arc::clone(self);
                let code = code.clone();
                let language = language.clone();
                tokio::spawn(async move {
                    room.run_execution(&code, &language).await;
                });
            }
            RelayMessage::ExecutionResult(result) => {
                if let Err(e) = self
                    .store
                    .append_execution(self.interview_id, result)
                    .await
                {
                    tracing::error!(interview_id = %self.interview_id, error = ?e, "failed to persist execution result");
                }
                self.broadcast_from(sender_id, envelope).await;
            }
            RelayMessage::SyncRequest {} => {
                let snapshot = self.engine.lock().await.snapshot();
                let reply =
                    RelayEnvelope::new(GATEWAY_SENDER, RelayMessage::SyncResponse(snapshot));
                self.send_to(sender_id, reply).await;
            }
            RelayMessage::SyncResponse(_) => {
                // Only the gateway emits sync responses; one arriving from a
                // peer is ignored.
                tracing::warn!(sender_id, "ignoring sync_response from peer");
            }
            RelayMessage::ParticipantJoin { .. } | RelayMessage::ParticipantLeave { .. } => {
                if let RelayMessage::ParticipantLeave { user_id } = &envelope.message {
                    self.engine.lock().await.remove_participant(user_id);
                }
                self.broadcast_from(sender_id, envelope).await;
            }
        }
    }

    /// Current authoritative editor state, used when the interview ends to
    /// fix the final code.
    pub async fn current_code(&self) -> (String, String) {
        let engine = self.engine.lock().await;
        (engine.code(), engine.language().to_string())
    }

    pub async fn broadcast_from(&self, sender_id: &str, envelope: RelayEnvelope) {
        let mut dead = Vec::new();
        {
            let peers = self.peers.read().await;
            for (peer_id, tx) in peers.iter() {
                if peer_id == sender_id {
                    continue;
                }
                if tx.send(envelope.clone()).is_err() {
                    dead.push(peer_id.clone());
                }
            }
        }
        self.prune(dead).await;
    }

    async fn broadcast_all(&self, envelope: RelayEnvelope) {
        let mut dead = Vec::new();
        {
            let peers = self.peers.read().await;
            for (peer_id, tx) in peers.iter() {
                if tx.send(envelope.clone()).is_err() {
                    dead.push(peer_id.clone());
                }
            }
        }
        self.prune(dead).await;
    }

    async fn send_to(&self, user_id: &str, envelope: RelayEnvelope) {
        let failed = {
            let peers = self.peers.read().await;
            match peers.get(user_id) {
                Some(tx) => tx.send(envelope).is_err(),
                None => false,
            }
        };
        if failed {
            self.prune(vec![user_id.to_string()]).await;
        }
    }

    async fn prune(&self, dead: Vec<String>) {
        if dead.is_empty() {
            return;
        }
        let mut peers = self.peers.write().await;
        for peer_id in dead {
            tracing::debug!(peer_id, "pruning disconnected relay peer");
            peers.remove(&peer_id);
        }
    }

    async fn persist_code(&self, code: &str, language: &str) {
        if let Err(e) = self
            .store
            .update_session_code(self.interview_id, code, language)
            .await
        {
            tracing::error!(interview_id = %self.interview_id, error = ?e, "failed to persist editor state");
        }
    }

    /// Runs the sandboxed execution and fans the result out to everyone,
    /// the requester included. A timeout becomes an error-shaped result so
    /// peers are never left waiting.
    async fn run_execution(self: Arc<Self>, code: &str, language: &str) {
        let result = match self.execution.execute(code, language).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(interview_id = %self.interview_id, error = %e, "code execution failed");
                ExecutionResult {
                    timestamp: chrono::Utc::now(),
                    output: None,
                    error: Some(e.to_string()),
                    runtime_ms: 0,
                    memory_bytes: None,
                    exit_code: 124,
                }
            }
        };
        if let Err(e) = self.store.append_execution(self.interview_id, &result).await {
            tracing::error!(interview_id = %self.interview_id, error = ?e, "failed to persist execution result");
        }
        self.broadcast_all(RelayEnvelope::new(
            GATEWAY_SENDER,
            RelayMessage::ExecutionResult(result),
        ))
        .await;
    }
}

/// Maps interview id to its live relay room, creating rooms lazily from the
/// persisted session state.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<Uuid, Arc<RelayRoom>>>,
    store: Arc<dyn InterviewStore>,
    execution: Arc<ExecutionClient>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn InterviewStore>, execution: Arc<ExecutionClient>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            store,
            execution,
        }
    }

    pub async fn get_or_create(&self, interview_id: Uuid) -> Result<Arc<RelayRoom>> {
        if let Some(room) = self.rooms.read().await.get(&interview_id) {
            return Ok(Arc::clone(room));
        }

        let session = self.store.get_or_create_code_session(interview_id).await?;
        let mut rooms = self.rooms.write().await;
        // Another connection may have raced us here.
        if let Some(room) = rooms.get(&interview_id) {
            return Ok(Arc::clone(room));
        }
        let room = Arc::new(RelayRoom::new(
            interview_id,
            CodeSyncEngine::from_session(&session),
            Arc::clone(&self.store),
            Arc::clone(&self.execution),
        ));
        rooms.insert(interview_id, Arc::clone(&room));
        Ok(room)
    }

    pub async fn get(&self, interview_id: Uuid) -> Option<Arc<RelayRoom>> {
        self.rooms.read().await.get(&interview_id).cloned()
    }

    /// Drops the room once its last peer is gone.
    pub async fn remove_if_empty(&self, interview_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(&interview_id) {
            if room.peer_count().await == 0 {
                rooms.remove(&interview_id);
                tracing::debug!(%interview_id, "relay room closed");
            }
        }
    }
}
