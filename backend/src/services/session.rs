//! Session registry - one actor task per conversation
//!
//! Each session's [`ConversationStateMachine`] lives inside its own task and
//! is driven through an mpsc channel with oneshot replies. Turns for one
//! session are therefore processed strictly in arrival order while separate
//! sessions run in parallel. The registry map lock is only held to look up or
//! insert a handle, never across an await.
//!
//! An actor that receives nothing for `idle_timeout_secs` stops and removes
//! its own entry from the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use shared::{RecommendationContextStore, SessionState};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use super::conversation::{ConversationStateMachine, TurnResponse};
use crate::config::SessionConfig;
use crate::error::{AppError, AppResult};
use crate::external::Collaborators;

/// One operation against a running session
#[derive(Debug)]
pub enum TurnRequest {
    Detection(String),
    Image(Vec<u8>),
    Location(String),
    FieldNotes(String),
    MenuSelection(u32),
    Question(String),
    Input(String),
}

impl TurnRequest {
    fn name(&self) -> &'static str {
        match self {
            TurnRequest::Detection(_) => "detection",
            TurnRequest::Image(_) => "image",
            TurnRequest::Location(_) => "location",
            TurnRequest::FieldNotes(_) => "field_notes",
            TurnRequest::MenuSelection(_) => "menu_selection",
            TurnRequest::Question(_) => "question",
            TurnRequest::Input(_) => "input",
        }
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub store: RecommendationContextStore,
}

/// Commands sent to a session actor
#[derive(Debug)]
enum SessionCommand {
    Turn {
        request: TurnRequest,
        reply: oneshot::Sender<AppResult<TurnResponse>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    End {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

#[derive(Clone)]
struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

type SessionMap = Arc<Mutex<HashMap<Uuid, SessionHandle>>>;

fn lock(sessions: &SessionMap) -> MutexGuard<'_, HashMap<Uuid, SessionHandle>> {
    sessions.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns every live session
pub struct SessionRegistry {
    collaborators: Collaborators,
    channel_capacity: usize,
    product_results: usize,
    idle_timeout: Duration,
    sessions: SessionMap,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, config: &SessionConfig) -> Self {
        Self {
            collaborators,
            channel_capacity: config.channel_capacity.max(1),
            product_results: config.product_results,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.max(1)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a new session; it is already awaiting a detection on return
    pub fn create(&self) -> AppResult<(Uuid, TurnResponse)> {
        let mut machine = ConversationStateMachine::new(self.collaborators.clone())
            .with_product_results(self.product_results);
        let response = machine.start()?;
        let id = self.spawn(machine);
        Ok((id, response))
    }

    /// Continue from a store returned by an earlier [`end`](Self::end)
    pub fn resume(&self, store: RecommendationContextStore) -> AppResult<SessionSnapshot> {
        let machine = ConversationStateMachine::resume(self.collaborators.clone(), store.clone())?
            .with_product_results(self.product_results);
        let state = machine.state();
        let id = self.spawn(machine);
        Ok(SessionSnapshot {
            session_id: id,
            state,
            store,
        })
    }

    pub async fn submit(&self, id: Uuid, request: TurnRequest) -> AppResult<TurnResponse> {
        debug!(session_id = %id, request = request.name(), "Submitting turn");
        let handle = self.handle(id)?;
        let (reply, rx) = oneshot::channel();
        self.send(id, &handle, SessionCommand::Turn { request, reply })
            .await?;
        let response = rx.await.map_err(|_| AppError::SessionNotFound(id))??;

        if response.state.is_terminated() {
            self.remove(id);
        }
        Ok(response)
    }

    pub async fn snapshot(&self, id: Uuid) -> AppResult<SessionSnapshot> {
        let handle = self.handle(id)?;
        let (reply, rx) = oneshot::channel();
        self.send(id, &handle, SessionCommand::Snapshot { reply })
            .await?;
        rx.await.map_err(|_| AppError::SessionNotFound(id))
    }

    /// Terminate a session and return its final store
    pub async fn end(&self, id: Uuid) -> AppResult<SessionSnapshot> {
        let handle = self.remove(id).ok_or(AppError::SessionNotFound(id))?;
        let (reply, rx) = oneshot::channel();
        handle
            .tx
            .send(SessionCommand::End { reply })
            .await
            .map_err(|_| AppError::SessionNotFound(id))?;
        rx.await.map_err(|_| AppError::SessionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn(&self, machine: ConversationStateMachine) -> Uuid {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.sessions().insert(id, SessionHandle { tx });
        tokio::spawn(actor_loop(
            id,
            machine,
            rx,
            self.idle_timeout,
            Arc::clone(&self.sessions),
        ));
        info!(session_id = %id, "Session spawned");
        id
    }

    fn handle(&self, id: Uuid) -> AppResult<SessionHandle> {
        self.sessions()
            .get(&id)
            .cloned()
            .ok_or(AppError::SessionNotFound(id))
    }

    fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions().remove(&id)
    }

    /// A closed channel means the actor exited, so the handle is dropped too
    async fn send(&self, id: Uuid, handle: &SessionHandle, cmd: SessionCommand) -> AppResult<()> {
        if handle.tx.send(cmd).await.is_err() {
            self.remove(id);
            return Err(AppError::SessionNotFound(id));
        }
        Ok(())
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, SessionHandle>> {
        lock(&self.sessions)
    }
}

async fn actor_loop(
    id: Uuid,
    mut machine: ConversationStateMachine,
    mut rx: mpsc::Receiver<SessionCommand>,
    idle_timeout: Duration,
    sessions: SessionMap,
) {
    debug!(session_id = %id, "Session actor started");

    loop {
        let cmd = match timeout(idle_timeout, rx.recv()).await {
            Ok(Some(cmd)) => cmd,
            Ok(None) => break,
            Err(_) => {
                info!(
                    session_id = %id,
                    idle_secs = idle_timeout.as_secs(),
                    "Session idle, closing"
                );
                break;
            }
        };

        match cmd {
            SessionCommand::Turn { request, reply } => {
                let result = match request {
                    TurnRequest::Detection(raw) => machine.submit_detection(&raw).await,
                    TurnRequest::Image(bytes) => machine.submit_image(&bytes).await,
                    TurnRequest::Location(zip) => machine.submit_location(&zip).await,
                    TurnRequest::FieldNotes(text) => machine.submit_field_notes(&text).await,
                    TurnRequest::MenuSelection(n) => machine.submit_menu_selection(n).await,
                    TurnRequest::Question(text) => machine.submit_custom_question(&text).await,
                    TurnRequest::Input(text) => machine.submit_input(&text).await,
                };
                let _ = reply.send(result);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    session_id: id,
                    state: machine.state(),
                    store: machine.store().clone(),
                });
            }

            SessionCommand::End { reply } => {
                let store = machine.end();
                let _ = reply.send(SessionSnapshot {
                    session_id: id,
                    state: machine.state(),
                    store,
                });
            }
        }

        if machine.state().is_terminated() {
            break;
        }
    }

    lock(&sessions).remove(&id);
    info!(session_id = %id, turns = machine.store().history().len(), "Session actor stopped");
}
