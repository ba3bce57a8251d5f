//! crates/health_chat_core/src/conversation.rs
//!
//! The conversation state machine. It owns the session collection and the active
//! session, and drives each send through Sending -> AwaitingReply -> Resolved:
//! the user message is appended and persisted before the remote call is made, and
//! exactly one assistant message (the reply or a fixed apology) is appended after
//! the call settles.

use crate::domain::{
    group_by_recency, DomainError, Feedback, Message, PatientProfile, Session, SessionGroups,
};
use crate::ports::{ChatRequest, ChatService, PortError, PortResult, ProfileService};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Assistant text appended when the remote chat call fails.
pub const SEND_FAILURE_MESSAGE: &str = "Error contacting server. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    #[error("Invalid message operation: {0}")]
    Domain(#[from] DomainError),
    #[error("Session store error: {0}")]
    Store(#[from] PortError),
}

/// What became of one send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The input was blank; nothing changed and nothing was sent.
    Ignored,
    /// The session still has a request in flight; the input was rejected.
    Busy(Uuid),
    /// The remote reply was appended.
    Replied(Session),
    /// The remote call failed and the apology was appended.
    Failed(Session),
    /// The session was cleared while its request was in flight; the reply was dropped.
    Discarded(Uuid),
}

//=========================================================================================
// Internal state
//=========================================================================================

#[derive(Default)]
struct ConversationState {
    /// Newest-created first.
    sessions: Vec<Session>,
    active_id: Option<Uuid>,
    in_flight: HashSet<Uuid>,
    profile: PatientProfile,
}

impl ConversationState {
    fn position(&self, session_id: Uuid) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == session_id)
    }

    fn find(&self, session_id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    fn active_session(&self) -> Option<&Session> {
        self.active_id.and_then(|id| self.find(id))
    }

    fn insert_new_session(&mut self) -> Session {
        let session = Session::new();
        self.sessions.insert(0, session.clone());
        self.active_id = Some(session.id);
        session
    }

    /// The collection with `session` replacing the entry at `index`.
    fn sessions_with(&self, index: usize, session: &Session) -> Vec<Session> {
        let mut sessions = self.sessions.clone();
        sessions[index] = session.clone();
        sessions
    }
}

//=========================================================================================
// The State Machine
//=========================================================================================

pub struct Conversation {
    store: SessionStore,
    chat: Arc<dyn ChatService>,
    profiles: Arc<dyn ProfileService>,
    state: Mutex<ConversationState>,
}

impl Conversation {
    /// Loads the stored sessions and makes the newest one active.
    pub async fn open(
        store: SessionStore,
        chat: Arc<dyn ChatService>,
        profiles: Arc<dyn ProfileService>,
    ) -> Self {
        let sessions = store.load().await;
        let active_id = sessions.first().map(|s| s.id);
        info!("Loaded {} stored session(s).", sessions.len());
        if let Some(remote_id) = store.freestanding_session_id().await {
            debug!("Last remote session id: {}", remote_id);
        }

        Self {
            store,
            chat,
            profiles,
            state: Mutex::new(ConversationState {
                sessions,
                active_id,
                ..Default::default()
            }),
        }
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    pub async fn session(&self, session_id: Uuid) -> Option<Session> {
        self.state.lock().await.find(session_id).cloned()
    }

    pub async fn active_id(&self) -> Option<Uuid> {
        self.state.lock().await.active_session().map(|s| s.id)
    }

    pub async fn active_session(&self) -> Option<Session> {
        self.state.lock().await.active_session().cloned()
    }

    pub async fn is_awaiting_reply(&self, session_id: Uuid) -> bool {
        self.state.lock().await.in_flight.contains(&session_id)
    }

    /// Sessions whose title or first message matches `query`.
    pub async fn search(&self, query: &str) -> Vec<Session> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .filter(|s| s.matches_query(query))
            .cloned()
            .collect()
    }

    /// Matching sessions split into the last seven days and everything older.
    pub async fn grouped(&self, query: &str, now: DateTime<Utc>) -> SessionGroups {
        group_by_recency(&self.search(query).await, now)
    }

    /// Creates an empty session at the top of the list and makes it active.
    /// Nothing changes unless the new collection was stored.
    pub async fn new_session(&self) -> Result<Session, ConversationError> {
        let mut state = self.state.lock().await;
        let session = Session::new();
        let mut sessions = Vec::with_capacity(state.sessions.len() + 1);
        sessions.push(session.clone());
        sessions.extend(state.sessions.iter().cloned());
        self.store.save(&sessions).await?;

        state.sessions = sessions;
        state.active_id = Some(session.id);
        info!("Created session {}.", session.id);
        Ok(session)
    }

    pub async fn select_session(&self, session_id: Uuid) -> Result<Session, ConversationError> {
        let mut state = self.state.lock().await;
        let session = state
            .find(session_id)
            .cloned()
            .ok_or(ConversationError::SessionNotFound(session_id))?;
        state.active_id = Some(session_id);
        debug!("Session {} is now active.", session_id);
        Ok(session)
    }

    /// Sends `text` to the active session, creating one first if none is active.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let mut state = self.state.lock().await;
        let active_id = state.active_session().map(|s| s.id);
        let session_id = match active_id {
            Some(id) => id,
            None => {
                let session = state.insert_new_session();
                info!("No active session; created {} for the first message.", session.id);
                session.id
            }
        };
        self.send_locked(state, session_id, text).await
    }

    /// Sends `text` to a specific session.
    pub async fn send_message_to(
        &self,
        session_id: Uuid,
        text: &str,
    ) -> Result<SendOutcome, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let state = self.state.lock().await;
        if state.find(session_id).is_none() {
            return Err(ConversationError::SessionNotFound(session_id));
        }
        self.send_locked(state, session_id, text).await
    }

    async fn send_locked(
        &self,
        mut state: MutexGuard<'_, ConversationState>,
        session_id: Uuid,
        text: &str,
    ) -> Result<SendOutcome, ConversationError> {
        if state.in_flight.contains(&session_id) {
            info!("Session {} already awaits a reply; rejecting send.", session_id);
            return Ok(SendOutcome::Busy(session_id));
        }
        let index = state
            .position(session_id)
            .ok_or(ConversationError::SessionNotFound(session_id))?;

        // --- Sending: optimistic append, persisted before anything leaves the process ---
        let current = &state.sessions[index];
        let title = current.derive_title(text);
        let mut next = current.append_message(Message::user(text));
        next.title = title;
        state.sessions[index] = next;
        state.in_flight.insert(session_id);
        if let Err(e) = self.store.save(&state.sessions).await {
            error!("Failed to persist user message for session {}: {}", session_id, e);
        }

        let sent_id = self
            .store
            .remote_session_id(session_id)
            .await
            .unwrap_or_else(|| session_id.to_string());
        let request = ChatRequest {
            message: text.to_string(),
            session_id: sent_id.clone(),
            email: state.profile.email.clone(),
        };
        drop(state);

        // --- AwaitingReply ---
        debug!("Dispatching chat request for session {}.", session_id);
        let result = self.chat.send_chat(request).await;

        // --- Resolved ---
        let mut state = self.state.lock().await;
        state.in_flight.remove(&session_id);
        let Some(index) = state.position(session_id) else {
            warn!("Session {} was cleared before its reply arrived; dropping it.", session_id);
            return Ok(SendOutcome::Discarded(session_id));
        };

        let (reply, succeeded) = match result {
            Ok(reply) => {
                if !reply.session_id.is_empty() && reply.session_id != sent_id {
                    info!(
                        "Remote rotated the session id for {} to {}.",
                        session_id, reply.session_id
                    );
                    if let Err(e) = self
                        .store
                        .set_remote_session_id(session_id, &reply.session_id)
                        .await
                    {
                        error!("Failed to store rotated session id for {}: {}", session_id, e);
                    }
                }
                (Message::assistant(reply.response), true)
            }
            Err(e) => {
                warn!("Chat request for session {} failed: {}", session_id, e);
                (Message::assistant(SEND_FAILURE_MESSAGE), false)
            }
        };

        let next = state.sessions[index].append_message(reply);
        state.sessions[index] = next.clone();
        if let Err(e) = self.store.save(&state.sessions).await {
            error!("Failed to persist reply for session {}: {}", session_id, e);
        }

        Ok(if succeeded {
            SendOutcome::Replied(next)
        } else {
            SendOutcome::Failed(next)
        })
    }

    /// Toggles thumbs up/down on the assistant message at `index`. Purely local; the
    /// change is kept only once it has been stored.
    pub async fn set_feedback(
        &self,
        session_id: Uuid,
        index: usize,
        feedback: Feedback,
    ) -> Result<Session, ConversationError> {
        let mut state = self.state.lock().await;
        let position = state
            .position(session_id)
            .ok_or(ConversationError::SessionNotFound(session_id))?;
        let next = state.sessions[position].with_feedback(index, feedback)?;
        let sessions = state.sessions_with(position, &next);
        self.store.save(&sessions).await?;
        state.sessions = sessions;
        Ok(next)
    }

    /// Removes every session from storage and memory. No session is active afterwards.
    pub async fn clear_all(&self) -> Result<(), ConversationError> {
        let mut state = self.state.lock().await;
        self.store.clear().await?;
        for session in &state.sessions {
            if let Err(e) = self.store.forget_remote_session_id(session.id).await {
                warn!("Failed to forget remote id of session {}: {}", session.id, e);
            }
        }
        let cleared = state.sessions.len();
        state.sessions.clear();
        state.active_id = None;
        state.in_flight.clear();
        info!("Cleared {} session(s).", cleared);
        Ok(())
    }

    pub async fn profile(&self) -> PatientProfile {
        self.state.lock().await.profile.clone()
    }

    /// Asks the profile collaborator for the patient's name and email. Failures
    /// leave the corresponding field as it was.
    pub async fn refresh_profile(&self) -> PatientProfile {
        let (latest, name, email) = futures::join!(
            self.profiles.fetch_latest_patient_name(),
            self.profiles.fetch_profile_name(),
            self.profiles.fetch_profile_email(),
        );
        let name = swallow("profile name", name).or_else(|| swallow("latest patient name", latest));
        let email = swallow("profile email", email);

        let mut state = self.state.lock().await;
        if name.is_some() {
            state.profile.name = name;
        }
        if email.is_some() {
            state.profile.email = email;
        }
        state.profile.clone()
    }
}

fn swallow<T>(what: &str, result: PortResult<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring failed {} lookup: {}", what, e);
            None
        }
    }
}
