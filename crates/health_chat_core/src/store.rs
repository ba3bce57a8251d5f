//! crates/health_chat_core/src/store.rs
//!
//! The local persistence adapter. The whole session collection lives as one JSON
//! blob under a single key of a `KeyValueStore`, next to the remote conversation
//! identifiers. Every save overwrites the blob; there is no merge or versioning.

use crate::domain::{Feedback, Message, Role, Session};
use crate::ports::{KeyValueStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Key holding the JSON-encoded session collection.
pub const SESSIONS_KEY: &str = "chat_sessions";

/// Key holding the most recently used remote conversation identifier.
pub const SESSION_ID_KEY: &str = "chat_session_id";

/// Key holding the remote conversation identifier of one local session.
pub fn session_id_key(session_id: Uuid) -> String {
    format!("{SESSION_ID_KEY}_{session_id}")
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Reads the stored collection. A missing, unreadable or malformed blob
    /// yields an empty collection.
    pub async fn load(&self) -> Vec<Session> {
        let raw = match self.kv.get(SESSIONS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read stored sessions, starting empty: {}", e);
                return Vec::new();
            }
        };

        let records = match serde_json::from_str::<Vec<SessionRecord>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("Stored sessions are malformed, starting empty: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        records
            .into_iter()
            .map(SessionRecord::to_domain)
            .filter(|session| seen.insert(session.id))
            .collect()
    }

    /// Overwrites the stored collection with `sessions`.
    pub async fn save(&self, sessions: &[Session]) -> PortResult<()> {
        let records: Vec<SessionRecord> = sessions.iter().map(SessionRecord::from_domain).collect();
        let json =
            serde_json::to_string(&records).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(SESSIONS_KEY, &json).await
    }

    /// Removes the stored collection entirely.
    pub async fn clear(&self) -> PortResult<()> {
        self.kv.remove(SESSIONS_KEY).await
    }

    /// The identifier the remote side last gave for `session_id`, if one was stored.
    pub async fn remote_session_id(&self, session_id: Uuid) -> Option<String> {
        self.read_optional(&session_id_key(session_id)).await
    }

    /// Records `remote_id` for `session_id` and as the freestanding identifier.
    pub async fn set_remote_session_id(&self, session_id: Uuid, remote_id: &str) -> PortResult<()> {
        self.kv.set(&session_id_key(session_id), remote_id).await?;
        self.kv.set(SESSION_ID_KEY, remote_id).await
    }

    pub async fn forget_remote_session_id(&self, session_id: Uuid) -> PortResult<()> {
        self.kv.remove(&session_id_key(session_id)).await
    }

    pub async fn freestanding_session_id(&self) -> Option<String> {
        self.read_optional(SESSION_ID_KEY).await
    }

    async fn read_optional(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read '{}' from the store: {}", key, e);
                None
            }
        }
    }
}

//=========================================================================================
// Persisted Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    id: Uuid,
    title: String,
    messages: Vec<MessageRecord>,
    #[serde(with = "ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    updated_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            title: self.title,
            messages: self.messages.into_iter().map(MessageRecord::to_domain).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_domain(session: &Session) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            messages: session.messages.iter().map(MessageRecord::from_domain).collect(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MessageRecord {
    role: RoleRecord,
    content: String,
    #[serde(with = "ts_milliseconds")]
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feedback: Option<FeedbackRecord>,
}

impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            role: match self.role {
                RoleRecord::User => Role::User,
                RoleRecord::Assistant => Role::Assistant,
            },
            content: self.content,
            timestamp: self.timestamp,
            feedback: self.feedback.map(|f| match f {
                FeedbackRecord::Up => Feedback::Up,
                FeedbackRecord::Down => Feedback::Down,
            }),
        }
    }

    fn from_domain(message: &Message) -> Self {
        Self {
            role: match message.role {
                Role::User => RoleRecord::User,
                Role::Assistant => RoleRecord::Assistant,
            },
            content: message.content.clone(),
            timestamp: message.timestamp,
            feedback: message.feedback.map(|f| match f {
                Feedback::Up => FeedbackRecord::Up,
                Feedback::Down => FeedbackRecord::Down,
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RoleRecord {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FeedbackRecord {
    Up,
    Down,
}

//=========================================================================================
// In-memory substrate
//=========================================================================================

/// A `KeyValueStore` that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
