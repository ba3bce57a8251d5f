//! crates/health_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) the conversation core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the HTTP client and of whatever key-value substrate holds state.

use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (network, disk, database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Remote chat payloads
//=========================================================================================

/// One outgoing chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    /// The opaque conversation identifier the remote side knows this session by.
    pub session_id: String,
    /// Patient email, sent along when the profile endpoint provided one.
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    /// May differ from the identifier that was sent; the next request should use it.
    pub session_id: String,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends one user message. Fails on any transport error or non-success status.
    async fn send_chat(&self, request: ChatRequest) -> PortResult<ChatReply>;
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Name of the patient behind the most recent data record, if any.
    async fn fetch_latest_patient_name(&self) -> PortResult<Option<String>>;

    async fn fetch_profile_name(&self) -> PortResult<Option<String>>;

    async fn fetch_profile_email(&self) -> PortResult<Option<String>>;
}

/// A flat string key-value store. Writes replace the whole value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}
