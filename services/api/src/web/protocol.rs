//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between a chat UI and this service.
//! Every view is derived from the conversation core; nothing here holds state.

use chrono::{DateTime, Utc};
use health_chat_core::{Feedback, Message, PatientProfile, QuickAction, Role, Session};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Requests FROM the UI
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct SendMessageRequest {
    /// The raw input box text; surrounding whitespace is ignored.
    pub text: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct FeedbackRequest {
    pub value: FeedbackDto,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
pub struct ListSessionsQuery {
    /// Case-insensitive search over titles and first messages.
    pub q: Option<String>,
}

//=========================================================================================
// Responses TO the UI
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    User,
    Assistant,
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        match role {
            Role::User => RoleDto::User,
            Role::Assistant => RoleDto::Assistant,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackDto {
    Up,
    Down,
}

impl From<Feedback> for FeedbackDto {
    fn from(feedback: Feedback) -> Self {
        match feedback {
            Feedback::Up => FeedbackDto::Up,
            Feedback::Down => FeedbackDto::Down,
        }
    }
}

impl From<FeedbackDto> for Feedback {
    fn from(feedback: FeedbackDto) -> Self {
        match feedback {
            FeedbackDto::Up => Feedback::Up,
            FeedbackDto::Down => Feedback::Down,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct MessageView {
    /// Position within the session; feedback is addressed by it.
    pub index: usize,
    pub role: RoleDto,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub feedback: Option<FeedbackDto>,
}

impl MessageView {
    fn new(index: usize, message: &Message) -> Self {
        Self {
            index,
            role: message.role.into(),
            content: message.content.clone(),
            timestamp: message.timestamp,
            feedback: message.feedback.map(Into::into),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub messages: Vec<MessageView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// True while a chat request for this session is outstanding.
    pub awaiting_reply: bool,
}

impl SessionView {
    pub fn new(session: &Session, awaiting_reply: bool) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            description: session.description(),
            messages: session
                .messages
                .iter()
                .enumerate()
                .map(|(i, m)| MessageView::new(i, m))
                .collect(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            awaiting_reply,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl SessionSummary {
    pub fn new(session: &Session, active_id: Option<Uuid>) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            description: session.description(),
            updated_at: session.updated_at,
            active: active_id == Some(session.id),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SessionListResponse {
    pub active_id: Option<Uuid>,
    /// Sessions updated within the last seven days, newest-created first.
    pub recent: Vec<SessionSummary>,
    pub older: Vec<SessionSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// The assistant's reply was appended.
    Replied,
    /// The remote call failed; the apology was appended instead.
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SendMessageResponse {
    pub status: SendStatus,
    pub session: SessionView,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ProfileResponse {
    pub display_name: String,
    pub initials: String,
    pub email: Option<String>,
}

impl From<&PatientProfile> for ProfileResponse {
    fn from(profile: &PatientProfile) -> Self {
        Self {
            display_name: profile.display_name(),
            initials: profile.initials(),
            email: profile.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct QuickActionView {
    pub id: String,
    pub label: String,
}

impl From<&QuickAction> for QuickActionView {
    fn from(action: &QuickAction) -> Self {
        Self {
            id: action.id.to_string(),
            label: action.label.to_string(),
        }
    }
}
