//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.

use crate::web::protocol::{
    FeedbackDto, FeedbackRequest, ListSessionsQuery, MessageView, ProfileResponse,
    QuickActionView, RoleDto, SendMessageRequest, SendMessageResponse, SendStatus,
    SessionListResponse, SessionSummary, SessionView,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use health_chat_core::{
    Conversation, ConversationError, DomainError, SendOutcome, Session, QUICK_ACTIONS,
};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sessions_handler,
        create_session_handler,
        clear_sessions_handler,
        get_session_handler,
        activate_session_handler,
        send_to_session_handler,
        send_to_active_handler,
        feedback_handler,
        profile_handler,
        quick_actions_handler,
    ),
    components(
        schemas(
            SessionListResponse, SessionSummary, SessionView, MessageView, RoleDto, FeedbackDto,
            SendMessageRequest, SendMessageResponse, SendStatus, FeedbackRequest,
            ProfileResponse, QuickActionView
        )
    ),
    tags(
        (name = "Health Assistant Chat", description = "Conversation state for the health assistant chat UI.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

//=========================================================================================
// Error and View Helpers
//=========================================================================================

fn conversation_error(e: ConversationError) -> HandlerError {
    match e {
        ConversationError::SessionNotFound(id) => {
            (StatusCode::NOT_FOUND, format!("Session {} not found", id))
        }
        ConversationError::Domain(e @ DomainError::MessageNotFound(_)) => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        ConversationError::Domain(e @ DomainError::NotAnAssistantMessage(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        ConversationError::Store(e) => {
            error!("Session store failure: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update the session store".to_string(),
            )
        }
    }
}

async fn session_view(conversation: &Conversation, session: &Session) -> SessionView {
    SessionView::new(session, conversation.is_awaiting_reply(session.id).await)
}

async fn send_response(
    conversation: &Conversation,
    outcome: SendOutcome,
) -> Result<Json<SendMessageResponse>, HandlerError> {
    let (status, session) = match outcome {
        SendOutcome::Replied(session) => (SendStatus::Replied, session),
        SendOutcome::Failed(session) => (SendStatus::Failed, session),
        SendOutcome::Ignored => {
            return Err((StatusCode::BAD_REQUEST, "Message text is empty".to_string()))
        }
        SendOutcome::Busy(id) => {
            return Err((
                StatusCode::CONFLICT,
                format!("Session {} is still waiting for a reply", id),
            ))
        }
        SendOutcome::Discarded(id) => {
            return Err((
                StatusCode::GONE,
                format!("Session {} was cleared before its reply arrived", id),
            ))
        }
    };
    Ok(Json(SendMessageResponse {
        status,
        session: session_view(conversation, &session).await,
    }))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List conversations for the sidebar, split into the last seven days and older.
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Conversation list", body = SessionListResponse)
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Json<SessionListResponse> {
    let conversation = &app_state.conversation;
    let active_id = conversation.active_id().await;
    let groups = conversation
        .grouped(query.q.as_deref().unwrap_or_default(), chrono::Utc::now())
        .await;

    Json(SessionListResponse {
        active_id,
        recent: groups
            .recent
            .iter()
            .map(|s| SessionSummary::new(s, active_id))
            .collect(),
        older: groups
            .older
            .iter()
            .map(|s| SessionSummary::new(s, active_id))
            .collect(),
    })
}

/// Start a new, empty chat. It becomes the active one.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 500, description = "Session store failure")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = app_state
        .conversation
        .new_session()
        .await
        .map_err(conversation_error)?;
    Ok((StatusCode::CREATED, Json(SessionView::new(&session, false))))
}

/// Clear every conversation ("Clear All").
#[utoipa::path(
    delete,
    path = "/sessions",
    responses(
        (status = 204, description = "All sessions removed"),
        (status = 500, description = "Session store failure")
    )
)]
pub async fn clear_sessions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    app_state
        .conversation
        .clear_all()
        .await
        .map_err(conversation_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Local session id")),
    responses(
        (status = 200, description = "The session", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, HandlerError> {
    let conversation = &app_state.conversation;
    let session = conversation
        .session(id)
        .await
        .ok_or_else(|| conversation_error(ConversationError::SessionNotFound(id)))?;
    Ok(Json(session_view(conversation, &session).await))
}

/// Make a session the active one.
#[utoipa::path(
    post,
    path = "/sessions/{id}/activate",
    params(("id" = Uuid, Path, description = "Local session id")),
    responses(
        (status = 200, description = "Now active", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn activate_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, HandlerError> {
    let conversation = &app_state.conversation;
    let session = conversation
        .select_session(id)
        .await
        .map_err(conversation_error)?;
    Ok(Json(session_view(conversation, &session).await))
}

/// Send a message to a specific session and wait for the assistant's turn.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Local session id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Reply (or apology) appended", body = SendMessageResponse),
        (status = 400, description = "Blank message"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "A reply for this session is still pending"),
        (status = 410, description = "The session was cleared while waiting")
    )
)]
pub async fn send_to_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, HandlerError> {
    let conversation = &app_state.conversation;
    let outcome = conversation
        .send_message_to(id, &body.text)
        .await
        .map_err(conversation_error)?;
    send_response(conversation, outcome).await
}

/// Send a message to the active session, starting one if none is active.
#[utoipa::path(
    post,
    path = "/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Reply (or apology) appended", body = SendMessageResponse),
        (status = 400, description = "Blank message"),
        (status = 409, description = "A reply for this session is still pending")
    )
)]
pub async fn send_to_active_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, HandlerError> {
    let conversation = &app_state.conversation;
    let outcome = conversation
        .send_message(&body.text)
        .await
        .map_err(conversation_error)?;
    send_response(conversation, outcome).await
}

/// Toggle thumbs up / down on an assistant message.
#[utoipa::path(
    put,
    path = "/sessions/{id}/messages/{index}/feedback",
    params(
        ("id" = Uuid, Path, description = "Local session id"),
        ("index" = usize, Path, description = "Message position within the session")
    ),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback recorded", body = SessionView),
        (status = 400, description = "Not an assistant message"),
        (status = 404, description = "Unknown session or message")
    )
)]
pub async fn feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<SessionView>, HandlerError> {
    let conversation = &app_state.conversation;
    let session = conversation
        .set_feedback(id, index, body.value.into())
        .await
        .map_err(conversation_error)?;
    Ok(Json(session_view(conversation, &session).await))
}

/// Greeting details for the signed-in patient.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Patient greeting", body = ProfileResponse)
    )
)]
pub async fn profile_handler(State(app_state): State<Arc<AppState>>) -> Json<ProfileResponse> {
    let profile = app_state.conversation.profile().await;
    Json(ProfileResponse::from(&profile))
}

#[utoipa::path(
    get,
    path = "/quick-actions",
    responses(
        (status = 200, description = "Shortcut buttons", body = [QuickActionView])
    )
)]
pub async fn quick_actions_handler() -> Json<Vec<QuickActionView>> {
    Json(QUICK_ACTIONS.iter().map(QuickActionView::from).collect())
}
