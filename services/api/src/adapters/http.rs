//! services/api/src/adapters/http.rs
//!
//! This module contains the adapter for the remote health assistant backend.
//! It implements the `ChatService` and `ProfileService` ports from the `core` crate
//! on top of a shared `reqwest` client.

use async_trait::async_trait;
use health_chat_core::domain::name_from_email;
use health_chat_core::ports::{
    ChatReply, ChatRequest, ChatService, PortError, PortResult, ProfileService,
};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the `/api/chat`, `/api/data` and `/api/profile` endpoints.
#[derive(Clone)]
pub struct HttpChatAdapter {
    client: Client,
    base_url: String,
}

impl HttpChatAdapter {
    /// Creates a new `HttpChatAdapter` for `base_url` (e.g. `http://localhost:8000`).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        decode(check_status(response)?).await
    }
}

/// Any non-2xx status is a failure of the call.
fn check_status(response: Response) -> PortResult<Response> {
    response
        .error_for_status()
        .map_err(|e| PortError::Unavailable(e.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Unexpected(format!("Invalid response body: {}", e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    response: String,
    #[serde(default)]
    session_id: String,
}

#[derive(Deserialize)]
struct LatestDataBody {
    #[serde(default)]
    data: Vec<LatestRecord>,
}

#[derive(Deserialize)]
struct LatestRecord {
    email: Option<String>,
    profile: Option<LatestProfile>,
}

#[derive(Deserialize)]
struct LatestProfile {
    name: Option<String>,
}

#[derive(Deserialize)]
struct NameBody {
    name: Option<String>,
}

#[derive(Deserialize)]
struct EmailBody {
    email: Option<String>,
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl ChatService for HttpChatAdapter {
    async fn send_chat(&self, request: ChatRequest) -> PortResult<ChatReply> {
        let body = ChatRequestBody {
            message: &request.message,
            session_id: &request.session_id,
            email: request.email.as_deref(),
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        let reply: ChatResponseBody = decode(check_status(response)?).await?;
        debug!("Chat reply received for remote session '{}'.", reply.session_id);

        Ok(ChatReply {
            response: reply.response,
            session_id: reply.session_id,
        })
    }
}

#[async_trait]
impl ProfileService for HttpChatAdapter {
    async fn fetch_latest_patient_name(&self) -> PortResult<Option<String>> {
        let body: LatestDataBody = self.get_json("/api/data/latest?limit=1").await?;
        let Some(record) = body.data.into_iter().next() else {
            return Ok(None);
        };
        if let Some(email) = non_empty(record.email) {
            return Ok(name_from_email(&email));
        }
        Ok(non_empty(record.profile.and_then(|p| p.name)))
    }

    async fn fetch_profile_name(&self) -> PortResult<Option<String>> {
        let body: NameBody = self.get_json("/api/profile/name").await?;
        Ok(non_empty(body.name))
    }

    async fn fetch_profile_email(&self) -> PortResult<Option<String>> {
        let body: EmailBody = self.get_json("/api/profile/email").await?;
        Ok(non_empty(body.email))
    }
}
