//! Drives `HttpChatAdapter` against a throwaway axum server standing in for the
//! remote health assistant backend.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use health_chat_api::adapters::HttpChatAdapter;
use health_chat_core::{ChatRequest, ChatService, PortError, ProfileService};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Backend {
    chat_bodies: Arc<Mutex<Vec<Value>>>,
    latest: Arc<Mutex<Value>>,
}

async fn chat(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    backend.chat_bodies.lock().unwrap().push(body);
    Json(json!({ "response": format!("Noted: {}", message), "session_id": "srv-42" }))
}

async fn latest(State(backend): State<Backend>) -> Json<Value> {
    Json(backend.latest.lock().unwrap().clone())
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn healthy_backend() -> (Backend, HttpChatAdapter) {
    let backend = Backend::default();
    let router = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/data/latest", get(latest))
        .route(
            "/api/profile/name",
            get(|| async { Json(json!({ "name": "maria" })) }),
        )
        .route(
            "/api/profile/email",
            get(|| async { Json(json!({ "email": "maria@clinic.org" })) }),
        )
        .with_state(backend.clone());
    let base = spawn(router).await;
    // A trailing slash on the base URL must not double up in request paths.
    let adapter = HttpChatAdapter::new(reqwest::Client::new(), format!("{}/", base));
    (backend, adapter)
}

fn chat_request(email: Option<&str>) -> ChatRequest {
    ChatRequest {
        message: "My ankle is swollen".to_string(),
        session_id: "local-1".to_string(),
        email: email.map(str::to_string),
    }
}

#[tokio::test]
async fn chat_posts_the_turn_and_returns_the_rotated_id() {
    let (backend, adapter) = healthy_backend().await;

    let reply = adapter
        .send_chat(chat_request(Some("maria@clinic.org")))
        .await
        .unwrap();
    assert_eq!(reply.response, "Noted: My ankle is swollen");
    assert_eq!(reply.session_id, "srv-42");

    adapter.send_chat(chat_request(None)).await.unwrap();

    let bodies = backend.chat_bodies.lock().unwrap().clone();
    assert_eq!(
        bodies[0],
        json!({
            "message": "My ankle is swollen",
            "session_id": "local-1",
            "email": "maria@clinic.org"
        })
    );
    assert!(bodies[1].get("email").is_none());
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let adapter = HttpChatAdapter::new(reqwest::Client::new(), spawn(router).await);

    let err = adapter.send_chat(chat_request(None)).await.unwrap_err();
    assert!(matches!(err, PortError::Unavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn malformed_reply_is_unexpected() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async { Json(json!({ "unexpected": true })) }),
    );
    let adapter = HttpChatAdapter::new(reqwest::Client::new(), spawn(router).await);

    let err = adapter.send_chat(chat_request(None)).await.unwrap_err();
    assert!(matches!(err, PortError::Unexpected(_)), "{:?}", err);
}

#[tokio::test]
async fn unreachable_backend_is_a_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let adapter = HttpChatAdapter::new(reqwest::Client::new(), format!("http://{}", addr));
    let err = adapter.send_chat(chat_request(None)).await.unwrap_err();
    assert!(matches!(err, PortError::Unavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn latest_record_prefers_the_email_local_part() {
    let (backend, adapter) = healthy_backend().await;

    *backend.latest.lock().unwrap() = json!({
        "data": [{ "email": "sam.lee@example.com", "profile": { "name": "Samuel" } }]
    });
    assert_eq!(
        adapter.fetch_latest_patient_name().await.unwrap().as_deref(),
        Some("sam.lee")
    );

    *backend.latest.lock().unwrap() = json!({
        "data": [{ "email": "", "profile": { "name": "Samuel" } }]
    });
    assert_eq!(
        adapter.fetch_latest_patient_name().await.unwrap().as_deref(),
        Some("Samuel")
    );

    *backend.latest.lock().unwrap() = json!({ "data": [] });
    assert_eq!(adapter.fetch_latest_patient_name().await.unwrap(), None);
}

#[tokio::test]
async fn profile_endpoints_are_read() {
    let (_, adapter) = healthy_backend().await;
    assert_eq!(
        adapter.fetch_profile_name().await.unwrap().as_deref(),
        Some("maria")
    );
    assert_eq!(
        adapter.fetch_profile_email().await.unwrap().as_deref(),
        Some("maria@clinic.org")
    );
}

#[tokio::test]
async fn missing_profile_endpoint_is_a_failure() {
    let adapter = HttpChatAdapter::new(reqwest::Client::new(), spawn(Router::new()).await);
    assert!(adapter.fetch_profile_name().await.is_err());
}
