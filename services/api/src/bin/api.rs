//! services/api/src/bin/api.rs

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use health_chat_api::{
    adapters::{DbAdapter, FileStore, HttpChatAdapter},
    config::{Config, StorageBackend},
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use health_chat_core::{Conversation, KeyValueStore, SessionStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Key-Value Store ---
    let kv: Arc<dyn KeyValueStore> = match &config.storage {
        StorageBackend::Sqlite(url) => {
            info!("Connecting to database...");
            let db_adapter = DbAdapter::connect(url).await?;
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        StorageBackend::File(path) => {
            info!("Keeping chat state in {}", path.display());
            Arc::new(FileStore::new(path.clone()))
        }
    };

    // --- 3. Initialize the Remote Chat Adapter ---
    let client = reqwest::Client::builder().build()?;
    let remote = Arc::new(HttpChatAdapter::new(client, config.chat_api_base.clone()));
    info!("Chat backend: {}", config.chat_api_base);

    // --- 4. Restore the Conversation ---
    let conversation =
        Arc::new(Conversation::open(SessionStore::new(kv), remote.clone(), remote).await);
    let greeting = conversation.clone();
    tokio::spawn(async move {
        let profile = greeting.refresh_profile().await;
        info!("Greeting patient as '{}'.", profile.display_name());
    });

    let app_state = Arc::new(AppState::new(conversation));

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(build_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
