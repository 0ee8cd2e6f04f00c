//! HTTP API surface: shared state, router assembly, liveness probes.

pub mod account;
pub mod friends;
pub mod groups;
pub mod media;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Json, Router};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use clique_shared::ServiceIdentity;
use clique_store::Database;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::object_store::ObjectStore;
use crate::preview::PreviewClient;
use crate::throttle::{credential_throttle_middleware, CredentialThrottle};

/// Hard cap on request bodies. Above the image limit on purpose: the
/// multipart envelope around a maximum-size image still has to fit, and
/// the precise image check in the handler owns the 413.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub identity: Arc<ServiceIdentity>,
    pub object_store: Arc<ObjectStore>,
    pub preview: Arc<PreviewClient>,
    pub throttle: CredentialThrottle,
    pub config: Arc<ServerConfig>,
}

/// Assemble the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // register/login burn an Argon2 hash per call; they sit behind the
    // credential throttle, the rest of the API does not
    let credential_routes = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route_layer(middleware::from_fn_with_state(
            state.throttle.clone(),
            credential_throttle_middleware,
        ));

    Router::new()
        .merge(credential_routes)
        // account
        .route("/logout", post(account::logout))
        .route("/user_details", get(account::user_details))
        .route("/update_account", put(account::update_account))
        .route("/remove_account", delete(account::remove_account))
        // friends
        .route("/create_friend_request", post(friends::create_friend_request))
        .route("/add_friend", post(friends::add_friend))
        .route("/decline_friend_request/{mail}", delete(friends::decline_friend_request))
        .route("/cancel_friend_request/{mail}", delete(friends::cancel_friend_request))
        .route("/remove_friend/{mail}", delete(friends::remove_friend))
        .route("/pending_friend_requests", get(friends::pending_friend_requests))
        .route("/sent_friend_requests", get(friends::sent_friend_requests))
        .route("/user_friends", get(friends::user_friends))
        // groups
        .route("/create_group", post(groups::create_group))
        .route("/add_group_members/{group_id}", post(groups::add_group_members))
        .route("/remove_member/{group_id}/{member_mail}", delete(groups::remove_member))
        .route("/remove_group/{group_id}", delete(groups::remove_group))
        .route("/user_groups", get(groups::user_groups))
        .route("/mutual_groups/{friend_mail}", get(groups::mutual_groups))
        .route("/group_members/{group_id}", get(groups::group_members))
        // media
        .route("/group_content/{group_id}", get(media::group_content))
        .route("/add_link", post(media::add_link))
        .route("/add_image", post(media::add_image))
        .route("/delete_media", delete(media::delete_media))
        .route("/propose_tags", post(media::propose_tags))
        // probes
        .route("/heartbeat", get(heartbeat))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until it fails or the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Liveness probe. Answers as long as the process is up.
async fn heartbeat() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe. Round-trips the database before answering.
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.lock().await;
    db.ping()?;
    Ok(Json(serde_json::json!({ "status": "healthy" })))
}
