use axum::{Router, extract::FromRef, http::HeaderName};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod helper;
pub mod models;
pub mod storage;
pub mod store;

pub mod routes;
use routes::{collections, public, teams, users};

// --- Public Re-exports ---

pub use auth::AuthorizationRegistry;
pub use config::AppConfig;
pub use storage::{LocalMediaStorage, StorageState};
pub use store::{InMemoryRecordStore, PostgresRecordStore, StoreState};

/// ApiDoc
///
/// OpenAPI document for the user and team endpoints plus every request body.
/// Collection endpoints are generic over the collection kind and share the
/// request schemas listed here. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_me, handlers::list_users, handlers::create_user, handlers::get_user,
        handlers::update_user, handlers::delete_user, handlers::list_teams,
        handlers::create_team, handlers::get_team, handlers::delete_team,
        handlers::add_team_user, handlers::remove_team_user
    ),
    components(
        schemas(
            models::Deleted, models::requests::CreateUserRequest,
            models::requests::UpdateUserRequest, models::requests::CreateTeamRequest,
            models::requests::CreateCollectionRequest, models::requests::UpdateCollectionRequest,
            models::requests::CreateMemberRequest, models::requests::Credentials,
        )
    ),
    tags(
        (name = "media-cms", description = "Media collection management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request. The store and storage are trait objects so tests
/// can run the whole router over the in-memory store and a temp directory.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreState,
    pub storage: StorageState,
    pub config: AppConfig,
    /// Roles and actions consulted by the per-route guards.
    pub registry: Arc<AuthorizationRegistry>,
}

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route with its guard, then the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let registry = state.registry.clone();

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(users::user_routes(&registry))
        .merge(teams::team_routes(&registry))
        .merge(collections::collection_routes(&registry))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Puts the `x-request-id` into the request span so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
