use std::sync::Arc;

use axum::http::{HeaderName, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{PolicyEvaluator, ProjectPolicy};
use crate::config::AppConfig;
use crate::docs;
use crate::errors::AppError;
use crate::gate::API_KEY_HEADER;
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, projects, security_events, users};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub policy: Arc<dyn PolicyEvaluator>,
    pub api_key_max_attempts: u32,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(config.jwt.clone()),
            policy: Arc::new(ProjectPolicy::new()),
            api_key_max_attempts: config.api_key_max_attempts,
        }
    }

    pub fn sessions(&self) -> SessionManager<'_> {
        SessionManager::new(&self.pool, &self.jwt)
    }
}

pub async fn create_app(pool: SqlitePool, config: &AppConfig) -> Result<Router, AppError> {
    if config.jwt.secret.is_empty() {
        return Err(AppError::configuration("JWT secret must not be empty"));
    }

    let state = AppState::new(pool, config);
    let openapi = docs::build_openapi(config.port)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id", put(users::update_user))
        .route("/:id", delete(users::delete_user))
        .route("/:id/block", put(users::set_user_blocked));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects))
        .route("/", post(projects::create_project))
        .route("/validate-key", post(projects::validate_api_key))
        .route("/:id", get(projects::get_project))
        .route("/:id", put(projects::update_project))
        .route("/:id", delete(projects::delete_project))
        .route("/:id/active", put(projects::set_project_active))
        .route("/:id/blocked", put(projects::set_project_blocked))
        .route("/:id/api-key", post(projects::issue_project_api_key))
        .route("/:id/members", post(projects::add_member))
        .route("/:id/members/:user_id", delete(projects::remove_member));

    let event_routes = Router::new()
        .route("/", post(security_events::ingest_event))
        .route("/", get(security_events::list_events))
        .route("/project/:project_id", get(security_events::list_project_events));

    let api = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/security-events", event_routes);

    let router = Router::new()
        .nest("/api", api)
        .with_state(state)
        .merge(docs::swagger_routes(openapi))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
