use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::docs;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, authz, health, roles, users};
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub services: Services,
    pub events: EventBus,
    pub port: u16,
}

impl AppState {
    /// Wires the services and starts the activity listener. Must be called
    /// from inside a Tokio runtime.
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        let (events, rx) = init_event_bus();
        let services = Services::new(pool.clone(), events.clone(), config.registration_code);

        tokio::spawn(start_activity_listener(rx, pool.clone(), services.gate.clone()));

        Self {
            pool,
            jwt: Arc::new(config.jwt),
            services,
            events,
            port: config.port,
        }
    }
}

pub fn router(state: AppState) -> Result<Router, AppError> {
    let openapi = docs::build_openapi(state.port)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let role_routes = Router::new()
        .route("/", get(roles::list_roles).post(roles::create_role))
        .route("/:name", get(roles::get_role).delete(roles::delete_role))
        .route("/:name/permissions", put(roles::update_permissions))
        .route("/:name/rename", post(roles::rename_role));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/pending", get(users::list_pending))
        .route("/:id/approve", post(users::approve_user))
        .route("/:id/status", put(users::set_status));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/roles", role_routes)
        .nest("/users", user_routes)
        .route("/authz/check", get(authz::check))
        .route("/api/health", get(health::health))
        .with_state(state)
        .merge(docs::swagger_routes(openapi)?)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
