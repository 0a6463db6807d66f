use crate::auth::jwt::AuthService;
use crate::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(auth_service: Arc<AuthService>) -> Router<AppState> {
    let public_routes = Router::new()
        // Public routes (no auth required)
        .route("/auth/login", post(crate::api::handlers::auth::login))
        .route(
            "/auth/refresh",
            post(crate::api::handlers::auth::refresh_token),
        )
        .route("/health", get(crate::api::handlers::health::health));

    let protected_routes = Router::new()
        // Protected routes (auth required)
        .route(
            "/missions",
            post(crate::api::handlers::missions::start_mission),
        )
        .route(
            "/missions/{id}",
            get(crate::api::handlers::missions::get_mission),
        )
        .route(
            "/missions/{id}/pause",
            post(crate::api::handlers::missions::pause_mission),
        )
        .route(
            "/missions/{id}/resume",
            post(crate::api::handlers::missions::resume_mission),
        )
        .route(
            "/missions/{id}/stop",
            post(crate::api::handlers::missions::stop_mission),
        )
        .route(
            "/missions/{id}/draft",
            get(crate::api::handlers::missions::get_draft),
        )
        .route(
            "/missions/{id}/notes",
            get(crate::api::handlers::missions::get_notes),
        )
        .route(
            "/missions/{id}/logs",
            get(crate::api::handlers::missions::get_logs),
        )
        .route(
            "/missions/{id}/stats",
            get(crate::api::handlers::missions::get_stats),
        )
        .route(
            "/missions/{id}/report",
            get(crate::api::handlers::missions::get_report),
        )
        .route(
            "/missions/{id}/checkpoint",
            get(crate::api::handlers::missions::get_checkpoint),
        )
        .route("/missions/{id}/ws", get(crate::api::ws::mission_updates))
        .layer(middleware::from_fn_with_state(
            auth_service,
            crate::auth::middleware::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
