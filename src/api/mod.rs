use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{enforce_scope, require_auth, ADMIN_SCOPE};
use crate::errors::AppError;
use crate::AppState;

pub mod auth;
pub mod forms;
pub mod spiders;

/// Build the full application router: public auth routes, token-protected
/// account routes and the crawl-daemon API under `/api/v1`.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/refresh", post(auth::refresh));

    let account = Router::new()
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(public)
        .merge(account)
        .nest("/api/v1", job_router(state.clone()))
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Crawl-daemon routes. Reads need any valid access token; writes also need
/// the admin scope. Layers run outermost-last, so `require_auth` wraps the guard.
fn job_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let writes = Router::new()
        .route("/schedule", post(spiders::schedule))
        .route("/cancel", post(spiders::cancel))
        .route("/project", delete(spiders::delete_project))
        .route("/version", delete(spiders::delete_version))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            enforce_scope(ADMIN_SCOPE, req, next)
        }));

    Router::new()
        .route("/status", get(spiders::daemon_status))
        .route("/projects", get(spiders::list_projects))
        .route("/versions", get(spiders::list_versions))
        .route("/spiders", get(spiders::list_spiders))
        .route("/jobs", get(spiders::list_jobs))
        .route("/job/stats", get(spiders::job_stats))
        .route("/job/items", get(spiders::job_items))
        .route("/log", get(spiders::job_log))
        .merge(writes)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

async fn fallback_404() -> AppError {
    AppError::NotFound("not found")
}
