use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::v1;
use super::ApiState;

fn cors_layer(origin: &str) -> CorsLayer {
    let allowed = match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(err) => {
            log::warn!("ignoring invalid CORS origin {origin:?}: {err}");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

fn auth_routes() -> Router<ApiState> {
    Router::new()
        .route("/register", post(v1::register))
        .route("/login", post(v1::login))
        .route("/me", get(v1::me))
        .route("/refresh", post(v1::refresh))
}

fn study_plan_routes() -> Router<ApiState> {
    Router::new()
        .route("/generate", post(v1::generate_plan))
        .route("/current", get(v1::current_plan))
        .route("/history", get(v1::plan_history))
        .route("/sessions", post(v1::create_session).get(v1::list_sessions))
        .route("/sessions/{id}/complete", put(v1::complete_session))
}

fn chat_routes() -> Router<ApiState> {
    Router::new()
        .route("/chat", post(v1::chat))
        .route("/history", get(v1::chat_history).delete(v1::clear_chat_history))
}

fn calendar_routes() -> Router<ApiState> {
    Router::new()
        .route("/week", get(v1::week))
        .route("/upcoming", get(v1::upcoming))
        .route("/stats", get(v1::stats))
        .route("/sessions/{id}", delete(v1::delete_session))
}

/// Full application router with CORS restricted to `cors_origin`.
pub fn router(state: ApiState, cors_origin: &str) -> Router {
    Router::new()
        .route("/", get(v1::root))
        .route("/health", get(v1::health))
        .nest("/api/auth", auth_routes())
        .nest("/api/study-plan", study_plan_routes())
        .nest("/api/ai-chat", chat_routes())
        .nest("/api/calendar", calendar_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}
