use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::auth::auth_middleware;
use crate::db::{UserRepository, VideoRepository};
use crate::handlers::{health, users as user_handlers, videos as video_handlers};
use crate::media::MediaStore;
use crate::Config;

/// Avatar plus cover image, with room for the text fields.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub videos: Arc<dyn VideoRepository>,
    pub media: Arc<dyn MediaStore>,
    pub config: Config,
}

pub fn create_router(state: AppState) -> Router {
    // Public user routes (no middleware)
    let public_user_routes = Router::new()
        .route("/register", post(user_handlers::register))
        .route("/login", post(user_handlers::login))
        .route("/refresh-token", post(user_handlers::refresh_token));

    // Protected user routes (need auth)
    let protected_user_routes = Router::new()
        .route("/logout", post(user_handlers::logout))
        .route("/change-password", post(user_handlers::change_password))
        .route("/current-user", get(user_handlers::current_user))
        .route("/history", get(user_handlers::watch_history))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let user_routes = Router::new()
        .merge(public_user_routes)
        .merge(protected_user_routes);

    let video_routes = Router::new().route("/", get(video_handlers::list_videos));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .route("/api/v1/healthcheck", get(health::health_check))
        .nest("/api/v1/users", user_routes)
        .nest("/api/v1/videos", video_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }

    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        Err(_) => {
            tracing::warn!("Invalid CORS_ORIGIN `{}`, cross-origin requests disabled", origin);
            CorsLayer::new()
        }
    }
}
