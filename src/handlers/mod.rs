mod health;
mod likes;
mod metrics;

pub use health::health_handler;
pub use likes::{LikeBody, get_likes, method_not_allowed, preflight, submit_like};
pub use metrics::metrics_handler;

use axum::{
    Router,
    http::{Method, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::error::LikeError;
use crate::state::AppState;

/// The like api is served on both `/` and `/like_api.php`, the path existing
/// clients were built against.
pub fn router(state: Arc<AppState>) -> Router {
    // head is listed so it gets 405 instead of riding along with get
    let like_api = get(get_likes)
        .post(submit_like)
        .options(preflight)
        .head(method_not_allowed)
        .fallback(method_not_allowed);

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", like_api.clone())
        .route("/like_api.php", like_api)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

// Generic 500; the panic message only goes to the log
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    LikeError::Internal(detail.to_string()).into_response()
}
