use super::handlers::{admin, auth, comments};
use crate::state::AppState;
use axum::{
    http::{header, request::Parts, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub fn build_router(state: AppState, allowed_origins: &str) -> Router {
    let cors = cors_layer(allowed_origins);

    let admin_routes = Router::new()
        .route("/api/admin/comments", get(admin::list_comments))
        .route("/api/admin/comments/batch", delete(admin::batch_delete))
        .route("/api/admin/comments/:id", delete(admin::delete_comment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .route("/api/auth/send-code", post(auth::send_code))
        .route("/api/auth/verify", post(auth::verify_code))
        .route(
            "/api/comments",
            get(comments::list_comments).post(comments::post_comment),
        )
        .route("/api/comments/:id/replies", get(comments::get_replies))
        .route("/api/avatar/:id", get(comments::get_avatar))
        .merge(admin_routes)
        .layer(cors)
        .with_state(state)
}

/// Origin allowlist with bare-domain entries: `example.com` matches both
/// `https://example.com` and `http://example.com`. `*` or an empty setting
/// keeps the historical permissive fallback.
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let trimmed = allowed_origins.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return permissive_cors();
    }

    let entries: Vec<String> = trimmed
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if entries.is_empty() {
        tracing::warn!("CORS config is invalid or empty, falling back to allow ANY.");
        return permissive_cors();
    }

    tracing::info!("CORS enabled for origins: {:?}", entries);
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                let Ok(origin) = origin.to_str() else {
                    return false;
                };
                let bare = origin
                    .strip_prefix("https://")
                    .or_else(|| origin.strip_prefix("http://"))
                    .unwrap_or(origin);
                entries.iter().any(|e| e == origin || e == bare)
            },
        ))
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any)
}
