use axum::extract::{Path, Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use domain::{identity_hash, Comment};
use serde::Deserialize;
use serde_json::json;

use crate::http::bearer_admin_email;
use crate::http::error::ApiError;
use crate::state::AppState;
use crate::tasks;

/// Gate for every `/api/admin/*` route: the bearer token must be validly
/// signed, unexpired, and carry an allowlisted email.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if bearer_admin_email(&state, request.headers()).is_none() {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[derive(Deserialize)]
pub struct AdminListQuery {
    email: Option<String>,
    site_id: Option<String>,
}

/// Moderation listing. Filtering by email goes through the identity hash so
/// raw addresses never hit the query, and full rows (email, IP, UA) come
/// back for the dashboard.
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let email_md5 = query
        .email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .map(identity_hash);
    let site_id = query.site_id.as_deref().filter(|s| !s.trim().is_empty());
    let rows = state.db.admin_list(email_md5.as_deref(), site_id).await?;
    Ok(Json(rows))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(site_id) = state.db.delete_comment(id).await? {
        tasks::spawn_freshness_bump(&state, vec![site_id]);
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct BatchDeleteRequest {
    ids: Option<Vec<i64>>,
    email: Option<String>,
}

/// Bulk removal, either by explicit id set or by computed email hash. Both
/// variants can span sites; every affected site gets its freshness token
/// bumped.
pub async fn batch_delete(
    State(state): State<AppState>,
    Json(request): Json<BatchDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(email) = request.email.filter(|e| !e.trim().is_empty()) {
        let sites = state.db.delete_by_email_hash(&identity_hash(&email)).await?;
        tasks::spawn_freshness_bump(&state, sites);
        return Ok(Json(json!({
            "success": true,
            "message": format!("Deleted comments for {email}"),
        })));
    }

    if let Some(ids) = request.ids.filter(|ids| !ids.is_empty()) {
        let sites = state.db.delete_by_ids(&ids).await?;
        tasks::spawn_freshness_bump(&state, sites);
        return Ok(Json(json!({
            "success": true,
            "message": format!("Deleted {} comments", ids.len()),
        })));
    }

    Err(ApiError::Validation("Missing ids or email".to_string()))
}
