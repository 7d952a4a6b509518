use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{identity_hash, NewComment, ReplyPage, SiteId};
use serde::Deserialize;
use serde_json::json;

use crate::http::error::ApiError;
use crate::http::{bearer_admin_email, client_ip};
use crate::state::AppState;
use crate::tasks;

const PAGE_SIZE: i64 = 10;
const DEFAULT_REPLY_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub struct ListQuery {
    site_id: Option<String>,
    page: Option<i64>,
    context_url: Option<String>,
}

/// Root page listing with conditional-GET semantics: an `If-Modified-Since`
/// header matching the site's freshness token short-circuits to 304 without
/// touching the database.
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let site_id = query
        .site_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing site_id".to_string()))?;
    SiteId::new(site_id).map_err(ApiError::Validation)?;

    let token = state.freshness.ensure(site_id).await;
    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok());
    if if_modified_since == Some(token.as_str()) {
        return Ok(with_cache_headers(
            StatusCode::NOT_MODIFIED.into_response(),
            &token,
        ));
    }

    let page = state
        .db
        .fetch_root_page(
            site_id,
            query.page.unwrap_or(1),
            PAGE_SIZE,
            query.context_url.as_deref().filter(|s| !s.is_empty()),
        )
        .await?;
    Ok(with_cache_headers(Json(page).into_response(), &token))
}

fn with_cache_headers(mut response: Response, token: &str) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, no-cache"),
    );
    if let Ok(value) = HeaderValue::from_str(token) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    response
}

#[derive(Deserialize)]
pub struct RepliesQuery {
    last_id: Option<i64>,
    limit: Option<i64>,
}

pub async fn get_replies(
    State(state): State<AppState>,
    Path(parent_id): Path<i64>,
    Query(query): Query<RepliesQuery>,
) -> Result<Json<ReplyPage>, ApiError> {
    let page = state
        .db
        .fetch_replies(
            parent_id,
            query.last_id,
            query.limit.unwrap_or(DEFAULT_REPLY_LIMIT),
        )
        .await?;
    Ok(Json(page))
}

pub async fn get_avatar(
    State(state): State<AppState>,
    Path(avatar_id): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .kv
        .get(&tasks::avatar_key(&avatar_id))
        .await
        .ok_or(ApiError::NotFound)?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=604800"),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    site_id: Option<String>,
    parent_id: Option<i64>,
    content: Option<String>,
    author_name: Option<String>,
    email: Option<String>,
    turnstile_token: Option<String>,
    context_url: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Submission chain: field validation, Turnstile, rate limit, insert, then
/// the fire-and-forget tail (avatar fetch, notification, freshness bump).
pub async fn post_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(present(&request.site_id)
        && present(&request.content)
        && present(&request.author_name)
        && present(&request.email)
        && present(&request.turnstile_token))
    {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    }
    let site_id = request.site_id.unwrap_or_default();
    let content = request.content.unwrap_or_default();
    let author_name = request.author_name.unwrap_or_default();
    let email = request.email.unwrap_or_default();
    let turnstile_token = request.turnstile_token.unwrap_or_default();
    SiteId::new(site_id.as_str()).map_err(ApiError::Validation)?;

    let ip = client_ip(&headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let verifier = state
        .turnstile
        .as_ref()
        .ok_or(ApiError::Config("turnstile secret is not set"))?;
    if !verifier.verify(&turnstile_token, &ip).await? {
        return Err(ApiError::Forbidden(
            "Turnstile validation failed".to_string(),
        ));
    }

    if !state.rate_limiter.allow(&ip).await {
        return Err(ApiError::RateLimited);
    }

    let email_md5 = identity_hash(&email);
    // Historical duplication: avatar_id always equals the identity hash.
    let avatar_id = email_md5.clone();
    let is_admin = bearer_admin_email(&state, &headers).is_some();

    let new_comment = NewComment {
        site_id: site_id.clone(),
        parent_id: request.parent_id,
        content: content.clone(),
        author_name: author_name.clone(),
        email: Some(email.clone()),
        email_md5,
        avatar_id: avatar_id.clone(),
        ip_address: ip,
        user_agent,
        context_url: request.context_url.clone(),
        is_admin,
    };
    let id = state.db.insert_comment(&new_comment).await?;

    // Everything past the committed insert is fire-and-forget.
    tasks::spawn_avatar_fetch(&state, email.clone(), avatar_id.clone());
    tasks::spawn_comment_notification(
        &state,
        tasks::CommentNotification {
            site_id: site_id.clone(),
            comment_id: id,
            parent_id: request.parent_id,
            author_name,
            author_email: email,
            content,
            context_url: request.context_url,
        },
    );
    tasks::spawn_freshness_bump(&state, vec![site_id]);

    Ok(Json(json!({ "success": true, "id": id, "avatar_id": avatar_id })))
}
