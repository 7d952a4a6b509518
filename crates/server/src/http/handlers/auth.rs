use anyhow::Context;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::http::client_ip;
use crate::http::error::ApiError;
use crate::state::AppState;

const CODE_TTL: Duration = Duration::from_secs(600);

fn otp_key(email: &str) -> String {
    format!("auth_otp:{}", email.trim().to_lowercase())
}

#[derive(Deserialize)]
pub struct SendCodeRequest {
    email: Option<String>,
    turnstile_token: Option<String>,
}

/// Stores a 6-digit one-time code for ten minutes and emails it. The
/// response shape is the same whether or not the address is an admin, so
/// the endpoint cannot be used to enumerate the allowlist.
pub async fn send_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing email".to_string()))?;
    let turnstile_token = request
        .turnstile_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Turnstile token required".to_string()))?;

    let verifier = state
        .turnstile
        .as_ref()
        .ok_or(ApiError::Config("turnstile secret is not set"))?;
    if !verifier.verify(&turnstile_token, &client_ip(&headers)).await? {
        return Err(ApiError::Forbidden(
            "Turnstile validation failed".to_string(),
        ));
    }

    let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
    state
        .kv
        .put(&otp_key(&email), code.clone().into_bytes(), Some(CODE_TTL))
        .await;

    let client = state
        .email
        .as_ref()
        .ok_or(ApiError::Config("email delivery is not configured"))?;
    client
        .send(
            &email,
            "Your Login Code",
            &format!(
                "Your login verification code is: <strong>{code}</strong><br>\
                 It expires in 10 minutes.<br><br>\
                 If you did not request this, please ignore this email."
            ),
            &format!("Your login verification code is: {code}"),
            &[],
        )
        .await
        .context("failed to send verification email")?;

    Ok(Json(
        json!({ "success": true, "message": "Code sent (if email is valid)" }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    email: Option<String>,
    code: Option<String>,
}

/// Consumes a matching one-time code and, for allowlisted admin emails,
/// issues a 7-day bearer token.
pub async fn verify_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing email".to_string()))?;
    let code = request
        .code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing code".to_string()))?;

    let key = otp_key(&email);
    let stored = state
        .kv
        .get(&key)
        .await
        .and_then(|bytes| String::from_utf8(bytes).ok());
    match stored {
        Some(stored) if stored == code => {
            // One shot only.
            state.kv.delete(&key).await;
        }
        _ => {
            return Err(ApiError::Forbidden("Invalid or expired code".to_string()));
        }
    }

    if !state.admins.is_admin(&email) {
        return Err(ApiError::Forbidden(
            "Access Denied: This email is not authorized as an administrator.".to_string(),
        ));
    }

    let token = state.tokens.sign(&email.to_lowercase());
    Ok(Json(json!({ "success": true, "token": token })))
}
