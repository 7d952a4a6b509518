mod auth;
mod cache;
mod config;
mod http;
mod rate_limit;
mod state;
mod tasks;

use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AdminDirectory, AuthTokens};
use crate::cache::FreshnessCache;
use crate::config::Settings;
use crate::http::router::build_router;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use adapter::{AvatarProviders, EmailClient, TurnstileVerifier};
use storage::{Db, KvStore, MemoryKv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let db = Db::new(&settings.database.url).await?;
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());

    let admins = AdminDirectory::new(settings.security.admin_emails.clone())?;

    let turnstile = match &settings.security.turnstile_secret {
        Some(secret) => Some(TurnstileVerifier::new(secret.clone())),
        None => {
            tracing::warn!("turnstile secret not set; submissions will fail until configured");
            None
        }
    };
    let email = match (&settings.email.api_url, &settings.email.api_key) {
        (Some(url), Some(key)) => Some(EmailClient::new(url.clone(), key.clone())),
        _ => {
            tracing::warn!("email API not configured; login codes and notifications are disabled");
            None
        }
    };

    let state = AppState {
        db,
        kv: kv.clone(),
        freshness: FreshnessCache::new(kv.clone()),
        rate_limiter: RateLimiter::new(kv),
        tokens: AuthTokens::new(&settings.security.admin_secret),
        admins,
        turnstile,
        email,
        avatars: AvatarProviders::new(),
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
