use crate::auth::{AdminDirectory, AuthTokens};
use crate::cache::FreshnessCache;
use crate::rate_limit::RateLimiter;
use adapter::{AvatarProviders, EmailClient, TurnstileVerifier};
use std::sync::Arc;
use storage::{Db, KvStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub kv: Arc<dyn KvStore>,
    pub freshness: FreshnessCache,
    pub rate_limiter: RateLimiter,
    pub tokens: AuthTokens,
    pub admins: AdminDirectory,
    /// None until a Turnstile secret is configured; submissions fail with a
    /// configuration error rather than silently skipping the bot check.
    pub turnstile: Option<TurnstileVerifier>,
    /// None disables login codes and comment notifications.
    pub email: Option<EmailClient>,
    pub avatars: AvatarProviders,
}
