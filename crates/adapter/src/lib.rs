//! HTTP clients for the services this system leans on but does not own:
//! Cloudflare Turnstile bot checks, an outbound email delivery API, and the
//! avatar image providers. Endpoints are overridable so tests can stand in
//! mock servers.

mod avatar;
mod email;
mod turnstile;

pub use avatar::AvatarProviders;
pub use email::EmailClient;
pub use turnstile::TurnstileVerifier;
