use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    #[serde(default)]
    pub email: EmailSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Comma-separated origin allowlist. Entries may carry a scheme
    /// (`https://example.com`) or be bare domains (`example.com`).
    /// `*` or empty keeps the permissive fallback.
    pub cors_origins: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct SecuritySettings {
    /// HMAC secret for admin bearer tokens.
    pub admin_secret: String,
    /// Cloudflare Turnstile server-side secret. Comment and login
    /// submissions are rejected as a configuration error while unset.
    #[serde(default)]
    pub turnstile_secret: Option<String>,
    /// Admin emails per site, comma-separated values keyed by site id.
    /// The `default` entry is required and covers unlisted sites.
    pub admin_emails: HashMap<String, String>,
}

/// Outbound email delivery API. Notifications and login codes are disabled
/// while either field is unset.
#[derive(Deserialize, Clone, Default)]
pub struct EmailSettings {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = collect_env_vars();

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("database.url", "sqlite://data/murmur.db")?
            .set_default("security.admin_secret", "change_me_please")?
            .set_default("security.admin_emails.default", "admin@example.com")?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(
                &serde_json::to_string(&env_map)
                    .expect("Environment variables should serialize to JSON"),
                config::FileFormat::Json,
            ))
            .build()?;

        s.try_deserialize()
    }
}

fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("MURMUR_"))
        .map(|(k, v)| {
            let new_key = k
                .trim_start_matches("MURMUR_")
                .replace("__", ".")
                .to_lowercase();
            (new_key, v)
        })
        .collect()
}
