use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub exp: i64,
}

/// HS256 bearer tokens for the admin surface. Compact JWT layout
/// (`header.claims.signature`, base64url without padding) so existing
/// dashboard clients keep working.
#[derive(Clone)]
pub struct AuthTokens {
    secret: Vec<u8>,
}

impl AuthTokens {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Issues a token for an authenticated admin email, valid for 7 days.
    pub fn sign(&self, email: &str) -> String {
        self.sign_with_expiry(email, chrono::Utc::now().timestamp() + TOKEN_TTL_SECS)
    }

    fn sign_with_expiry(&self, email: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = Claims {
            email: email.to_string(),
            exp,
        };
        let payload = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&claims).expect("claims always serialize"));
        let signing_input = format!("{header}.{payload}");
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC takes any key length");
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{signing_input}.{signature}")
    }

    /// Returns the claims when the token is well-formed, correctly signed
    /// and not expired.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut parts = token.split('.');
        let (header, payload, signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC takes any key length");
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        mac.verify_slice(&signature).ok()?;

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return None;
        }
        Some(claims)
    }
}

/// Typed admin-email configuration: comma-separated addresses per site id
/// with a mandatory `default` entry, parsed once at startup.
#[derive(Clone)]
pub struct AdminDirectory {
    by_site: HashMap<String, String>,
}

impl AdminDirectory {
    pub fn new(by_site: HashMap<String, String>) -> anyhow::Result<Self> {
        if !by_site.contains_key("default") {
            anyhow::bail!("security.admin_emails must contain a `default` entry");
        }
        Ok(Self { by_site })
    }

    /// Notification recipients for a site, falling back to the default entry.
    pub fn recipients_for(&self, site_id: &str) -> Vec<String> {
        let raw = self
            .by_site
            .get(site_id)
            .or_else(|| self.by_site.get("default"))
            .expect("default entry checked at construction");
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the address belongs to any site's admin list.
    pub fn is_admin(&self, email: &str) -> bool {
        let needle = email.trim().to_lowercase();
        self.by_site.values().any(|raw| {
            raw.split(',')
                .any(|entry| entry.trim().to_lowercase() == needle)
        })
    }
}
