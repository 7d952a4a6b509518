use serde::Deserialize;

const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Cloudflare Turnstile verification client.
#[derive(Clone)]
pub struct TurnstileVerifier {
    http: reqwest::Client,
    secret: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct SiteverifyOutcome {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl TurnstileVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret: secret.into(),
            endpoint: SITEVERIFY_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns whether the challenge token passed verification. Transport
    /// errors bubble up; a clean "no" is `Ok(false)`.
    pub async fn verify(&self, token: &str, remote_ip: &str) -> anyhow::Result<bool> {
        let outcome: SiteverifyOutcome = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("secret", self.secret.as_str()),
                ("response", token),
                ("remoteip", remote_ip),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !outcome.success {
            tracing::warn!(error_codes = ?outcome.error_codes, "turnstile verification failed");
        }
        Ok(outcome.success)
    }
}
