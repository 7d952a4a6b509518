use anyhow::Context;
use serde_json::json;

/// Outbound mail through a JSON delivery API (`POST {api_url}` with an
/// `x-api-key` header). Delivery failures surface as errors; callers on the
/// request path are expected to run this from a background task.
#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl EmailClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
        extra_headers: &[(String, String)],
    ) -> anyhow::Result<()> {
        let headers: serde_json::Map<String, serde_json::Value> = extra_headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&json!({
                "to": to,
                "subject": subject,
                "html": html,
                "text": text,
                "headers": headers,
            }))
            .send()
            .await
            .context("email API unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("email API rejected message: {status} {body}");
        }
        tracing::debug!(%to, %subject, "email accepted for delivery");
        Ok(())
    }
}
