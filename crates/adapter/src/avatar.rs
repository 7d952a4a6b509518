const QQ_BASE: &str = "https://q1.qlogo.cn";
const GRAVATAR_BASE: &str = "https://www.gravatar.com";

/// Avatar image lookup with a fixed provider chain: the QQ avatar service for
/// numeric-id QQ addresses, then Gravatar keyed by the identity hash. The
/// first provider answering 2xx wins; that ordering decides which picture
/// users actually see, so it must not be reshuffled.
#[derive(Clone)]
pub struct AvatarProviders {
    http: reqwest::Client,
    qq_base: String,
    gravatar_base: String,
}

impl Default for AvatarProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarProviders {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            qq_base: QQ_BASE.to_string(),
            gravatar_base: GRAVATAR_BASE.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        qq_base: impl Into<String>,
        gravatar_base: impl Into<String>,
    ) -> Self {
        self.qq_base = qq_base.into();
        self.gravatar_base = gravatar_base.into();
        self
    }

    /// Fetches the avatar for an email and its identity hash, or `None` when
    /// no provider has one. Transport errors are logged and treated as a
    /// miss so a flaky provider never breaks the caller.
    pub async fn fetch(&self, email: &str, email_md5: &str) -> Option<Vec<u8>> {
        let normalized = email.trim().to_lowercase();

        if let Some(number) = qq_number(&normalized) {
            let url = format!("{}/g?b=qq&nk={number}&s=100", self.qq_base);
            if let Some(bytes) = self.try_provider(&url).await {
                return Some(bytes);
            }
        }

        let url = format!("{}/avatar/{email_md5}?d=404", self.gravatar_base);
        self.try_provider(&url).await
    }

    async fn try_provider(&self, url: &str) -> Option<Vec<u8>> {
        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(e) => {
                    tracing::warn!(%url, "avatar body read failed: {e}");
                    None
                }
            },
            Ok(response) => {
                tracing::debug!(%url, status = %response.status(), "avatar provider miss");
                None
            }
            Err(e) => {
                tracing::warn!(%url, "avatar provider unreachable: {e}");
                None
            }
        }
    }
}

/// The QQ numeric id when the normalized address is `<digits>@qq.com`.
fn qq_number(normalized_email: &str) -> Option<&str> {
    let number = normalized_email.strip_suffix("@qq.com")?;
    if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) {
        Some(number)
    } else {
        None
    }
}
