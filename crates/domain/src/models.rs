use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tenant identifier. Every query and cache token is partitioned by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() {
            return Err("Site ID cannot be empty.".to_string());
        }
        if s.len() > 64 {
            return Err("Site ID is too long (max 64 chars).".to_string());
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err("Site ID contains invalid characters.".to_string());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully hydrated comment row. Only admin reads and internal plumbing see
/// this shape; public endpoints serve [`PublicComment`] instead.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub site_id: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author_name: String,
    pub email: Option<String>,
    pub email_md5: String,
    pub avatar_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub context_url: Option<String>,
    /// Epoch milliseconds, assigned once at insert.
    pub created_at: i64,
    pub is_admin: bool,
}

/// Public projection of a comment. `email`, `ip_address` and `user_agent`
/// never leave the server through this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicComment {
    pub id: i64,
    pub site_id: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author_name: String,
    pub email_md5: String,
    pub avatar_id: String,
    pub context_url: Option<String>,
    pub created_at: i64,
    pub is_admin: bool,
}

/// A root comment enriched for the listing view: how many direct replies it
/// has, and at most one promoted admin reply (the earliest one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPreview {
    #[serde(flatten)]
    pub comment: PublicComment,
    pub reply_count: i64,
    pub admin_reply: Option<PublicComment>,
}

/// One page of root comments plus the total root count for pagination UI.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootPage {
    pub comments: Vec<ThreadPreview>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// One keyset-paginated page of direct replies.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyPage {
    pub replies: Vec<PublicComment>,
    pub has_more: bool,
    /// Cursor for the next page: id of the last returned row, if any.
    pub last_id: Option<i64>,
}

/// Fields the caller supplies for an insert. `id` and `created_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub site_id: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author_name: String,
    pub email: Option<String>,
    pub email_md5: String,
    pub avatar_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub context_url: Option<String>,
    pub is_admin: bool,
}

/// Routing data for reply notifications. Internal only, never serialized
/// into a response.
#[derive(Debug, Clone)]
pub struct CommentAuthor {
    pub email: Option<String>,
    pub author_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_id_accepts_domains_and_slugs() {
        assert!(SiteId::new("blog.example.com").is_ok());
        assert!(SiteId::new("my-site_01").is_ok());
    }

    #[test]
    fn site_id_rejects_empty_overlong_and_strange() {
        assert!(SiteId::new("").is_err());
        assert!(SiteId::new("a".repeat(65)).is_err());
        assert!(SiteId::new("spaced out").is_err());
        assert!(SiteId::new("semi;colon").is_err());
    }

    #[test]
    fn thread_preview_flattens_root_fields() {
        let preview = ThreadPreview {
            comment: PublicComment {
                id: 7,
                site_id: "demo".into(),
                parent_id: None,
                content: "hello".into(),
                author_name: "ann".into(),
                email_md5: "00".repeat(16),
                avatar_id: "00".repeat(16),
                context_url: None,
                created_at: 1_700_000_000_000,
                is_admin: false,
            },
            reply_count: 0,
            admin_reply: None,
        };
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["reply_count"], 0);
        assert!(json["admin_reply"].is_null());
        // The raw email is not even part of the shape.
        assert!(json.get("email").is_none());
    }
}
