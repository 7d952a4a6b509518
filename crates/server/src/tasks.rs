//! Fire-and-forget work that continues after the response has gone out:
//! avatar caching, email notifications and freshness-token writes. Each task
//! carries its own error boundary; a failure here is logged and never
//! reaches the originating request.

use crate::state::AppState;
use std::time::Duration;

pub const AVATAR_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// KV key for cached avatar bytes. The KV namespace is shared with login
/// codes, freshness tokens and rate counters; the prefix keeps the public
/// avatar endpoint from ever addressing those entries.
pub fn avatar_key(email_md5: &str) -> String {
    format!("avatar:{email_md5}")
}

/// Caches the avatar image for an email if none is cached yet. The presence
/// check is the best-effort dedup for rapid repeat commenters; a brief race
/// fetching twice is tolerable.
pub fn spawn_avatar_fetch(state: &AppState, email: String, email_md5: String) {
    let kv = state.kv.clone();
    let providers = state.avatars.clone();
    tokio::spawn(async move {
        let key = avatar_key(&email_md5);
        if kv.get(&key).await.is_some() {
            return;
        }
        if let Some(bytes) = providers.fetch(&email, &email_md5).await {
            kv.put(&key, bytes, Some(AVATAR_TTL)).await;
        }
    });
}

/// Overwrites the freshness token of every affected site. Spawned by the
/// mutation handlers after their store write has committed, so a reader can
/// never observe a fresh token ahead of fresh data.
pub fn spawn_freshness_bump(state: &AppState, site_ids: Vec<String>) {
    let freshness = state.freshness.clone();
    tokio::spawn(async move {
        for site_id in site_ids {
            freshness.touch(&site_id).await;
        }
    });
}

pub struct CommentNotification {
    pub site_id: String,
    pub comment_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub content: String,
    pub context_url: Option<String>,
}

/// Emails the parent comment's author (for replies) and the site's admins
/// about a new comment.
pub fn spawn_comment_notification(state: &AppState, input: CommentNotification) {
    let Some(client) = state.email.clone() else {
        tracing::debug!("email notifications disabled, skipping");
        return;
    };
    let db = state.db.clone();
    let admins = state.admins.clone();
    tokio::spawn(async move {
        if let Err(e) = notify(client, db, admins, input).await {
            tracing::error!("comment notification failed: {e:#}");
        }
    });
}

enum RecipientKind {
    User,
    Admin,
}

async fn notify(
    client: adapter::EmailClient,
    db: storage::Db,
    admins: crate::auth::AdminDirectory,
    input: CommentNotification,
) -> anyhow::Result<()> {
    let mut recipients: Vec<(String, RecipientKind)> = Vec::new();

    if let Some(parent_id) = input.parent_id {
        if let Some(parent) = db.fetch_author_of(parent_id).await? {
            if let Some(email) = parent.email {
                recipients.push((email, RecipientKind::User));
            }
        }
    }
    for admin in admins.recipients_for(&input.site_id) {
        if !recipients.iter().any(|(email, _)| *email == admin) {
            recipients.push((admin, RecipientKind::Admin));
        }
    }

    let link = match &input.context_url {
        Some(url) => format!("{url}#comment-{}", input.comment_id),
        None => format!("(Site ID: {})", input.site_id),
    };

    for (to, kind) in recipients {
        if to == input.author_email {
            continue;
        }
        let subject = match kind {
            RecipientKind::User => format!("Re: {} - New reply to your comment", input.site_id),
            RecipientKind::Admin => format!("[Admin] New Comment on {}", input.site_id),
        };
        let heading = match kind {
            RecipientKind::User => "New Reply to Your Comment",
            RecipientKind::Admin => "New Comment Received",
        };
        let html = format!(
            "<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2>{heading}</h2>\
             <p><strong>{}</strong> wrote:</p>\
             <blockquote>{}</blockquote>\
             <p><a href=\"{link}\">View Comment</a></p>\
             </div>",
            input.author_name, input.content
        );
        let text = format!(
            "New comment from {}:\n\n{}\n\nView here: {link}",
            input.author_name, input.content
        );
        let headers = [
            (
                "Message-ID".to_string(),
                format!(
                    "<{}.{}@{}.comments>",
                    input.comment_id,
                    chrono::Utc::now().timestamp_millis(),
                    input.site_id
                ),
            ),
            ("X-Entity-Ref-ID".to_string(), input.comment_id.to_string()),
        ];
        if let Err(e) = client.send(&to, &subject, &html, &text, &headers).await {
            // One bad recipient must not block the rest.
            tracing::warn!(%to, "notification delivery failed: {e:#}");
        }
    }
    Ok(())
}
