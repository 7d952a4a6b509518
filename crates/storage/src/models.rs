use domain::{Comment, PublicComment};
use sqlx::FromRow;

/// Raw row shape. `is_admin` lives as an INTEGER in SQLite.
#[derive(FromRow)]
pub struct SqlComment {
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
    pub created_at: i64,
    pub is_admin: i64,
}

impl From<SqlComment> for Comment {
    fn from(sql: SqlComment) -> Self {
        Comment {
            id: sql.id,
            site_id: sql.site_id,
            parent_id: sql.parent_id,
            content: sql.content,
            author_name: sql.author_name,
            email: sql.email,
            email_md5: sql.email_md5,
            avatar_id: sql.avatar_id,
            ip_address: sql.ip_address,
            user_agent: sql.user_agent,
            context_url: sql.context_url,
            created_at: sql.created_at,
            is_admin: sql.is_admin != 0,
        }
    }
}

/// Public projection row: the column list of every non-admin SELECT.
/// Email, IP and user agent are projected out at the query level, not here.
#[derive(FromRow)]
pub struct SqlPublicComment {
    pub id: i64,
    pub site_id: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author_name: String,
    pub email_md5: String,
    pub avatar_id: String,
    pub context_url: Option<String>,
    pub created_at: i64,
    pub is_admin: i64,
}

impl From<SqlPublicComment> for PublicComment {
    fn from(sql: SqlPublicComment) -> Self {
        PublicComment {
            id: sql.id,
            site_id: sql.site_id,
            parent_id: sql.parent_id,
            content: sql.content,
            author_name: sql.author_name,
            email_md5: sql.email_md5,
            avatar_id: sql.avatar_id,
            context_url: sql.context_url,
            created_at: sql.created_at,
            is_admin: sql.is_admin != 0,
        }
    }
}
