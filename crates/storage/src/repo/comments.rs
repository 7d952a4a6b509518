use crate::{
    models::{SqlComment, SqlPublicComment},
    Db, StoreError,
};
use domain::{Comment, CommentAuthor, NewComment, PublicComment, ReplyPage, RootPage, ThreadPreview};

/// Column list served to non-admin clients. Raw email, IP and user agent are
/// projected out here so no public read path can leak them.
const PUBLIC_COLUMNS: &str = "id, site_id, parent_id, content, author_name, \
     email_md5, avatar_id, context_url, created_at, is_admin";

impl Db {
    /// Inserts a comment, assigning its id and `created_at` (epoch ms).
    /// The caller owns the follow-up freshness invalidation for the site and
    /// must issue it only after this returns.
    pub async fn insert_comment(&self, new: &NewComment) -> Result<i64, StoreError> {
        for (name, value) in [
            ("site_id", &new.site_id),
            ("content", &new.content),
            ("author_name", &new.author_name),
            ("email_md5", &new.email_md5),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::MissingField(name));
            }
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO comments (
                site_id, parent_id, content, author_name,
                email, email_md5, avatar_id,
                ip_address, user_agent, context_url,
                created_at, is_admin
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.site_id)
        .bind(new.parent_id)
        .bind(&new.content)
        .bind(&new.author_name)
        .bind(&new.email)
        .bind(&new.email_md5)
        .bind(&new.avatar_id)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(&new.context_url)
        .bind(created_at)
        .bind(new.is_admin as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// One page of root comments for a site, newest first, each enriched with
    /// its direct-reply count and at most one promoted admin reply (the
    /// earliest). Deeper descendants stay behind [`Db::fetch_replies`], so a
    /// listing never materializes a full discussion tree.
    pub async fn fetch_root_page(
        &self,
        site_id: &str,
        page: i64,
        page_size: i64,
        context_url: Option<&str>,
    ) -> Result<RootPage, StoreError> {
        let page = page.max(1);
        let offset = (page - 1) * page_size;

        let list_sql = format!(
            "SELECT {PUBLIC_COLUMNS} FROM comments \
             WHERE site_id = ? AND parent_id IS NULL{} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            if context_url.is_some() {
                " AND context_url = ?"
            } else {
                ""
            }
        );
        let mut list_query = sqlx::query_as::<_, SqlPublicComment>(&list_sql).bind(site_id);
        if let Some(url) = context_url {
            list_query = list_query.bind(url);
        }
        let roots = list_query
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut comments = Vec::with_capacity(roots.len());
        for root in roots {
            let root: PublicComment = root.into();
            comments.push(ThreadPreview {
                reply_count: self.count_replies(root.id).await?,
                admin_reply: self.earliest_admin_reply(root.id).await?,
                comment: root,
            });
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM comments WHERE site_id = ? AND parent_id IS NULL{}",
            if context_url.is_some() {
                " AND context_url = ?"
            } else {
                ""
            }
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(site_id);
        if let Some(url) = context_url {
            count_query = count_query.bind(url);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        Ok(RootPage {
            comments,
            total,
            page,
            page_size,
        })
    }

    async fn count_replies(&self, parent_id: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn earliest_admin_reply(&self, parent_id: i64) -> Result<Option<PublicComment>, StoreError> {
        let sql = format!(
            "SELECT {PUBLIC_COLUMNS} FROM comments \
             WHERE parent_id = ? AND is_admin = 1 \
             ORDER BY created_at ASC LIMIT 1"
        );
        let row = sqlx::query_as::<_, SqlPublicComment>(&sql)
            .bind(parent_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Direct children of `parent_id`, newest-inserted first, with keyset
    /// pagination: rows strictly below `last_id` when a cursor is given.
    /// Fetches one extra row to learn whether more pages exist.
    pub async fn fetch_replies(
        &self,
        parent_id: i64,
        last_id: Option<i64>,
        limit: i64,
    ) -> Result<ReplyPage, StoreError> {
        let limit = limit.max(1);
        let sql = format!(
            "SELECT {PUBLIC_COLUMNS} FROM comments WHERE parent_id = ?{} \
             ORDER BY id DESC LIMIT ?",
            if last_id.is_some() { " AND id < ?" } else { "" }
        );
        let mut query = sqlx::query_as::<_, SqlPublicComment>(&sql).bind(parent_id);
        if let Some(cursor) = last_id {
            query = query.bind(cursor);
        }
        let mut rows = query.bind(limit + 1).fetch_all(&self.pool).await?;

        let has_more = rows.len() as i64 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }
        let replies: Vec<PublicComment> = rows.into_iter().map(Into::into).collect();
        let last_id = replies.last().map(|r| r.id);

        Ok(ReplyPage {
            replies,
            has_more,
            last_id,
        })
    }

    /// Notification routing only. The result carries a raw email address and
    /// must never reach a client.
    pub async fn fetch_author_of(&self, comment_id: i64) -> Result<Option<CommentAuthor>, StoreError> {
        let row = sqlx::query_as::<_, (Option<String>, String)>(
            "SELECT email, author_name FROM comments WHERE id = ?",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(email, author_name)| CommentAuthor { email, author_name }))
    }

    /// Moderation listing: full rows (email, IP, UA included), optionally
    /// filtered by identity hash and/or site, newest first, capped at 50.
    pub async fn admin_list(
        &self,
        email_md5: Option<&str>,
        site_id: Option<&str>,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut sql = String::from("SELECT * FROM comments");
        let mut conditions = Vec::new();
        if email_md5.is_some() {
            conditions.push("email_md5 = ?");
        }
        if site_id.is_some() {
            conditions.push("site_id = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT 50");

        let mut query = sqlx::query_as::<_, SqlComment>(&sql);
        if let Some(hash) = email_md5 {
            query = query.bind(hash);
        }
        if let Some(site) = site_id {
            query = query.bind(site);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Physical delete of a single comment. Returns the site it belonged to,
    /// if it existed, so the caller can invalidate that site's freshness
    /// token.
    pub async fn delete_comment(&self, id: i64) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let site = sqlx::query_scalar::<_, String>("SELECT site_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if site.is_some() {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(site)
    }

    /// Deletes every comment whose identity hash matches, across all sites.
    /// Returns the distinct sites that lost rows.
    pub async fn delete_by_email_hash(&self, email_md5: &str) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sites = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT site_id FROM comments WHERE email_md5 = ?",
        )
        .bind(email_md5)
        .fetch_all(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM comments WHERE email_md5 = ?")
            .bind(email_md5)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(sites)
    }

    /// Deletes an explicit id set. Returns the distinct sites that lost rows;
    /// a batch may span several.
    pub async fn delete_by_ids(&self, ids: &[i64]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");

        let mut tx = self.pool.begin().await?;
        let select_sql = format!(
            "SELECT DISTINCT site_id FROM comments WHERE id IN ({placeholders})"
        );
        let mut select = sqlx::query_scalar::<_, String>(&select_sql);
        for id in ids {
            select = select.bind(id);
        }
        let sites = select.fetch_all(&mut *tx).await?;

        let delete_sql = format!("DELETE FROM comments WHERE id IN ({placeholders})");
        let mut delete = sqlx::query(&delete_sql);
        for id in ids {
            delete = delete.bind(id);
        }
        delete.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::identity_hash;
    use std::time::Duration;

    async fn test_db() -> Db {
        Db::new("sqlite::memory:").await.expect("in-memory db")
    }

    fn draft(site: &str, parent: Option<i64>, email: &str, content: &str) -> NewComment {
        NewComment {
            site_id: site.to_string(),
            parent_id: parent,
            content: content.to_string(),
            author_name: "tester".to_string(),
            email: Some(email.to_string()),
            email_md5: identity_hash(email),
            avatar_id: identity_hash(email),
            ip_address: "127.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
            context_url: None,
            is_admin: false,
        }
    }

    // created_at has millisecond granularity; keep inserts on distinct ticks
    // where a test asserts on time ordering.
    async fn tick() {
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    #[tokio::test]
    async fn insert_rejects_missing_required_fields() {
        let db = test_db().await;
        let mut bad = draft("demo", None, "a@x.com", "hi");
        bad.author_name = "  ".to_string();
        match db.insert_comment(&bad).await {
            Err(StoreError::MissingField("author_name")) => {}
            other => panic!("expected MissingField(author_name), got {other:?}"),
        }

        let mut bad = draft("demo", None, "a@x.com", "hi");
        bad.email_md5 = String::new();
        assert!(matches!(
            db.insert_comment(&bad).await,
            Err(StoreError::MissingField("email_md5"))
        ));
    }

    #[tokio::test]
    async fn admin_reply_promotion_scenario() {
        let db = test_db().await;
        let a = db
            .insert_comment(&draft("demo", None, "a@x.com", "root A"))
            .await
            .unwrap();

        let page = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.comments[0].comment.id, a);
        assert_eq!(page.comments[0].reply_count, 0);
        assert!(page.comments[0].admin_reply.is_none());
        assert_eq!(page.comments[0].comment.email_md5, identity_hash("a@x.com"));

        tick().await;
        let mut admin_reply = draft("demo", Some(a), "staff@x.com", "reply B");
        admin_reply.is_admin = true;
        let b = db.insert_comment(&admin_reply).await.unwrap();

        let page = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page.comments[0].reply_count, 1);
        assert_eq!(page.comments[0].admin_reply.as_ref().unwrap().id, b);

        tick().await;
        let c = db
            .insert_comment(&draft("demo", Some(a), "c@x.com", "reply C"))
            .await
            .unwrap();

        let page = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page.comments[0].reply_count, 2);
        // Earliest admin reply stays promoted even after newer replies land.
        assert_eq!(page.comments[0].admin_reply.as_ref().unwrap().id, b);

        let replies = db.fetch_replies(a, None, 10).await.unwrap();
        let ids: Vec<i64> = replies.replies.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c, b]);
        assert!(!replies.has_more);
    }

    #[tokio::test]
    async fn promoted_admin_reply_is_the_earliest_one() {
        let db = test_db().await;
        let root = db
            .insert_comment(&draft("demo", None, "a@x.com", "root"))
            .await
            .unwrap();
        tick().await;
        let mut first = draft("demo", Some(root), "staff@x.com", "first admin");
        first.is_admin = true;
        let first_id = db.insert_comment(&first).await.unwrap();
        tick().await;
        let mut second = draft("demo", Some(root), "staff@x.com", "second admin");
        second.is_admin = true;
        db.insert_comment(&second).await.unwrap();

        let page = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page.comments[0].admin_reply.as_ref().unwrap().id, first_id);
    }

    #[tokio::test]
    async fn root_listing_is_newest_first_and_windowed() {
        let db = test_db().await;
        let mut ids = Vec::new();
        for i in 0..13 {
            ids.push(
                db.insert_comment(&draft("demo", None, "a@x.com", &format!("c{i}")))
                    .await
                    .unwrap(),
            );
            tick().await;
        }
        // Replies must not appear in the root listing.
        db.insert_comment(&draft("demo", Some(ids[0]), "b@x.com", "reply"))
            .await
            .unwrap();

        let page1 = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page1.total, 13);
        assert_eq!(page1.page, 1);
        assert_eq!(page1.comments.len(), 10);
        let newest: Vec<i64> = ids.iter().rev().take(10).copied().collect();
        let got: Vec<i64> = page1.comments.iter().map(|c| c.comment.id).collect();
        assert_eq!(got, newest);

        let page2 = db.fetch_root_page("demo", 2, 10, None).await.unwrap();
        assert_eq!(page2.comments.len(), 3);
        let oldest: Vec<i64> = ids.iter().take(3).rev().copied().collect();
        let got: Vec<i64> = page2.comments.iter().map(|c| c.comment.id).collect();
        assert_eq!(got, oldest);
    }

    #[tokio::test]
    async fn context_url_filter_is_exact() {
        let db = test_db().await;
        let mut on_post = draft("demo", None, "a@x.com", "on the post");
        on_post.context_url = Some("https://example.com/post".to_string());
        let on_post_id = db.insert_comment(&on_post).await.unwrap();

        let mut elsewhere = draft("demo", None, "a@x.com", "elsewhere");
        elsewhere.context_url = Some("https://example.com/post/".to_string());
        db.insert_comment(&elsewhere).await.unwrap();
        db.insert_comment(&draft("demo", None, "a@x.com", "no context"))
            .await
            .unwrap();

        let filtered = db
            .fetch_root_page("demo", 1, 10, Some("https://example.com/post"))
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.comments[0].comment.id, on_post_id);

        // No filter returns every root regardless of context_url.
        let all = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(all.total, 3);
    }

    #[tokio::test]
    async fn reply_cursor_pagination_is_stable() {
        let db = test_db().await;
        let root = db
            .insert_comment(&draft("demo", None, "a@x.com", "root"))
            .await
            .unwrap();
        let mut reply_ids = Vec::new();
        for i in 0..25 {
            reply_ids.push(
                db.insert_comment(&draft("demo", Some(root), "b@x.com", &format!("r{i}")))
                    .await
                    .unwrap(),
            );
        }

        let page1 = db.fetch_replies(root, None, 10).await.unwrap();
        assert_eq!(page1.replies.len(), 10);
        assert!(page1.has_more);
        let cursor = page1.last_id.unwrap();
        assert_eq!(cursor, page1.replies.last().unwrap().id);

        let page2 = db.fetch_replies(root, Some(cursor), 10).await.unwrap();
        assert!(page2.replies.iter().all(|r| r.id < cursor));
        assert!(page2.has_more);

        // A concurrent insert must not disturb a cursor-based refetch.
        db.insert_comment(&draft("demo", Some(root), "c@x.com", "late arrival"))
            .await
            .unwrap();
        let page2_again = db.fetch_replies(root, Some(cursor), 10).await.unwrap();
        assert_eq!(
            page2.replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            page2_again.replies.iter().map(|r| r.id).collect::<Vec<_>>()
        );

        let page3 = db
            .fetch_replies(root, page2.last_id, 10)
            .await
            .unwrap();
        assert_eq!(page3.replies.len(), 5);
        assert!(!page3.has_more);

        let empty = db.fetch_replies(root, Some(reply_ids[0]), 10).await.unwrap();
        assert!(empty.replies.is_empty());
        assert!(empty.last_id.is_none());
        assert!(!empty.has_more);
    }

    #[tokio::test]
    async fn replies_to_replies_stay_off_the_root_reply_page() {
        let db = test_db().await;
        let root = db
            .insert_comment(&draft("demo", None, "a@x.com", "root"))
            .await
            .unwrap();
        let child = db
            .insert_comment(&draft("demo", Some(root), "b@x.com", "child"))
            .await
            .unwrap();
        let grandchild = db
            .insert_comment(&draft("demo", Some(child), "c@x.com", "grandchild"))
            .await
            .unwrap();

        // The grandchild keeps its true parent_id but only surfaces under it.
        let under_root = db.fetch_replies(root, None, 10).await.unwrap();
        assert_eq!(under_root.replies.len(), 1);
        assert_eq!(under_root.replies[0].id, child);

        let under_child = db.fetch_replies(child, None, 10).await.unwrap();
        assert_eq!(under_child.replies[0].id, grandchild);
        assert_eq!(under_child.replies[0].parent_id, Some(child));
    }

    #[tokio::test]
    async fn fetch_author_returns_routing_data() {
        let db = test_db().await;
        let id = db
            .insert_comment(&draft("demo", None, "Reply-Me@x.com", "root"))
            .await
            .unwrap();
        let author = db.fetch_author_of(id).await.unwrap().unwrap();
        assert_eq!(author.email.as_deref(), Some("Reply-Me@x.com"));
        assert_eq!(author.author_name, "tester");
        assert!(db.fetch_author_of(id + 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_list_filters_and_caps() {
        let db = test_db().await;
        for i in 0..55 {
            db.insert_comment(&draft("busy", None, "spam@x.com", &format!("s{i}")))
                .await
                .unwrap();
        }
        db.insert_comment(&draft("quiet", None, "other@x.com", "fine"))
            .await
            .unwrap();

        let all = db.admin_list(None, None).await.unwrap();
        assert_eq!(all.len(), 50);

        let by_site = db.admin_list(None, Some("quiet")).await.unwrap();
        assert_eq!(by_site.len(), 1);
        // Admin rows expose the raw email for moderation.
        assert_eq!(by_site[0].email.as_deref(), Some("other@x.com"));

        let by_hash = db
            .admin_list(Some(&identity_hash("other@x.com")), None)
            .await
            .unwrap();
        assert_eq!(by_hash.len(), 1);

        let both = db
            .admin_list(Some(&identity_hash("spam@x.com")), Some("quiet"))
            .await
            .unwrap();
        assert!(both.is_empty());
    }

    #[tokio::test]
    async fn delete_reports_affected_site() {
        let db = test_db().await;
        let id = db
            .insert_comment(&draft("demo", None, "a@x.com", "bye"))
            .await
            .unwrap();
        assert_eq!(db.delete_comment(id).await.unwrap().as_deref(), Some("demo"));
        assert!(db.delete_comment(id).await.unwrap().is_none());
        let page = db.fetch_root_page("demo", 1, 10, None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn batch_delete_by_email_hash_spans_sites() {
        let db = test_db().await;
        db.insert_comment(&draft("site-a", None, "GONE@x.com", "1"))
            .await
            .unwrap();
        db.insert_comment(&draft("site-b", None, "gone@x.com ", "2"))
            .await
            .unwrap();
        let keep = db
            .insert_comment(&draft("site-a", None, "keep@x.com", "3"))
            .await
            .unwrap();

        let mut sites = db
            .delete_by_email_hash(&identity_hash("gone@x.com"))
            .await
            .unwrap();
        sites.sort();
        assert_eq!(sites, vec!["site-a".to_string(), "site-b".to_string()]);

        let page = db.fetch_root_page("site-a", 1, 10, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.comments[0].comment.id, keep);
        assert_eq!(db.fetch_root_page("site-b", 1, 10, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn batch_delete_by_ids_spans_sites() {
        let db = test_db().await;
        let a = db
            .insert_comment(&draft("site-a", None, "a@x.com", "1"))
            .await
            .unwrap();
        let b = db
            .insert_comment(&draft("site-b", None, "b@x.com", "2"))
            .await
            .unwrap();
        db.insert_comment(&draft("site-a", None, "c@x.com", "3"))
            .await
            .unwrap();

        let mut sites = db.delete_by_ids(&[a, b]).await.unwrap();
        sites.sort();
        assert_eq!(sites, vec!["site-a".to_string(), "site-b".to_string()]);
        assert_eq!(db.fetch_root_page("site-a", 1, 10, None).await.unwrap().total, 1);

        assert!(db.delete_by_ids(&[]).await.unwrap().is_empty());
    }
}
