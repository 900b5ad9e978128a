// src/repositories/postgres/comments.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use livecart_common::models::Comment;
use livecart_common::traits::repository_traits::CommentRepository;
use crate::Error;

/// Append-only comment log: no update or delete.
#[derive(Clone)]
pub struct PostgresCommentRepository {
    pool: Pool<Postgres>,
}

impl PostgresCommentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO live_comments (
                id, live_session_id, platform,
                username, user_id, comment_text,
                matched_keyword, product_code, source_comment_id,
                timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
            .bind(comment.id)
            .bind(&comment.live_session_id)
            .bind(comment.platform)
            .bind(&comment.username)
            .bind(&comment.user_id)
            .bind(&comment.comment_text)
            .bind(&comment.matched_keyword)
            .bind(&comment.product_code)
            .bind(&comment.source_comment_id)
            .bind(comment.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_session_comments(&self, live_session_id: &str, limit: i64) -> Result<Vec<Comment>, Error> {
        let rows = sqlx::query_as::<_, Comment>(
            r#"
            SELECT
                id, live_session_id, platform,
                username, user_id, comment_text,
                matched_keyword, product_code, source_comment_id,
                timestamp
            FROM live_comments
            WHERE live_session_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
            .bind(live_session_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
