use async_trait::async_trait;
use crate::error::Error;
use crate::models::Comment;

/// Append-only comment store. Nothing in this service updates or deletes
/// a stored comment.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), Error>;

    /// Up to `limit` most recent comments for a live session, newest first.
    async fn list_session_comments(
        &self,
        live_session_id: &str,
        limit: i64,
    ) -> Result<Vec<Comment>, Error>;
}
