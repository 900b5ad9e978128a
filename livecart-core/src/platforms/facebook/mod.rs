// File: src/platforms/facebook/mod.rs

pub mod client;

pub use client::{FacebookClient, GraphComment, LiveVideo};

use std::collections::HashSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use livecart_common::models::{Platform, RawComment};
use crate::Error;
use crate::platforms::{CommentPage, CommentSource};

/// Content ids with this prefix name a page whose current live video
/// should be resolved, rather than a video.
pub const PAGE_PREFIX: &str = "page:";

/// Graph API timestamps look like `2024-03-01T10:15:30+0000`.
pub fn parse_created_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn normalize_comment(comment: &GraphComment) -> Option<RawComment> {
    let text = comment.message.clone()?;
    let (user_id, username) = match &comment.from {
        Some(user) => (user.id.clone(), user.name.clone()),
        // Comments from users who have not granted the page access arrive anonymized.
        None => (String::new(), "Facebook user".to_string()),
    };
    Some(RawComment {
        platform: Platform::Facebook,
        username,
        user_id,
        comment_text: text,
        comment_id: Some(comment.id.clone()),
        timestamp: parse_created_time(&comment.created_time),
    })
}

/// Cursor over a video's comment list. `since` is second-granular and
/// inclusive, so ids already delivered at the cursor second are remembered
/// and skipped.
#[derive(Debug, Default)]
pub struct CommentCursor {
    since: Option<i64>,
    seen_at_since: HashSet<String>,
}

impl CommentCursor {
    pub fn since(&self) -> Option<i64> {
        self.since
    }

    /// Filters `batch` down to comments not yet delivered and advances the
    /// cursor past them.
    pub fn advance(&mut self, batch: Vec<GraphComment>) -> Vec<GraphComment> {
        let mut fresh = Vec::with_capacity(batch.len());
        for comment in batch {
            let Some(secs) = parse_created_time(&comment.created_time).map(|t| t.timestamp()) else {
                debug!(comment_id = %comment.id, created_time = %comment.created_time,
                    "Dropping comment with unparseable timestamp.");
                continue;
            };
            match self.since {
                Some(since) if secs < since => {
                    debug!(comment_id = %comment.id, comment_secs = secs, cursor_secs = since,
                        "Dropping comment older than cursor.");
                    continue;
                }
                Some(since) if secs == since && self.seen_at_since.contains(&comment.id) => continue,
                Some(since) if secs == since => {
                    self.seen_at_since.insert(comment.id.clone());
                }
                _ => {
                    self.since = Some(secs);
                    self.seen_at_since.clear();
                    self.seen_at_since.insert(comment.id.clone());
                }
            }
            fresh.push(comment);
        }
        fresh
    }
}

/// Live-video comment adapter for the social-page platform. The Graph API
/// gives no polling hint, so the poller's default cadence applies.
pub struct FacebookLiveComments {
    client: FacebookClient,
    video_id: Option<String>,
    cursor: CommentCursor,
}

impl FacebookLiveComments {
    pub fn new(client: FacebookClient) -> Self {
        Self {
            client,
            video_id: None,
            cursor: CommentCursor::default(),
        }
    }
}

#[async_trait]
impl CommentSource for FacebookLiveComments {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn locate_stream(&mut self, content_id: &str) -> Result<Option<String>, Error> {
        let found = match content_id.strip_prefix(PAGE_PREFIX) {
            Some(page_id) => {
                let videos = self.client.fetch_live_videos(page_id).await?;
                videos.into_iter().find(LiveVideo::is_live).map(|v| v.id)
            }
            None => {
                let video = self.client.fetch_video(content_id).await?;
                video.is_live().then_some(video.id)
            }
        };
        if let Some(id) = &found {
            info!("(FacebookLiveComments) attached to live video {}", id);
        }
        self.video_id = found.clone();
        self.cursor = CommentCursor::default();
        Ok(found)
    }

    async fn fetch_new(&mut self) -> Result<CommentPage, Error> {
        let video_id = self
            .video_id
            .as_deref()
            .ok_or_else(|| Error::Platform("Facebook: live video not located".into()))?;

        let batch = self.client.fetch_comments(video_id, self.cursor.since()).await?;
        let fetched = batch.len();
        let fresh = self.cursor.advance(batch);
        debug!("(FacebookLiveComments) fetched {}, {} new", fetched, fresh.len());

        Ok(CommentPage {
            comments: fresh.iter().filter_map(normalize_comment).collect(),
            next_poll: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::client::GraphUser;

    fn comment(id: &str, created: &str, text: &str) -> GraphComment {
        GraphComment {
            id: id.into(),
            from: Some(GraphUser { id: format!("u-{}", id), name: format!("name-{}", id) }),
            message: Some(text.into()),
            created_time: created.into(),
        }
    }

    #[test]
    fn parses_graph_timestamps() {
        let t = parse_created_time("2024-03-01T10:15:30+0000").expect("parses");
        assert_eq!(t.to_rfc3339(), "2024-03-01T10:15:30+00:00");
        assert!(parse_created_time("yesterday").is_none());
    }

    #[test]
    fn cursor_never_redelivers_at_the_inclusive_boundary() {
        let mut cursor = CommentCursor::default();
        let first = cursor.advance(vec![
            comment("a", "2024-03-01T10:00:00+0000", "hi"),
            comment("b", "2024-03-01T10:00:05+0000", "BUY SAR001"),
        ]);
        assert_eq!(first.len(), 2);

        // The API re-returns b because since == b's second.
        let second = cursor.advance(vec![
            comment("b", "2024-03-01T10:00:05+0000", "BUY SAR001"),
            comment("c", "2024-03-01T10:00:05+0000", "same second"),
            comment("d", "2024-03-01T10:00:09+0000", "later"),
        ]);
        let ids: Vec<_> = second.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);

        let third = cursor.advance(vec![comment("d", "2024-03-01T10:00:09+0000", "later")]);
        assert!(third.is_empty());
    }

    #[test]
    fn late_and_undated_comments_are_skipped() {
        let mut cursor = CommentCursor::default();
        assert_eq!(cursor.advance(vec![comment("a", "2024-03-01T10:00:10+0000", "hi")]).len(), 1);

        // Graph returned a comment stamped before the cursor second.
        let late = cursor.advance(vec![
            comment("late", "2024-03-01T10:00:04+0000", "BUY SAR001"),
            comment("bad", "yesterday", "BUY SAR002"),
            comment("e", "2024-03-01T10:00:12+0000", "next"),
        ]);
        let ids: Vec<_> = late.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["e"]);
        assert_eq!(cursor.since(), Some(parse_created_time("2024-03-01T10:00:12+0000").unwrap().timestamp()));
    }

    #[test]
    fn normalizes_comments_and_handles_anonymous_authors() {
        let c = comment("x", "2024-03-01T10:00:00+0000", "buy sar002 please");
        let raw = normalize_comment(&c).expect("has message");
        assert_eq!(raw.platform, Platform::Facebook);
        assert_eq!(raw.username, "name-x");
        assert_eq!(raw.user_id, "u-x");
        assert_eq!(raw.comment_id.as_deref(), Some("x"));

        let anon = GraphComment { from: None, ..c.clone() };
        let raw = normalize_comment(&anon).expect("has message");
        assert_eq!(raw.username, "Facebook user");

        let empty = GraphComment { message: None, ..c };
        assert!(normalize_comment(&empty).is_none());
    }

    #[test]
    fn live_status_detection() {
        let v = |s: Option<&str>| LiveVideo { id: "1".into(), status: s.map(String::from), title: None };
        assert!(v(Some("LIVE")).is_live());
        assert!(v(Some("LIVE_NOW")).is_live());
        assert!(!v(Some("VOD")).is_live());
        assert!(!v(None).is_live());
    }
}
