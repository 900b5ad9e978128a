// File: src/platforms/mod.rs

use std::time::Duration;
use async_trait::async_trait;
use livecart_common::models::{Platform, RawComment};
use crate::Error;

/// One fetch worth of new comments, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPage {
    pub comments: Vec<RawComment>,
    /// Server-suggested delay before the next fetch, if the source gives one.
    pub next_poll: Option<Duration>,
}

/// Bridges one external comment API into canonical raw comments.
///
/// A source is stateful: it remembers which stream it is attached to and
/// a cursor, so consecutive `fetch_new` calls never return the same
/// source comment twice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentSource: Send {
    fn platform(&self) -> Platform;

    /// Resolves the live chat / comment stream behind a content id (video
    /// id, page id). `Ok(None)` means there is no active stream.
    async fn locate_stream(&mut self, content_id: &str) -> Result<Option<String>, Error>;

    /// Fetches comments that arrived since the previous call.
    async fn fetch_new(&mut self) -> Result<CommentPage, Error>;
}

/// Receives raw comments from pollers or relay clients.
pub trait CommentSink: Send + Sync {
    fn deliver(&self, live_session_id: &str, comment: RawComment);
}

pub mod poller;
pub mod manager;
pub mod youtube;
pub mod facebook;
