// File: src/platforms/youtube/mod.rs

pub mod client;

pub use client::{YouTubeClient, LiveChatMessage, LiveChatMessageList};

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use livecart_common::models::{Platform, RawComment};
use crate::Error;
use crate::platforms::{CommentPage, CommentSource};

/// Live chat adapter for the video-hosting platform. The cursor is the
/// API's `nextPageToken`; the server's `pollingIntervalMillis` is passed
/// on as the poll hint.
pub struct YouTubeLiveChat {
    client: YouTubeClient,
    live_chat_id: Option<String>,
    page_token: Option<String>,
}

impl YouTubeLiveChat {
    pub fn new(client: YouTubeClient) -> Self {
        Self {
            client,
            live_chat_id: None,
            page_token: None,
        }
    }
}

/// Maps one chat item to a raw comment. Items without display text (e.g.
/// deletion or moderation events) yield `None`.
pub fn normalize_message(item: &LiveChatMessage) -> Option<RawComment> {
    let text = item.snippet.display_message.clone()?;
    let timestamp = item
        .snippet
        .published_at
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(RawComment {
        platform: Platform::YouTube,
        username: item.author_details.display_name.clone(),
        user_id: item.author_details.channel_id.clone(),
        comment_text: text,
        comment_id: Some(item.id.clone()),
        timestamp,
    })
}

#[async_trait]
impl CommentSource for YouTubeLiveChat {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn locate_stream(&mut self, content_id: &str) -> Result<Option<String>, Error> {
        let chat_id = self.client.get_live_chat_id(content_id).await?;
        self.live_chat_id = chat_id.clone();
        self.page_token = None;
        Ok(chat_id)
    }

    async fn fetch_new(&mut self) -> Result<CommentPage, Error> {
        let chat_id = self
            .live_chat_id
            .as_deref()
            .ok_or_else(|| Error::Platform("YouTube: live chat not located".into()))?;

        let list = self
            .client
            .fetch_chat_messages(chat_id, self.page_token.as_deref())
            .await?;

        let comments: Vec<RawComment> = list.items.iter().filter_map(normalize_message).collect();
        debug!("(YouTubeLiveChat) fetched {} item(s), {} comment(s)", list.items.len(), comments.len());

        if list.next_page_token.is_some() {
            self.page_token = list.next_page_token;
        }

        Ok(CommentPage {
            comments,
            next_poll: list.polling_interval_millis.map(Duration::from_millis),
        })
    }
}
