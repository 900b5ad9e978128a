// File: src/platforms/youtube/client.rs

use std::time::Duration;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use crate::Error;

const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Thin wrapper over the two Data API endpoints the chat adapter needs.
#[derive(Clone)]
pub struct YouTubeClient {
    http: ReqwestClient,
    api_key: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageList {
    #[serde(default)]
    pub items: Vec<LiveChatMessage>,
    pub next_page_token: Option<String>,
    pub polling_interval_millis: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    pub id: String,
    pub snippet: LiveChatSnippet,
    pub author_details: AuthorDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatSnippet {
    pub display_message: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    pub display_name: String,
    pub channel_id: String,
}

impl YouTubeClient {
    /// Upper bound on a single Data API request, connect through body.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(api_key: &str) -> Result<Self, Error> {
        Self::with_api_url(api_key, DEFAULT_API_URL)
    }

    pub fn with_api_url(api_key: &str, api_url: &str) -> Result<Self, Error> {
        let http = ReqwestClient::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// The active live chat id for a video, or `None` when the video is not
    /// live (or does not exist).
    pub async fn get_live_chat_id(&self, video_id: &str) -> Result<Option<String>, Error> {
        let resp: VideoListResponse = self
            .http
            .get(format!("{}/videos", self.api_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("part", "liveStreamingDetails"),
                ("id", video_id),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp
            .items
            .into_iter()
            .next()
            .and_then(|v| v.live_streaming_details)
            .and_then(|d| d.active_live_chat_id))
    }

    pub async fn fetch_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> Result<LiveChatMessageList, Error> {
        let mut query = vec![
            ("key", self.api_key.as_str()),
            ("part", "snippet,authorDetails"),
            ("liveChatId", live_chat_id),
            ("maxResults", "2000"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let list = self
            .http
            .get(format!("{}/liveChat/messages", self.api_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list)
    }
}
