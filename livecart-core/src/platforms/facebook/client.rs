// File: src/platforms/facebook/client.rs

use std::time::Duration;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use crate::Error;

const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v18.0";

#[derive(Clone)]
pub struct FacebookClient {
    http: ReqwestClient,
    access_token: String,
    graph_url: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveVideo {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl LiveVideo {
    pub fn is_live(&self) -> bool {
        matches!(self.status.as_deref(), Some("LIVE") | Some("LIVE_NOW"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphComment {
    pub id: String,
    #[serde(default)]
    pub from: Option<GraphUser>,
    #[serde(default)]
    pub message: Option<String>,
    pub created_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphUser {
    pub id: String,
    pub name: String,
}

impl FacebookClient {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(access_token: &str) -> Result<Self, Error> {
        Self::with_graph_url(access_token, DEFAULT_GRAPH_URL)
    }

    pub fn with_graph_url(access_token: &str, graph_url: &str) -> Result<Self, Error> {
        let http = ReqwestClient::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            access_token: access_token.to_string(),
            graph_url: graph_url.trim_end_matches('/').to_string(),
        })
    }

    /// Live videos published by a page.
    pub async fn fetch_live_videos(&self, page_id: &str) -> Result<Vec<LiveVideo>, Error> {
        let list: GraphList<LiveVideo> = self
            .http
            .get(format!("{}/{}/live_videos", self.graph_url, page_id))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("fields", "id,title,status,live_views"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.data)
    }

    pub async fn fetch_video(&self, video_id: &str) -> Result<LiveVideo, Error> {
        let video = self
            .http
            .get(format!("{}/{}", self.graph_url, video_id))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("fields", "id,title,status"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(video)
    }

    /// Comments on a video, oldest first. `since` is a unix timestamp and is
    /// inclusive on the Graph API side.
    pub async fn fetch_comments(&self, video_id: &str, since: Option<i64>) -> Result<Vec<GraphComment>, Error> {
        let since_str = since.map(|s| s.to_string());
        let mut query = vec![
            ("access_token", self.access_token.as_str()),
            ("fields", "id,from{id,name},message,created_time"),
            ("order", "chronological"),
            ("filter", "stream"),
            ("limit", "100"),
        ];
        if let Some(s) = since_str.as_deref() {
            query.push(("since", s));
        }

        let list: GraphList<GraphComment> = self
            .http
            .get(format!("{}/{}/comments", self.graph_url, video_id))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.data)
    }
}
