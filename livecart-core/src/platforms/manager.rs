// File: src/platforms/manager.rs

use std::collections::HashMap;
use std::sync::Arc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use livecart_common::models::Platform;
use crate::platforms::facebook::{FacebookClient, FacebookLiveComments};
use crate::platforms::poller::{run_poller, PollConfig};
use crate::platforms::youtube::{YouTubeClient, YouTubeLiveChat};
use crate::platforms::{CommentSink, CommentSource};

/// Which platform streams to attach to a live session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub youtube_video_id: Option<String>,
    #[serde(default)]
    pub facebook_video_id: Option<String>,
    /// Resolve the page's current live video instead of naming one.
    #[serde(default)]
    pub facebook_page_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StartSessionResponse {
    pub started: Vec<Platform>,
    pub already_running: Vec<Platform>,
    pub unavailable: Vec<Platform>,
}

/// API credentials for the platforms this process can poll.
#[derive(Debug, Clone, Default)]
pub struct PlatformCredentials {
    pub youtube_api_key: Option<String>,
    pub facebook_access_token: Option<String>,
}

struct SessionPollers {
    shutdown_tx: watch::Sender<bool>,
    tasks: HashMap<Platform, JoinHandle<()>>,
}

/// Owns one polling task per (session, platform) pair and funnels every
/// polled comment into the shared sink.
pub struct PlatformManager {
    sink: Arc<dyn CommentSink>,
    credentials: PlatformCredentials,
    poll_config: PollConfig,
    sessions: DashMap<String, SessionPollers>,
}

impl PlatformManager {
    pub fn new(
        sink: Arc<dyn CommentSink>,
        credentials: PlatformCredentials,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            sink,
            credentials,
            poll_config,
            sessions: DashMap::new(),
        }
    }

    /// Starts a poller for every platform named in `request` that this
    /// process has credentials for.
    pub fn start_session(&self, live_session_id: &str, request: &StartSessionRequest) -> StartSessionResponse {
        let mut response = StartSessionResponse::default();

        let youtube_target = request.youtube_video_id.clone();
        let facebook_target = request
            .facebook_video_id
            .clone()
            .or_else(|| request.facebook_page_id.as_ref().map(|p| format!("page:{}", p)));

        if let Some(video_id) = youtube_target {
            match self.credentials.youtube_api_key.as_deref() {
                Some(key) => match YouTubeClient::new(key) {
                    Ok(client) => {
                        let source = YouTubeLiveChat::new(client);
                        self.record(&mut response, Platform::YouTube,
                            self.start_source(live_session_id, Box::new(source), &video_id));
                    }
                    Err(e) => {
                        error!(session_id = %live_session_id, "Failed to build YouTube client: {:?}", e);
                        response.unavailable.push(Platform::YouTube);
                    }
                },
                None => {
                    warn!(session_id = %live_session_id, "No YouTube API key configured; skipping.");
                    response.unavailable.push(Platform::YouTube);
                }
            }
        }

        if let Some(target) = facebook_target {
            match self.credentials.facebook_access_token.as_deref() {
                Some(token) => match FacebookClient::new(token) {
                    Ok(client) => {
                        let source = FacebookLiveComments::new(client);
                        self.record(&mut response, Platform::Facebook,
                            self.start_source(live_session_id, Box::new(source), &target));
                    }
                    Err(e) => {
                        error!(session_id = %live_session_id, "Failed to build Facebook client: {:?}", e);
                        response.unavailable.push(Platform::Facebook);
                    }
                },
                None => {
                    warn!(session_id = %live_session_id, "No Facebook access token configured; skipping.");
                    response.unavailable.push(Platform::Facebook);
                }
            }
        }

        response
    }

    fn record(&self, response: &mut StartSessionResponse, platform: Platform, started: bool) {
        if started {
            response.started.push(platform);
        } else {
            response.already_running.push(platform);
        }
    }

    /// Spawns a poller for `source` under `live_session_id`. Returns
    /// `false` without spawning if that session already has a live poller
    /// for the same platform.
    pub fn start_source(
        &self,
        live_session_id: &str,
        source: Box<dyn CommentSource>,
        content_id: &str,
    ) -> bool {
        let platform = source.platform();
        let mut entry = self
            .sessions
            .entry(live_session_id.to_string())
            .or_insert_with(|| SessionPollers {
                shutdown_tx: watch::channel(false).0,
                tasks: HashMap::new(),
            });

        if let Some(existing) = entry.tasks.get(&platform) {
            if !existing.is_finished() {
                return false;
            }
        }

        let shutdown_rx = entry.shutdown_tx.subscribe();
        let sink = self.sink.clone();
        let config = self.poll_config.clone();
        let session = live_session_id.to_string();
        let content = content_id.to_string();
        let handle = tokio::spawn(async move {
            let exit = run_poller(source, session, content, sink, shutdown_rx, config).await;
            info!(%platform, "Poller exited: {:?}", exit);
        });
        entry.tasks.insert(platform, handle);
        info!(%platform, session_id = %live_session_id, %content_id, "Started comment poller.");
        true
    }

    /// Signals every poller of the session to stop. In-flight fetches may
    /// finish, but their results are dropped by the poller.
    pub fn end_session(&self, live_session_id: &str) -> bool {
        match self.sessions.remove(live_session_id) {
            Some((_, pollers)) => {
                let _ = pollers.shutdown_tx.send(true);
                info!(session_id = %live_session_id,
                    "Ended session; stopping {} poller(s).", pollers.tasks.len());
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, live_session_id: &str) -> bool {
        self.sessions.contains_key(live_session_id)
    }

    /// Platforms with a poller still running for the session.
    pub fn active_platforms(&self, live_session_id: &str) -> Vec<Platform> {
        self.sessions
            .get(live_session_id)
            .map(|s| {
                s.tasks
                    .iter()
                    .filter(|(_, h)| !h.is_finished())
                    .map(|(p, _)| *p)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn shutdown_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.end_session(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use livecart_common::models::RawComment;
    use crate::platforms::{CommentPage, MockCommentSource};

    #[derive(Default)]
    struct CountingSink {
        count: Mutex<usize>,
    }

    impl CommentSink for CountingSink {
        fn deliver(&self, _live_session_id: &str, _comment: RawComment) {
            *self.count.lock().unwrap() += 1;
        }
    }

    fn idle_source(platform: Platform) -> MockCommentSource {
        let mut source = MockCommentSource::new();
        source.expect_platform().return_const(platform);
        source.expect_locate_stream().returning(|_| Ok(Some("stream".into())));
        source.expect_fetch_new().returning(|| Ok(CommentPage::default()));
        source
    }

    fn manager() -> PlatformManager {
        PlatformManager::new(
            Arc::new(CountingSink::default()),
            PlatformCredentials::default(),
            PollConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn one_poller_per_session_and_platform() {
        let mgr = manager();
        assert!(mgr.start_source("s1", Box::new(idle_source(Platform::YouTube)), "v1"));
        assert!(!mgr.start_source("s1", Box::new(idle_source(Platform::YouTube)), "v1"));
        assert!(mgr.start_source("s1", Box::new(idle_source(Platform::Facebook)), "f1"));
        assert!(mgr.start_source("s2", Box::new(idle_source(Platform::YouTube)), "v2"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut platforms = mgr.active_platforms("s1");
        platforms.sort_by_key(|p| p.as_str());
        assert_eq!(platforms, vec![Platform::Facebook, Platform::YouTube]);
        mgr.shutdown_all();
    }

    #[tokio::test(start_paused = true)]
    async fn ending_a_session_stops_only_its_pollers() {
        let mgr = manager();
        mgr.start_source("s1", Box::new(idle_source(Platform::YouTube)), "v1");
        mgr.start_source("s2", Box::new(idle_source(Platform::YouTube)), "v2");

        assert!(mgr.end_session("s1"));
        assert!(!mgr.end_session("s1"));
        assert!(!mgr.is_active("s1"));
        assert!(mgr.is_active("s2"));
        mgr.shutdown_all();
        assert!(!mgr.is_active("s2"));
    }

    #[tokio::test]
    async fn start_session_without_credentials_reports_unavailable() {
        let mgr = manager();
        let resp = mgr.start_session("s1", &StartSessionRequest {
            youtube_video_id: Some("abc".into()),
            facebook_video_id: None,
            facebook_page_id: Some("page".into()),
        });
        assert!(resp.started.is_empty());
        assert_eq!(resp.unavailable, vec![Platform::YouTube, Platform::Facebook]);
        assert!(!mgr.is_active("s1"));
    }
}
