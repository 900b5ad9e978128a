// File: src/platforms/poller.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::{CommentSink, CommentSource};
use crate::Error;

/// Cadence for the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Used when the source gives no hint.
    pub default_interval: Duration,
    /// Floor applied to every interval, hinted or not.
    pub min_interval: Duration,
    /// After a failed fetch, the next one waits this many times the cadence.
    pub error_backoff_factor: u32,
    /// A fetch still pending after this long counts as failed.
    pub fetch_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(3),
            min_interval: Duration::from_secs(2),
            error_backoff_factor: 3,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    fn next_interval(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_interval).max(self.min_interval)
    }

    fn backoff(&self, cadence: Duration) -> Duration {
        cadence.max(self.min_interval) * self.error_backoff_factor.max(1)
    }
}

/// Why a polling loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerExit {
    /// No live chat / comment stream was found at start; polling never began.
    StreamNotFound,
    /// The owning session ended.
    Cancelled,
}

/// Runs one source until `shutdown` flips to `true` (or its sender drops).
///
/// Fetch failures and fetches that outlive `fetch_timeout` are logged and
/// retried after a backoff; the loop never ends on a failed fetch. A fetch
/// in flight when the session ends is dropped.
pub async fn run_poller(
    mut source: Box<dyn CommentSource>,
    live_session_id: String,
    content_id: String,
    sink: Arc<dyn CommentSink>,
    mut shutdown: watch::Receiver<bool>,
    config: PollConfig,
) -> PollerExit {
    let platform = source.platform();

    match source.locate_stream(&content_id).await {
        Ok(Some(stream_id)) => {
            info!(%platform, session_id = %live_session_id, %stream_id, "Comment stream located; polling.");
        }
        Ok(None) => {
            error!(%platform, session_id = %live_session_id, %content_id, "No active comment stream found.");
            return PollerExit::StreamNotFound;
        }
        Err(e) => {
            error!(%platform, session_id = %live_session_id, %content_id, "Failed to locate comment stream: {}", e);
            return PollerExit::StreamNotFound;
        }
    }

    let mut cadence = config.next_interval(None);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let fetched = tokio::select! {
            res = timeout(config.fetch_timeout, source.fetch_new()) => {
                res.map_err(Error::from).and_then(|page| page)
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(%platform, session_id = %live_session_id, "Session ended during fetch; abandoning it.");
                    break;
                }
                continue;
            }
        };

        let wait = match fetched {
            Ok(page) => {
                if *shutdown.borrow() {
                    debug!(%platform, session_id = %live_session_id,
                        "Session ended during fetch; discarding {} comments.", page.comments.len());
                    break;
                }
                for comment in page.comments {
                    sink.deliver(&live_session_id, comment);
                }
                cadence = config.next_interval(page.next_poll);
                cadence
            }
            Err(e) => {
                let backoff = config.backoff(cadence);
                warn!(%platform, session_id = %live_session_id,
                    "Comment fetch failed, retrying in {:?}: {}", backoff, e);
                backoff
            }
        };

        tokio::select! {
            _ = sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(%platform, session_id = %live_session_id, "Polling stopped.");
    PollerExit::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use livecart_common::models::{Platform, RawComment};
    use crate::platforms::{CommentPage, MockCommentSource};

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl CommentSink for RecordingSink {
        fn deliver(&self, live_session_id: &str, comment: RawComment) {
            self.seen
                .lock()
                .unwrap()
                .push((live_session_id.to_string(), comment.comment_text));
        }
    }

    fn raw(text: &str) -> RawComment {
        RawComment {
            platform: Platform::YouTube,
            username: "viewer".into(),
            user_id: "u1".into(),
            comment_text: text.into(),
            comment_id: None,
            timestamp: None,
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            default_interval: Duration::from_secs(3),
            min_interval: Duration::from_secs(2),
            error_backoff_factor: 3,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    /// A source whose fetches never complete, like a connection the
    /// platform accepted and then stopped answering.
    struct StalledSource {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CommentSource for StalledSource {
        fn platform(&self) -> Platform {
            Platform::YouTube
        }

        async fn locate_stream(&mut self, _content_id: &str) -> Result<Option<String>, Error> {
            Ok(Some("chat-1".into()))
        }

        async fn fetch_new(&mut self) -> Result<CommentPage, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[test]
    fn hint_is_floored_and_backoff_multiplies() {
        let cfg = fast_config();
        assert_eq!(cfg.next_interval(None), Duration::from_secs(3));
        assert_eq!(cfg.next_interval(Some(Duration::from_millis(500))), Duration::from_secs(2));
        assert_eq!(cfg.next_interval(Some(Duration::from_secs(8))), Duration::from_secs(8));
        assert_eq!(cfg.backoff(Duration::from_secs(3)), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn missing_stream_reports_once_and_never_polls() {
        let mut source = MockCommentSource::new();
        source.expect_platform().return_const(Platform::YouTube);
        source.expect_locate_stream().times(1).returning(|_| Ok(None));
        source.expect_fetch_new().never();

        let sink = Arc::new(RecordingSink::default());
        let (_tx, rx) = watch::channel(false);
        let exit = run_poller(Box::new(source), "s1".into(), "vid".into(), sink.clone(), rx, fast_config()).await;

        assert_eq!(exit, PollerExit::StreamNotFound);
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_source_order_and_survives_failures() {
        let mut source = MockCommentSource::new();
        source.expect_platform().return_const(Platform::YouTube);
        source.expect_locate_stream().returning(|_| Ok(Some("chat-1".into())));

        let mut call = 0;
        source.expect_fetch_new().returning(move || {
            call += 1;
            match call {
                1 => Ok(CommentPage { comments: vec![raw("a"), raw("b")], next_poll: None }),
                2 => Err(Error::Platform("rate limited".into())),
                3 => Ok(CommentPage { comments: vec![raw("c")], next_poll: None }),
                _ => Ok(CommentPage::default()),
            }
        });

        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_poller(
            Box::new(source), "s1".into(), "vid".into(), sink.clone(), rx, fast_config(),
        ));

        // 1st fetch at t=0, 2nd at t=3 fails, 3rd after 9s backoff at t=12.
        tokio::time::sleep(Duration::from_secs(13)).await;
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Cancelled);

        let seen: Vec<String> = sink.seen.lock().unwrap().iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(sink.seen.lock().unwrap().iter().all(|(s, _)| s == "s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_requests() {
        let mut source = MockCommentSource::new();
        source.expect_platform().return_const(Platform::Facebook);
        source.expect_locate_stream().returning(|_| Ok(Some("video".into())));
        // t=0 and t=3 only; cancelled at t=4.
        source.expect_fetch_new().times(2).returning(|| Ok(CommentPage::default()));

        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_poller(
            Box::new(source), "s1".into(), "vid".into(), sink, rx, fast_config(),
        ));

        tokio::time::sleep(Duration::from_secs(4)).await;
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out_and_backs_off() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = StalledSource { fetches: fetches.clone() };

        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_poller(
            Box::new(source), "s1".into(), "vid".into(), sink.clone(), rx, fast_config(),
        ));

        // 1st fetch at t=0 times out at t=5, 9s backoff, 2nd fetch at t=14.
        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), PollerExit::Cancelled);
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ending_the_session_abandons_a_stalled_fetch() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = StalledSource { fetches: fetches.clone() };
        let config = PollConfig { fetch_timeout: Duration::from_secs(3600), ..fast_config() };

        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_poller(
            Box::new(source), "s1".into(), "vid".into(), sink, rx, config,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert_eq!(exit.unwrap().unwrap(), PollerExit::Cancelled);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
