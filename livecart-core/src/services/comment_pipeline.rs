// File: src/services/comment_pipeline.rs

use std::sync::Arc;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use livecart_common::models::{Comment, RawComment};
use livecart_common::traits::repository_traits::CommentRepository;
use crate::hub::{Hub, ServerMessage};
use crate::platforms::CommentSink;
use crate::services::keyword_detector::{detect_keywords, BUY_KEYWORD};
use crate::services::order_orchestrator::{OrderOrchestrator, OrderOutcome};

/// Result of running one comment through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedComment {
    pub comment: Comment,
    pub persisted: bool,
    /// One outcome per keyword match, in match order.
    pub outcomes: Vec<OrderOutcome>,
}

impl ProcessedComment {
    pub fn orders_created(&self) -> usize {
        self.outcomes.iter().filter(|o| o.order().is_some()).count()
    }
}

/// Detect, order, persist and broadcast for each incoming comment.
///
/// `new_comment` is broadcast before any order work starts, so a
/// comment's `order_created` events always follow it. Persistence runs
/// alongside order handling and a failed write never holds back either.
#[derive(Clone)]
pub struct CommentPipeline {
    repo: Arc<dyn CommentRepository>,
    orchestrator: Arc<OrderOrchestrator>,
    hub: Arc<Hub>,
}

impl CommentPipeline {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        orchestrator: Arc<OrderOrchestrator>,
        hub: Arc<Hub>,
    ) -> Self {
        Self { repo, orchestrator, hub }
    }

    pub fn orchestrator(&self) -> &Arc<OrderOrchestrator> {
        &self.orchestrator
    }

    pub async fn process_comment(&self, live_session_id: &str, raw: RawComment) -> ProcessedComment {
        let matches = detect_keywords(&raw.comment_text);
        let product_code = matches.first().map(|m| m.product_code.clone());
        let comment = Comment::from_raw(
            live_session_id,
            &raw,
            product_code.as_ref().map(|_| BUY_KEYWORD.to_string()),
            product_code,
        );
        debug!(session_id = %live_session_id, platform = %comment.platform,
            matches = matches.len(), "Processing comment from {}", comment.username);

        self.hub.broadcast(live_session_id, ServerMessage::NewComment(comment.clone()));

        let persist = async {
            match self.repo.insert_comment(&comment).await {
                Ok(()) => true,
                Err(e) => {
                    error!(session_id = %live_session_id, comment_id = %comment.id,
                        "Failed to persist comment: {}", e);
                    false
                }
            }
        };

        let customer = comment.username.as_str();
        let orders = join_all(matches.iter().map(|m| async move {
            let outcome = self
                .orchestrator
                .handle_match(live_session_id, customer, m)
                .await;
            if let Some(order) = outcome.order() {
                self.hub.broadcast(live_session_id, ServerMessage::OrderCreated(order.clone()));
            }
            outcome
        }));

        let (persisted, outcomes) = tokio::join!(persist, orders);

        ProcessedComment {
            comment,
            persisted,
            outcomes,
        }
    }

    /// Runs `process_comment` on its own task so a slow lookup or order
    /// call never holds up the next comment.
    pub fn submit(&self, live_session_id: &str, raw: RawComment) -> JoinHandle<ProcessedComment> {
        let pipeline = self.clone();
        let session = live_session_id.to_string();
        tokio::spawn(async move { pipeline.process_comment(&session, raw).await })
    }
}

impl CommentSink for CommentPipeline {
    fn deliver(&self, live_session_id: &str, comment: RawComment) {
        let _ = self.submit(live_session_id, comment);
    }
}
