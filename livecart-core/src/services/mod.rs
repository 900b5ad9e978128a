// File: src/services/mod.rs

pub mod keyword_detector;
pub mod order_service;
pub mod order_orchestrator;
pub mod comment_pipeline;

pub use keyword_detector::{detect_keywords, KeywordMatch};
pub use order_service::{HttpOrderService, OrderService};
pub use order_orchestrator::{OrchestratorStats, OrderOrchestrator, OrderOutcome, PipelineConfig};
pub use comment_pipeline::{CommentPipeline, ProcessedComment};
