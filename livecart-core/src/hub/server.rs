// File: src/hub/server.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_server::Handle;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use livecart_common::models::Comment;
use livecart_common::traits::repository_traits::CommentRepository;
use crate::Error;
use crate::hub::Hub;
use crate::hub::protocol::{ClientMessage, ServerMessage};
use crate::platforms::manager::{PlatformManager, StartSessionRequest, StartSessionResponse};
use crate::services::comment_pipeline::CommentPipeline;

/// Most comments returned by the session history endpoint.
pub const COMMENT_HISTORY_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub pipeline: CommentPipeline,
    pub comments: Arc<dyn CommentRepository>,
    pub platforms: Arc<PlatformManager>,
}

/// Maps core errors onto HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connections: usize,
}

#[derive(Serialize)]
struct EndSessionResponse {
    ended: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/sessions/{session_id}/comments", get(session_comments))
        .route("/sessions/{session_id}/start", post(start_session))
        .route("/sessions/{session_id}/end", post(end_session))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serves the hub until `shutdown` flips. Open sockets get a short grace
/// period before they are cut.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    let app = router(state);
    let handle = Handle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        info!("Realtime hub shutting down.");
        handle_clone.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    info!("Realtime hub listening on http://{}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    info!("Realtime hub stopped.");
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.hub.connection_count(),
    })
}

async fn session_comments(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let rows = state
        .comments
        .list_session_comments(&session_id, COMMENT_HISTORY_LIMIT)
        .await?;
    Ok(Json(rows))
}

async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<StartSessionRequest>,
) -> Json<StartSessionResponse> {
    Json(state.platforms.start_session(&session_id, &request))
}

async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<EndSessionResponse> {
    Json(EndSessionResponse {
        ended: state.platforms.end_session(&session_id),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, mut outbound) = state.hub.connect();
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(t) => t,
                Err(e) => {
                    error!(%connection_id, "Failed to encode {} message: {}", message.kind(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_client_text(&state, connection_id, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%connection_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    state.hub.disconnect(connection_id);
    writer.abort();
}

fn handle_client_text(state: &AppState, connection_id: Uuid, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SubscribeSession { session_id }) => {
            state.hub.subscribe(connection_id, &session_id);
        }
        Ok(ClientMessage::NewComment { session_id, comment }) => {
            debug!(%connection_id, %session_id, "Relayed comment received.");
            let _ = state.pipeline.submit(&session_id, comment);
        }
        Err(e) => {
            warn!(%connection_id, "Invalid client message: {}", e);
            state.hub.send_to(connection_id, ServerMessage::error(format!("Invalid message: {}", e)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use livecart_common::models::Platform;
    use crate::hub::BroadcastScope;
    use crate::lock::InMemoryReservationLock;
    use crate::platforms::poller::PollConfig;
    use crate::platforms::manager::PlatformCredentials;
    use crate::services::order_orchestrator::{OrderOrchestrator, PipelineConfig};
    use crate::test_utils::fakes::{MemoryCommentRepository, RecordingOrderService};
    use crate::test_utils::helpers::raw_comment;

    fn state() -> (AppState, Arc<MemoryCommentRepository>) {
        let hub = Arc::new(Hub::new(BroadcastScope::Session));
        let repo = Arc::new(MemoryCommentRepository::new());
        let orch = OrderOrchestrator::new(
            Arc::new(RecordingOrderService::new()),
            Arc::new(InMemoryReservationLock::new()),
            PipelineConfig::default(),
        );
        let pipeline = CommentPipeline::new(repo.clone(), Arc::new(orch), hub.clone());
        let platforms = Arc::new(PlatformManager::new(
            Arc::new(pipeline.clone()),
            PlatformCredentials::default(),
            PollConfig::default(),
        ));
        let state = AppState { hub, pipeline, comments: repo.clone(), platforms };
        (state, repo)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_connection_count() {
        let (state, _) = state();
        let _conn = state.hub.connect();
        let resp = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"status": "ok", "connections": 1}));
    }

    #[tokio::test]
    async fn comment_history_is_newest_first_and_session_scoped() {
        let (state, _) = state();
        let pipeline = state.pipeline.clone();
        pipeline.process_comment("s1", raw_comment(Platform::YouTube, "a", "first")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        pipeline.process_comment("s1", raw_comment(Platform::YouTube, "b", "second")).await;
        pipeline.process_comment("s2", raw_comment(Platform::Facebook, "c", "elsewhere")).await;

        let resp = router(state)
            .oneshot(Request::get("/sessions/s1/comments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        let texts: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["comment_text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn start_without_credentials_and_end_unknown_session() {
        let (state, _) = state();
        let app = router(state);

        let resp = app
            .clone()
            .oneshot(
                Request::post("/sessions/s1/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"youtube_video_id":"abc"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["unavailable"], json!(["youtube"]));

        let resp = app
            .oneshot(Request::post("/sessions/s1/end").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, json!({"ended": false}));
    }

    #[tokio::test]
    async fn malformed_client_message_gets_error_reply() {
        let (state, _) = state();
        let (id, mut rx) = state.hub.connect();
        let _greeting = rx.recv().await;

        handle_client_text(&state, id, "{not json");
        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));

        handle_client_text(&state, id, r#"{"type":"subscribe_session","session_id":"s9"}"#);
        assert_eq!(state.hub.subscription(id).as_deref(), Some("s9"));
    }

    #[tokio::test]
    async fn relayed_comment_runs_through_pipeline() {
        let (state, repo) = state();
        let (id, mut rx) = state.hub.connect();
        state.hub.subscribe(id, "s1");
        let _greeting = rx.recv().await;

        let msg = json!({
            "type": "new_comment",
            "session_id": "s1",
            "comment": {"platform": "youtube", "username": "z", "user_id": "1", "comment_text": "hello"}
        });
        handle_client_text(&state, id, &msg.to_string());

        assert!(matches!(rx.recv().await, Some(ServerMessage::NewComment(_))));
        // Persistence runs on the spawned task; give it a turn.
        for _ in 0..10 {
            if !repo.all().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(repo.all().len(), 1);
    }
}
