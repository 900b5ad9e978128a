use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use livecart_core::{Database, Error};
use livecart_core::hub::{self, AppState, BroadcastScope, Hub};
use livecart_core::lock::{InMemoryReservationLock, RedisReservationLock, ReservationLock, DEFAULT_LOCK_TTL};
use livecart_core::platforms::manager::{PlatformCredentials, PlatformManager};
use livecart_core::platforms::poller::PollConfig;
use livecart_core::repositories::{CommentRepository, PostgresCommentRepository};
use livecart_core::services::{CommentPipeline, HttpOrderService, OrderOrchestrator, PipelineConfig};
use livecart_core::tasks::lock_maintenance::spawn_lock_prune_task;

#[derive(Parser, Debug, Clone)]
#[command(name = "livecart")]
#[command(author, version, about = "livecart - live comment ingestion and auto-order hub")]
pub struct Args {
    /// Address the hub binds to.
    #[arg(long, env = "LIVECART_LISTEN_ADDR", default_value = "0.0.0.0:8002")]
    pub listen_addr: SocketAddr,

    /// Postgres connection URL for the comment store.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://livecart@localhost:5432/livecart")]
    pub database_url: String,

    /// Redis URL for the reservation lock. Without it locks are kept in
    /// process memory. Use a logical database the order service does not
    /// also check, e.g. redis://host/1.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Base URL of the order/catalog service.
    #[arg(long, env = "ORDER_SERVICE_URL", default_value = "http://localhost:8001")]
    pub order_service_url: String,

    #[arg(long, env = "YOUTUBE_API_KEY")]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "FACEBOOK_ACCESS_TOKEN")]
    pub facebook_access_token: Option<String>,

    /// Reservation window in seconds.
    #[arg(long, env = "LIVECART_LOCK_TTL_SECS", default_value_t = DEFAULT_LOCK_TTL.as_secs())]
    pub lock_ttl_secs: u64,

    /// "session" sends events only to connections subscribed to the
    /// session; "global" sends every event to every connection.
    #[arg(long, env = "LIVECART_BROADCAST_SCOPE", default_value = "session")]
    pub broadcast_scope: BroadcastScope,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            broadcast_scope: self.broadcast_scope,
            ..PipelineConfig::default()
        }
    }

    fn credentials(&self) -> PlatformCredentials {
        PlatformCredentials {
            youtube_api_key: self.youtube_api_key.clone(),
            facebook_access_token: self.facebook_access_token.clone(),
        }
    }
}

pub async fn run_server(args: Args) -> Result<(), Error> {
    if args.lock_ttl_secs == 0 {
        return Err(Error::Config("--lock-ttl-secs must be at least 1".into()));
    }
    let config = args.pipeline_config();

    // Storage is required at startup: refuse to serve without it.
    let db = Database::new(&args.database_url).await?;
    db.migrate().await?;
    let comments: Arc<dyn CommentRepository> = Arc::new(PostgresCommentRepository::new(db.pool().clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let lock: Arc<dyn ReservationLock> = match args.redis_url.as_deref() {
        Some(url) => Arc::new(RedisReservationLock::new(url, config.lock_op_timeout)?),
        None => {
            warn!("No REDIS_URL set; reservation locks are local to this process.");
            let memory = Arc::new(InMemoryReservationLock::new());
            spawn_lock_prune_task(memory.clone(), Duration::from_secs(60), shutdown_rx.clone());
            memory
        }
    };

    let orders = Arc::new(HttpOrderService::new(&args.order_service_url)?);
    let orchestrator = Arc::new(OrderOrchestrator::new(orders, lock, config.clone()));
    let hub = Arc::new(Hub::new(config.broadcast_scope));
    let pipeline = CommentPipeline::new(comments.clone(), orchestrator.clone(), hub.clone());
    let platforms = Arc::new(PlatformManager::new(
        Arc::new(pipeline.clone()),
        args.credentials(),
        PollConfig::default(),
    ));

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signaled.");
        let _ = shutdown_tx.send(true);
    });

    let state = AppState {
        hub,
        pipeline,
        comments,
        platforms: platforms.clone(),
    };
    let served = hub::serve(args.listen_addr, state, shutdown_rx).await;

    platforms.shutdown_all();
    let stats = orchestrator.stats();
    info!(?stats, "Order pipeline totals.");
    if let Err(e) = &served {
        error!("Hub server failed: {}", e);
    }
    served
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Ctrl-C handler error: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let args = Args::try_parse_from(["livecart"]).unwrap();
        assert_eq!(args.listen_addr.port(), 8002);
        assert_eq!(args.lock_ttl_secs, 900);
        assert_eq!(args.broadcast_scope, BroadcastScope::Session);
        assert_eq!(args.order_service_url, "http://localhost:8001");
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "livecart",
            "--listen-addr", "127.0.0.1:9000",
            "--redis-url", "redis://cache:6379/1",
            "--lock-ttl-secs", "60",
            "--broadcast-scope", "global",
        ])
        .unwrap();
        let config = args.pipeline_config();
        assert_eq!(config.lock_ttl, Duration::from_secs(60));
        assert_eq!(config.broadcast_scope, BroadcastScope::Global);
        assert_eq!(args.redis_url.as_deref(), Some("redis://cache:6379/1"));
    }

    #[test]
    fn bad_scope_is_rejected() {
        assert!(Args::try_parse_from(["livecart", "--broadcast-scope", "room"]).is_err());
    }
}
