use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod server;

use server::{run_server, Args};

fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {}", e);
    }
    let filter = EnvFilter::from_default_env()
        .add_directive("livecart=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("livecart starting. listen_addr={}, broadcast_scope={:?}, lock={}",
          args.listen_addr, args.broadcast_scope,
          if args.redis_url.is_some() { "redis" } else { "memory" });

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }
    info!("livecart stopped.");
    Ok(())
}
