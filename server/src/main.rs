use anyhow::Result;
use clap::Parser;
use resumatch_core::SearchOptions;
use resumatch_server::{build_router, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Resume store: a .json/.jsonl file or a directory of them
    #[arg(long, default_value = "./data")]
    data: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Match threshold (0.0 exact .. 1.0 anything)
    #[arg(long)]
    threshold: Option<f64>,
    /// Results returned when a search omits `k`
    #[arg(long)]
    default_limit: Option<usize>,
    /// Build a session for every owner in the store at startup
    #[arg(long, default_value_t = false)]
    preload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut options = SearchOptions::default();
    if let Some(threshold) = args.threshold {
        options.threshold = threshold;
    }
    if let Some(limit) = args.default_limit {
        options.default_limit = limit;
    }

    let state = AppState::new(&args.data, options)?;
    if args.preload {
        state.preload()?;
    }
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, data = %args.data, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
