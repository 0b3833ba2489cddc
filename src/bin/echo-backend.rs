//! Test backend for load runs.
//!
//! Answers every request with `"<HOSTNAME> request: <n>"`. About one request
//! in fifty stalls for ten seconds, the rest take five milliseconds, so a
//! balancer that shares busy backends shows up as tail latency.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::any;
use axum::Router;
use clap::Parser;
use rand::Rng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use kube_balance::observability::logging;

#[derive(Parser)]
#[command(name = "echo-backend")]
#[command(about = "Numbered-response backend with occasional stalls", long_about = None)]
struct Cli {
    /// Listen address.
    #[arg(short, long, default_value = "0.0.0.0:3007")]
    listen: SocketAddr,

    /// One request in this many stalls.
    #[arg(long, default_value_t = 50)]
    stall_one_in: u32,

    /// Stall duration in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    stall_ms: u64,

    /// Normal handling time in milliseconds.
    #[arg(long, default_value_t = 5)]
    delay_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Echo {
    hostname: String,
    served: AtomicU64,
    stall_one_in: u32,
    stall: Duration,
    delay: Duration,
}

async fn handle(State(echo): State<Arc<Echo>>) -> String {
    let n = echo.served.fetch_add(1, Ordering::Relaxed);

    let stall = echo.stall_one_in > 0 && rand::thread_rng().gen_range(0..echo.stall_one_in) == 0;
    if stall {
        tracing::debug!(request = n, "Stalling");
        tokio::time::sleep(echo.stall).await;
    } else {
        tokio::time::sleep(echo.delay).await;
    }

    format!("{} request: {}", echo.hostname, n)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let echo = Arc::new(Echo {
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        served: AtomicU64::new(0),
        stall_one_in: cli.stall_one_in,
        stall: Duration::from_millis(cli.stall_ms),
        delay: Duration::from_millis(cli.delay_ms),
    });

    let app = Router::new()
        .route("/", any(handle))
        .route("/{*path}", any(handle))
        .with_state(Arc::clone(&echo))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(cli.listen).await?;
    tracing::info!(address = %listener.local_addr()?, hostname = %echo.hostname, "Echo backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;

    tracing::info!(served = echo.served.load(Ordering::Relaxed), "Echo backend stopped");
    Ok(())
}
