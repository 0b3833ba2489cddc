//! Load-generating consumer for a balanced service.
//!
//! Runs `--workers` tasks, each sending `--requests` sequential GETs through
//! the pool, then prints every response body.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::Request;
use clap::Parser;

use kube_balance::config::loader::load_config;
use kube_balance::config::BalancerConfig;
use kube_balance::discovery::EndpointRefresher;
use kube_balance::http::HyperTransport;
use kube_balance::lifecycle::{signals, Shutdown};
use kube_balance::observability::{logging, metrics};
use kube_balance::Pool;

#[derive(Parser)]
#[command(name = "kube-balance")]
#[command(about = "Send load through a client-side balanced pool", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Namespace of the service (overrides the config file).
    #[arg(short, long)]
    namespace: Option<String>,

    /// Service name (overrides the config file).
    #[arg(short, long)]
    service: Option<String>,

    /// Concurrent workers.
    #[arg(short, long, default_value_t = 10)]
    workers: usize,

    /// Requests per worker.
    #[arg(short, long, default_value_t = 100)]
    requests: usize,

    /// Request path.
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Print the pool state as JSON when done.
    #[arg(long)]
    stat: bool,
}

type WorkerError = Box<dyn std::error::Error + Send + Sync>;

/// Send `requests` sequential GETs and collect the response bodies.
async fn run_worker(
    pool: Pool,
    worker: usize,
    path: String,
    requests: usize,
) -> Result<Vec<String>, WorkerError> {
    let mut responses = Vec::with_capacity(requests);
    for _ in 0..requests {
        let request = Request::get(path.as_str()).body(Bytes::new())?;
        let response = pool.dispatch(&request).await.inspect_err(|e| {
            tracing::error!(worker, error = %e, "Request failed");
        })?;
        let body = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX).await?;
        responses.push(String::from_utf8_lossy(&body).into_owned());
    }
    Ok(responses)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    if let Some(namespace) = cli.namespace {
        config.pool.selector.namespace = namespace;
    }
    if let Some(service) = cli.service {
        config.pool.selector.service = service;
    }
    if let Err(errors) = kube_balance::config::validation::validate_config(&config) {
        for e in &errors {
            eprintln!("invalid configuration: {}", e);
        }
        return Err("invalid configuration".into());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        namespace = %config.pool.selector.namespace,
        service = %config.pool.selector.service,
        interval = ?config.pool.interval(),
        max_waiting = config.pool.effective_max_waiting(),
        "kube-balance v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_ctrl_c(shutdown.clone()));

    let refresher = Arc::new(EndpointRefresher::new(&config.discovery)?);
    let transport = Arc::new(HyperTransport::new(&config.transport));
    let pool = Pool::spawn(&config.pool, transport, refresher, shutdown.subscribe());

    let deadline = shutdown.clone();
    let timeout = Duration::from_secs(cli.timeout_secs);
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        tracing::warn!(?timeout, "Deadline reached, shutting down");
        deadline.trigger();
    });

    let start = Instant::now();
    let mut workers = Vec::with_capacity(cli.workers);
    for worker in 0..cli.workers {
        let pool = pool.clone();
        let path = cli.path.clone();
        let requests = cli.requests;
        workers.push(tokio::spawn(run_worker(pool, worker, path, requests)));
    }

    let mut failed = 0;
    for worker in workers {
        match worker.await? {
            Ok(responses) => {
                for response in responses {
                    println!("{}", response);
                }
            }
            Err(_) => failed += 1,
        }
    }

    tracing::info!(
        elapsed = ?start.elapsed(),
        workers = cli.workers,
        failed_workers = failed,
        "Load run finished"
    );

    if cli.stat {
        println!("{}", serde_json::to_string_pretty(&pool.snapshot())?);
    }

    shutdown.trigger();
    Ok(())
}
