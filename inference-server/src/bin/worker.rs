use clap::Parser;
use inference_core::{RuntimeConfig, Worker};
use inference_server::{init_tracing, wiring};
use tracing::info;

/// Command line arguments for a single inference worker instance. Run
/// several of these, against the same database, for horizontal scale.
#[derive(Parser, Debug)]
#[command(name = "inference-worker")]
#[command(about = "Runs the inference job execution loop")]
struct Args {
    /// Identifier recorded as the queue lease holder. Defaults to a
    /// generated id so multiple workers never collide.
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = RuntimeConfig::from_env()?;

    init_tracing("inference_server=info,inference_core=info");
    config.ensure_directories()?;

    let worker_id = args
        .worker_id
        .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::now_v7()));

    let runtime = wiring::build_runtime(config).await?;
    let worker = Worker::new(runtime, worker_id.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    info!(worker_id = %worker_id, "worker starting");
    worker.run(shutdown_rx).await;
    info!(worker_id = %worker_id, "worker stopped");

    Ok(())
}
