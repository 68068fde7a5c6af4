use std::net::SocketAddr;

use clap::Parser;
use inference_core::RuntimeConfig;
use inference_server::{init_tracing, wiring};
use tracing::info;

/// Command line arguments for the inference job API server.
#[derive(Parser, Debug)]
#[command(name = "inference-server")]
#[command(about = "HTTP API for the asynchronous inference job engine")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RuntimeConfig::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }

    init_tracing("inference_server=info,inference_core=info,tower_http=info");
    info!("server configuration loaded");

    config.ensure_directories()?;

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    let runtime = wiring::build_runtime(config).await?;
    let state = wiring::app_state(runtime);
    let router = inference_server::routes::build_router(state);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
