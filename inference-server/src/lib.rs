//! HTTP surface and process wiring for the job engine. The `api` binary
//! serves the routes in this crate; the `worker` binary drives
//! `inference_core::Worker` in a loop. Both share `build_runtime` so the two
//! processes construct identical dependency graphs from the same config.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod wiring;

use std::sync::Arc;

use inference_core::{JobService, Runtime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Axum application state. Cloned per request; everything inside is an
/// `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Runtime,
    pub job_service: Arc<JobService>,
}

/// Installs the process-wide subscriber. `default_filter` is used unless
/// `RUST_LOG` is set.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
