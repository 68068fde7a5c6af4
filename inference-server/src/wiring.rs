use std::sync::Arc;

use anyhow::Context;
use inference_core::{
    HttpMediaFetcher, HttpVectorSink, JwtAuthGate, LocalInferenceEngine, PostgresPriorityQueue,
    PostgresStore, RedisBroadcaster, Runtime, RuntimeConfig,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::AppState;

/// Connects every external collaborator and assembles a `Runtime`. Shared
/// by the `api` and `worker` binaries so both processes see an identical
/// dependency graph built from the same config.
pub async fn build_runtime(config: RuntimeConfig) -> anyhow::Result<Runtime> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect(&config.db_url)
        .await
        .context("failed to connect to the job database")?;

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("failed to run pending migrations")?;
    info!("database migrations applied");

    let store = PostgresStore::new(pool.clone())
        .await
        .context("failed to initialize job store")?;
    let queue = PostgresPriorityQueue::new(pool);

    let media_fetcher = HttpMediaFetcher::new(config.media_store_url.clone());
    let vector_sink = HttpVectorSink::new(config.vector_store_url.clone());
    let inference_engine = LocalInferenceEngine::new();

    let broadcaster = RedisBroadcaster::connect(&config.redis_url())
        .await
        .context("failed to connect to the broadcast broker")?;

    let public_key_pem = match &config.public_key_path {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("failed to read public key at {path}"))?,
        ),
        None => None,
    };
    let auth_gate = JwtAuthGate::new(public_key_pem.as_deref(), config.auth_disabled)
        .context("failed to initialize auth gate")?;

    Ok(Runtime {
        config: Arc::new(config),
        store: Arc::new(store),
        queue: Arc::new(queue),
        media_fetcher: Arc::new(media_fetcher),
        vector_sink: Arc::new(vector_sink),
        inference_engine: Arc::new(inference_engine),
        broadcaster: Arc::new(broadcaster),
        auth_gate: Arc::new(auth_gate),
    })
}

pub fn app_state(runtime: Runtime) -> AppState {
    let job_service = Arc::new(inference_core::JobService::new(runtime.clone()));
    AppState { runtime, job_service }
}
