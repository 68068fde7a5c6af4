use std::sync::Arc;

use crate::auth::AuthGate;
use crate::broadcaster::Broadcaster;
use crate::config::RuntimeConfig;
use crate::inference_engine::InferenceEngine;
use crate::media_fetcher::MediaFetcher;
use crate::queue::PriorityQueue;
use crate::store::Store;
use crate::vector_sink::VectorSink;

/// Owns every long-lived dependency handle and is passed down explicitly to
/// `JobService` and `Worker`. Nothing in this crate reaches for global or
/// module-level state; everything flows through a `Runtime`.
#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<RuntimeConfig>,
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn PriorityQueue>,
    pub media_fetcher: Arc<dyn MediaFetcher>,
    pub vector_sink: Arc<dyn VectorSink>,
    pub inference_engine: Arc<dyn InferenceEngine>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub auth_gate: Arc<dyn AuthGate>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("store", &"Store")
            .field("queue", &"PriorityQueue")
            .field("media_fetcher", &"MediaFetcher")
            .field("vector_sink", &"VectorSink")
            .field("inference_engine", &"InferenceEngine")
            .field("broadcaster", &"Broadcaster")
            .field("auth_gate", &"AuthGate")
            .finish()
    }
}
