//! Job lifecycle engine: the durable priority queue, the worker execution
//! loop, and the trait contracts this crate consumes from external
//! collaborators (media store, vector store, inference backend, auth
//! issuer, pub/sub broker). Postgres- and Redis-backed implementations are
//! provided; the server crate wires them into a `Runtime` and drives the
//! HTTP surface and worker binaries on top.

pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod error;
pub mod inference_engine;
pub mod job_service;
pub mod media_fetcher;
pub mod queue;
pub mod runtime;
pub mod store;
pub mod vector_sink;
pub mod worker;

pub use auth::{AuthGate, Capability, Identity, JwtAuthGate};
pub use broadcaster::{Broadcaster, EventKind, RedisBroadcaster};
pub use config::RuntimeConfig;
pub use error::{CoreError, Result};
pub use inference_engine::{InferenceEngine, LocalInferenceEngine};
pub use job_service::JobService;
pub use media_fetcher::{FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use queue::{LeasedEntry, PostgresPriorityQueue, PriorityQueue};
pub use runtime::Runtime;
pub use store::{PostgresStore, Store};
pub use vector_sink::{HttpVectorSink, VectorPoint, VectorSink};
pub use worker::Worker;
