pub mod admin;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod forwarder;
pub mod gateway;
pub mod health;
pub mod logsink;
pub mod metrics;
pub mod model;
pub mod ratelimit;
pub mod store;

pub use cache::ResolutionCache;
pub use config::GatewayConfig;
pub use context::ProxyContext;
pub use error::{GatewayError, GatewayResult};
pub use forwarder::Forwarder;
pub use gateway::{AppState, Gateway, router};
pub use health::HealthTracker;
pub use logsink::LogSink;
pub use metrics::MetricsAggregator;
pub use ratelimit::SlidingWindowLimiter;
pub use store::{MetadataStore, in_memory::InMemoryStore};
