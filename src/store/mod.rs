pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    CounterDelta, Credential, CredentialMetrics, HttpMethod, LogEntry, MetricsSnapshot, Route,
    Service, ServiceHealthEntry, ServiceStatus,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// Persistent metadata lives behind this trait so the gateway core never
// assumes a particular storage engine.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_credential(&self, token: &str) -> StoreResult<Option<Credential>>;
    async fn find_route(
        &self,
        credential: &str,
        path: &str,
        method: HttpMethod,
    ) -> StoreResult<Option<Route>>;
    async fn find_service(&self, id: Uuid) -> StoreResult<Option<Service>>;
    async fn increment_credential_counters(
        &self,
        token: &str,
        delta: CounterDelta,
    ) -> StoreResult<()>;

    async fn list_services(&self) -> StoreResult<Vec<Service>>;
    async fn update_service_health(
        &self,
        id: Uuid,
        status: ServiceStatus,
        latency_ms: u64,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn record_service_health(
        &self,
        credential: &str,
        entry: ServiceHealthEntry,
    ) -> StoreResult<()>;

    async fn upsert_metric_snapshot(&self, snapshot: &MetricsSnapshot) -> StoreResult<()>;
    async fn append_log(&self, entry: LogEntry) -> StoreResult<()>;

    async fn create_credential(&self, credential: Credential) -> StoreResult<Credential>;
    async fn list_credentials(&self) -> StoreResult<Vec<Credential>>;
    async fn deactivate_credential(&self, token: &str) -> StoreResult<Credential>;

    async fn create_service(&self, service: Service) -> StoreResult<Service>;
    async fn update_service(&self, service: Service) -> StoreResult<Service>;
    async fn delete_service(&self, id: Uuid) -> StoreResult<()>;

    async fn create_route(&self, route: Route) -> StoreResult<Route>;
    async fn update_route(&self, route: Route) -> StoreResult<Route>;
    async fn delete_route(&self, id: Uuid) -> StoreResult<()>;
    async fn list_routes(&self, credential: Option<&str>) -> StoreResult<Vec<Route>>;

    async fn fetch_metrics(&self, token: &str) -> StoreResult<Option<CredentialMetrics>>;
    async fn recent_logs(&self, credential: &str, limit: usize) -> StoreResult<Vec<LogEntry>>;
}
