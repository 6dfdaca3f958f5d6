use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    model::{
        CounterDelta, Credential, CredentialMetrics, HttpMethod, LogEntry, MetricsSnapshot, Route,
        Service, ServiceHealthEntry, ServiceStatus,
    },
    store::{MetadataStore, StoreError, StoreResult},
};

#[derive(Default)]
pub struct InMemoryStore {
    credentials: DashMap<String, Credential>,
    routes: DashMap<Uuid, Route>,
    services: DashMap<Uuid, Service>,
    metrics: DashMap<String, CredentialMetrics>,
    logs: Mutex<Vec<LogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_conflicts(&self, candidate: &Route) -> bool {
        candidate.active
            && self.routes.iter().any(|existing| {
                existing.id != candidate.id
                    && existing.active
                    && existing.credential == candidate.credential
                    && existing.path == candidate.path
                    && existing.method == candidate.method
            })
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn find_credential(&self, token: &str) -> StoreResult<Option<Credential>> {
        Ok(self
            .credentials
            .get(token)
            .filter(|credential| credential.active)
            .map(|credential| credential.clone()))
    }

    async fn find_route(
        &self,
        credential: &str,
        path: &str,
        method: HttpMethod,
    ) -> StoreResult<Option<Route>> {
        Ok(self
            .routes
            .iter()
            .find(|route| {
                route.active
                    && route.credential == credential
                    && route.path == path
                    && route.method == method
            })
            .map(|route| route.clone()))
    }

    async fn find_service(&self, id: Uuid) -> StoreResult<Option<Service>> {
        Ok(self.services.get(&id).map(|service| service.clone()))
    }

    async fn increment_credential_counters(
        &self,
        token: &str,
        delta: CounterDelta,
    ) -> StoreResult<()> {
        let mut credential = self
            .credentials
            .get_mut(token)
            .ok_or(StoreError::NotFound("credential"))?;
        credential.apply_delta(&delta);
        Ok(())
    }

    async fn list_services(&self) -> StoreResult<Vec<Service>> {
        Ok(self
            .services
            .iter()
            .map(|service| service.clone())
            .collect())
    }

    async fn update_service_health(
        &self,
        id: Uuid,
        status: ServiceStatus,
        latency_ms: u64,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut service = self
            .services
            .get_mut(&id)
            .ok_or(StoreError::NotFound("service"))?;
        service.status = status;
        service.latency_ms = latency_ms;
        service.last_checked = Some(checked_at);
        Ok(())
    }

    async fn record_service_health(
        &self,
        credential: &str,
        entry: ServiceHealthEntry,
    ) -> StoreResult<()> {
        self.metrics
            .entry(credential.to_string())
            .or_insert_with(|| CredentialMetrics::empty(credential))
            .set_service_health(entry);
        Ok(())
    }

    async fn upsert_metric_snapshot(&self, snapshot: &MetricsSnapshot) -> StoreResult<()> {
        self.metrics
            .entry(snapshot.credential.clone())
            .or_insert_with(|| CredentialMetrics::empty(&snapshot.credential))
            .apply_snapshot(snapshot);
        Ok(())
    }

    async fn append_log(&self, entry: LogEntry) -> StoreResult<()> {
        self.logs.lock().await.push(entry);
        Ok(())
    }

    async fn create_credential(&self, credential: Credential) -> StoreResult<Credential> {
        if self.credentials.contains_key(&credential.token) {
            return Err(StoreError::Conflict(format!(
                "credential {} already exists",
                credential.token
            )));
        }
        // Metric records are provisioned eagerly so flushes and health
        // summaries always have a row to land in.
        self.metrics.insert(
            credential.token.clone(),
            CredentialMetrics::empty(&credential.token),
        );
        self.credentials
            .insert(credential.token.clone(), credential.clone());
        Ok(credential)
    }

    async fn list_credentials(&self) -> StoreResult<Vec<Credential>> {
        Ok(self
            .credentials
            .iter()
            .map(|credential| credential.clone())
            .collect())
    }

    async fn deactivate_credential(&self, token: &str) -> StoreResult<Credential> {
        let mut credential = self
            .credentials
            .get_mut(token)
            .ok_or(StoreError::NotFound("credential"))?;
        credential.active = false;
        Ok(credential.clone())
    }

    async fn create_service(&self, service: Service) -> StoreResult<Service> {
        self.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn update_service(&self, service: Service) -> StoreResult<Service> {
        if !self.services.contains_key(&service.id) {
            return Err(StoreError::NotFound("service"));
        }
        self.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn delete_service(&self, id: Uuid) -> StoreResult<()> {
        self.services
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("service"))
    }

    async fn create_route(&self, route: Route) -> StoreResult<Route> {
        if self.route_conflicts(&route) {
            return Err(StoreError::Conflict(format!(
                "active route already exists for {} {}",
                route.method, route.path
            )));
        }
        self.routes.insert(route.id, route.clone());
        Ok(route)
    }

    async fn update_route(&self, route: Route) -> StoreResult<Route> {
        if !self.routes.contains_key(&route.id) {
            return Err(StoreError::NotFound("route"));
        }
        if self.route_conflicts(&route) {
            return Err(StoreError::Conflict(format!(
                "active route already exists for {} {}",
                route.method, route.path
            )));
        }
        self.routes.insert(route.id, route.clone());
        Ok(route)
    }

    async fn delete_route(&self, id: Uuid) -> StoreResult<()> {
        self.routes
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("route"))
    }

    async fn list_routes(&self, credential: Option<&str>) -> StoreResult<Vec<Route>> {
        Ok(self
            .routes
            .iter()
            .filter(|route| credential.is_none_or(|token| route.credential == token))
            .map(|route| route.clone())
            .collect())
    }

    async fn fetch_metrics(&self, token: &str) -> StoreResult<Option<CredentialMetrics>> {
        Ok(self.metrics.get(token).map(|metrics| metrics.clone()))
    }

    async fn recent_logs(&self, credential: &str, limit: usize) -> StoreResult<Vec<LogEntry>> {
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .rev()
            .filter(|entry| entry.credential == credential)
            .take(limit)
            .cloned()
            .collect())
    }
}
