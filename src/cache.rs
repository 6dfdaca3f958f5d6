use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    model::{Credential, HttpMethod, Route, Service},
    store::MetadataStore,
};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn fresh(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

type RouteKey = (String, String, HttpMethod);

// Read-through cache in front of the metadata store. Credentials cache
// negative results as well, routes and services cache hits only.
pub struct ResolutionCache {
    store: Arc<dyn MetadataStore>,
    credentials: DashMap<String, Entry<Option<Credential>>>,
    routes: DashMap<RouteKey, Entry<Route>>,
    services: DashMap<Uuid, Entry<Service>>,
    credential_ttl: Duration,
    route_ttl: Duration,
    service_ttl: Duration,
}

impl ResolutionCache {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        credential_ttl: Duration,
        route_ttl: Duration,
        service_ttl: Duration,
    ) -> Self {
        Self {
            store,
            credentials: DashMap::new(),
            routes: DashMap::new(),
            services: DashMap::new(),
            credential_ttl,
            route_ttl,
            service_ttl,
        }
    }

    pub async fn resolve_credential(&self, token: &str) -> Option<Credential> {
        if let Some(entry) = self.credentials.get(token) {
            if entry.live() {
                return entry.value.clone();
            }
        }

        match self.store.find_credential(token).await {
            Ok(value) => {
                self.credentials.insert(
                    token.to_string(),
                    Entry::fresh(value.clone(), self.credential_ttl),
                );
                value
            }
            Err(err) => {
                tracing::warn!(error = %err, "credential lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn resolve_route(
        &self,
        credential: &str,
        path: &str,
        method: HttpMethod,
    ) -> Option<Route> {
        let key = (credential.to_string(), path.to_string(), method);
        if let Some(entry) = self.routes.get(&key) {
            if entry.live() {
                return Some(entry.value.clone());
            }
        }

        match self.store.find_route(credential, path, method).await {
            Ok(Some(route)) => {
                self.routes
                    .insert(key, Entry::fresh(route.clone(), self.route_ttl));
                Some(route)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "route lookup failed, treating as miss");
                None
            }
        }
    }

    pub async fn resolve_service(&self, id: Uuid) -> Option<Service> {
        if let Some(entry) = self.services.get(&id) {
            if entry.live() {
                return Some(entry.value.clone());
            }
        }

        match self.store.find_service(id).await {
            Ok(Some(service)) => {
                self.services
                    .insert(id, Entry::fresh(service.clone(), self.service_ttl));
                Some(service)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, service_id = %id, "service lookup failed, treating as miss");
                None
            }
        }
    }

    // Called by the health tracker after every probe so routing sees
    // status flips without waiting out the TTL.
    pub fn invalidate_service(&self, id: Uuid) {
        self.services.remove(&id);
    }
}
