use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use tokio::task::JoinSet;

use crate::{
    cache::ResolutionCache,
    forwarder::join_url,
    model::{Service, ServiceHealthEntry, ServiceStatus},
    store::MetadataStore,
};

// Periodically probes every registered service and owns the resulting
// status/latency writes. Nothing else mutates those fields.
#[derive(Clone)]
pub struct HealthTracker {
    store: Arc<dyn MetadataStore>,
    cache: Arc<ResolutionCache>,
    client: reqwest::Client,
    interval: Duration,
}

impl HealthTracker {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        cache: Arc<ResolutionCache>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(probe_timeout).build()?;
        Ok(Self {
            store,
            cache,
            client,
            interval,
        })
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let checked = self.run_cycle().await;
                tracing::debug!(services = checked, "health cycle complete");
            }
        })
    }

    // One full sweep over every registered service, probes running
    // concurrently. Public so tests can drive cycles without timers.
    pub async fn run_cycle(&self) -> usize {
        let services = match self.store.list_services().await {
            Ok(services) => services,
            Err(err) => {
                tracing::warn!(error = %err, "health cycle skipped, could not list services");
                return 0;
            }
        };

        let mut probes = JoinSet::new();
        for service in services {
            let tracker = self.clone();
            probes.spawn(async move { tracker.probe_and_record(service).await });
        }

        let mut checked = 0;
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(()) => checked += 1,
                Err(err) => tracing::warn!(error = %err, "health probe task failed"),
            }
        }
        checked
    }

    async fn probe_and_record(&self, service: Service) {
        let checked_at = Utc::now();
        let (status, latency_ms) = self.probe(&service).await;

        if status != service.status {
            tracing::info!(
                service = %service.name,
                from = %service.status,
                to = %status,
                "service health changed"
            );
        }

        // A failure for one service must not abort the rest of the cycle.
        if let Err(err) = self
            .store
            .update_service_health(service.id, status, latency_ms, checked_at)
            .await
        {
            tracing::warn!(error = %err, service = %service.name, "failed to persist health result");
        }

        self.cache.invalidate_service(service.id);

        let entry = ServiceHealthEntry {
            service_id: service.id,
            name: service.name.clone(),
            status,
            latency_ms,
            checked_at,
        };
        if let Err(err) = self
            .store
            .record_service_health(&service.credential, entry)
            .await
        {
            tracing::warn!(error = %err, service = %service.name, "failed to update tenant health summary");
        }
    }

    // 2xx/3xx count as UP; anything else, including timeouts and refused
    // connections, is DOWN. Latency is recorded either way.
    async fn probe(&self, service: &Service) -> (ServiceStatus, u64) {
        let url = join_url(&service.base_url, &service.health_path);
        let started = Instant::now();
        let outcome = self.client.get(&url).send().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = match outcome {
            Ok(response)
                if response.status().is_success() || response.status().is_redirection() =>
            {
                ServiceStatus::Up
            }
            Ok(response) => {
                tracing::debug!(
                    service = %service.name,
                    status = response.status().as_u16(),
                    "health probe returned non-healthy status"
                );
                ServiceStatus::Down
            }
            Err(err) => {
                tracing::debug!(service = %service.name, error = %err, "health probe failed");
                ServiceStatus::Down
            }
        };
        (status, latency_ms)
    }
}
