use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    model::{MetricsSnapshot, StatusBreakdown},
    store::MetadataStore,
};

#[derive(Debug, Default)]
struct Accumulator {
    total: AtomicU64,
    blocked: AtomicU64,
    latency_sum_ms: AtomicU64,
    success: AtomicU64,
    client_error: AtomicU64,
    server_error: AtomicU64,
    per_route: DashMap<Uuid, u64>,
}

// Per-credential accumulation between flushes. `record` holds the outer
// lock in read mode so requests only contend on their own shard; `flush`
// takes the write side to swap the whole map out, which is the only
// point where record and flush serialize.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    live: RwLock<DashMap<String, Accumulator>>,
    failed_merges: AtomicU64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(
        &self,
        credential: &str,
        latency_ms: u64,
        status: u16,
        blocked: bool,
        route_id: Option<Uuid>,
    ) {
        let live = self.live.read().await;
        let accumulator = live.entry(credential.to_string()).or_default();

        if blocked {
            accumulator.blocked.fetch_add(1, Ordering::Relaxed);
            return;
        }

        accumulator.total.fetch_add(1, Ordering::Relaxed);
        accumulator
            .latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        match status {
            200..=299 => accumulator.success.fetch_add(1, Ordering::Relaxed),
            400..=499 => accumulator.client_error.fetch_add(1, Ordering::Relaxed),
            500..=599 => accumulator.server_error.fetch_add(1, Ordering::Relaxed),
            // 1xx/3xx and malformed codes count toward the total only.
            _ => 0,
        };

        if let Some(route_id) = route_id {
            *accumulator.per_route.entry(route_id).or_insert(0) += 1;
        }
    }

    // Swaps the live map for an empty one; a record racing the swap lands
    // in exactly one of the two maps.
    pub async fn flush(&self) -> Vec<MetricsSnapshot> {
        let drained = {
            let mut live = self.live.write().await;
            std::mem::replace(&mut *live, DashMap::new())
        };

        let captured_at = Utc::now();
        let mut snapshots = Vec::new();
        for (credential, accumulator) in drained {
            let total = accumulator.total.load(Ordering::Relaxed);
            let blocked = accumulator.blocked.load(Ordering::Relaxed);
            if total == 0 && blocked == 0 {
                continue;
            }

            let latency_sum = accumulator.latency_sum_ms.load(Ordering::Relaxed);
            let avg_latency_ms = if total > 0 {
                latency_sum as f64 / total as f64
            } else {
                0.0
            };

            snapshots.push(MetricsSnapshot {
                credential,
                total_requests: total,
                blocked_requests: blocked,
                avg_latency_ms,
                status: StatusBreakdown {
                    success: accumulator.success.load(Ordering::Relaxed),
                    client_error: accumulator.client_error.load(Ordering::Relaxed),
                    server_error: accumulator.server_error.load(Ordering::Relaxed),
                },
                per_route: accumulator.per_route.into_iter().collect::<HashMap<_, _>>(),
                captured_at,
            });
        }
        snapshots
    }

    pub async fn flush_into(&self, store: &dyn MetadataStore) -> usize {
        let snapshots = self.flush().await;
        let mut merged = 0;
        for snapshot in &snapshots {
            match store.upsert_metric_snapshot(snapshot).await {
                Ok(()) => merged += 1,
                Err(err) => {
                    self.failed_merges.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        error = %err,
                        credential = %snapshot.credential,
                        "metric snapshot merge failed"
                    );
                }
            }
        }
        merged
    }

    pub fn failed_merges(&self) -> u64 {
        self.failed_merges.load(Ordering::Relaxed)
    }
}
