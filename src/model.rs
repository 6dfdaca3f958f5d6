use std::collections::HashMap;

use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::DELETE => Some(Self::Delete),
            Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub token: String,
    pub account_id: Uuid,
    pub name: String,
    pub base_url: Option<String>,
    pub description: Option<String>,
    pub version: String,
    pub active: bool,
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub average_latency_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn apply_delta(&mut self, delta: &CounterDelta) {
        let old_total = self.total_requests as f64;
        self.total_requests += delta.total;
        self.blocked_requests += delta.blocked;
        if let Some(sample) = delta.latency_sample_ms {
            let new_total = self.total_requests as f64;
            if new_total > 0.0 {
                self.average_latency_ms =
                    (self.average_latency_ms * old_total + sample as f64) / new_total;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterDelta {
    pub total: u64,
    pub blocked: u64,
    pub latency_sample_ms: Option<u64>,
}

impl CounterDelta {
    pub fn completed(latency_ms: u64) -> Self {
        Self {
            total: 1,
            blocked: 0,
            latency_sample_ms: Some(latency_ms),
        }
    }

    pub fn blocked() -> Self {
        Self {
            total: 0,
            blocked: 1,
            latency_sample_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub credential: String,
    pub path: String,
    pub method: HttpMethod,
    pub service_id: Uuid,
    pub destination_path: Option<String>,
    pub rate_limit: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub credential: String,
    pub name: String,
    pub base_url: String,
    pub health_path: String,
    pub status: ServiceStatus,
    pub latency_ms: u64,
    pub last_checked: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u64,
    pub credential: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    #[serde(rename = "2xx")]
    pub success: u64,
    #[serde(rename = "4xx")]
    pub client_error: u64,
    #[serde(rename = "5xx")]
    pub server_error: u64,
}

impl StatusBreakdown {
    fn merge(&mut self, other: &StatusBreakdown) {
        self.success += other.success;
        self.client_error += other.client_error;
        self.server_error += other.server_error;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RouteStat {
    pub count: u64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthEntry {
    pub service_id: Uuid,
    pub name: String,
    pub status: ServiceStatus,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub credential: String,
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub avg_latency_ms: f64,
    pub status: StatusBreakdown,
    pub per_route: HashMap<Uuid, u64>,
    pub captured_at: DateTime<Utc>,
}

pub const TIMESERIES_CAP: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialMetrics {
    pub credential: String,
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub total_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub status_breakdown: StatusBreakdown,
    pub timeseries: Vec<HourlyBucket>,
    pub routes: HashMap<Uuid, RouteStat>,
    pub service_health: Vec<ServiceHealthEntry>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialMetrics {
    pub fn empty(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            total_requests: 0,
            blocked_requests: 0,
            total_latency_ms: 0.0,
            avg_latency_ms: 0.0,
            status_breakdown: StatusBreakdown::default(),
            timeseries: Vec::new(),
            routes: HashMap::new(),
            service_health: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &MetricsSnapshot) {
        self.total_requests += snapshot.total_requests;
        self.blocked_requests += snapshot.blocked_requests;
        self.total_latency_ms += snapshot.avg_latency_ms * snapshot.total_requests as f64;
        if self.total_requests > 0 {
            self.avg_latency_ms = self.total_latency_ms / self.total_requests as f64;
        }
        self.status_breakdown.merge(&snapshot.status);

        for (route_id, hits) in &snapshot.per_route {
            self.routes.entry(*route_id).or_default().count += hits;
        }

        if snapshot.total_requests > 0 {
            self.bump_bucket(snapshot);
        }

        self.updated_at = snapshot.captured_at;
    }

    // One bucket per UTC hour; the newest 24 are kept.
    fn bump_bucket(&mut self, snapshot: &MetricsSnapshot) {
        let hour = hour_key(snapshot.captured_at);
        if let Some(bucket) = self
            .timeseries
            .iter_mut()
            .find(|bucket| hour_key(bucket.timestamp) == hour)
        {
            bucket.count += snapshot.total_requests;
            bucket.latency_ms = snapshot.avg_latency_ms;
        } else {
            self.timeseries.push(HourlyBucket {
                timestamp: snapshot.captured_at,
                count: snapshot.total_requests,
                latency_ms: snapshot.avg_latency_ms,
            });
            if self.timeseries.len() > TIMESERIES_CAP {
                self.timeseries.remove(0);
            }
        }
    }

    // A service's previous summary entry is replaced wholesale, never merged.
    pub fn set_service_health(&mut self, entry: ServiceHealthEntry) {
        self.service_health
            .retain(|existing| existing.service_id != entry.service_id);
        self.service_health.push(entry);
    }
}

fn hour_key(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(3600)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn snapshot_at(ts: DateTime<Utc>, total: u64, avg: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            credential: "key".to_string(),
            total_requests: total,
            blocked_requests: 0,
            avg_latency_ms: avg,
            status: StatusBreakdown {
                success: total,
                ..Default::default()
            },
            per_route: HashMap::new(),
            captured_at: ts,
        }
    }

    #[test]
    fn snapshot_merge_accumulates_and_recomputes_average() {
        let mut metrics = CredentialMetrics::empty("key");
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        metrics.apply_snapshot(&snapshot_at(ts, 4, 100.0));
        metrics.apply_snapshot(&snapshot_at(ts, 6, 50.0));

        assert_eq!(metrics.total_requests, 10);
        assert!((metrics.total_latency_ms - 700.0).abs() < f64::EPSILON);
        assert!((metrics.avg_latency_ms - 70.0).abs() < f64::EPSILON);
        assert_eq!(metrics.status_breakdown.success, 10);
    }

    #[test]
    fn snapshots_within_one_hour_share_a_bucket() {
        let mut metrics = CredentialMetrics::empty("key");
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 1, 10, 55, 0).unwrap();

        metrics.apply_snapshot(&snapshot_at(first, 3, 10.0));
        metrics.apply_snapshot(&snapshot_at(second, 2, 20.0));

        assert_eq!(metrics.timeseries.len(), 1);
        assert_eq!(metrics.timeseries[0].count, 5);
        assert!((metrics.timeseries[0].latency_ms - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hour_rollover_opens_a_new_bucket_and_cap_evicts_oldest() {
        let mut metrics = CredentialMetrics::empty("key");
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 30, 0).unwrap();

        for hour in 0..(TIMESERIES_CAP as i64 + 2) {
            let ts = base + chrono::Duration::hours(hour);
            metrics.apply_snapshot(&snapshot_at(ts, 1, 5.0));
        }

        assert_eq!(metrics.timeseries.len(), TIMESERIES_CAP);
        // The two oldest hours fell off the front.
        assert_eq!(
            hour_key(metrics.timeseries[0].timestamp),
            hour_key(base + chrono::Duration::hours(2))
        );
    }

    #[test]
    fn blocked_only_snapshot_leaves_timeseries_alone() {
        let mut metrics = CredentialMetrics::empty("key");
        let snapshot = MetricsSnapshot {
            credential: "key".to_string(),
            total_requests: 0,
            blocked_requests: 3,
            avg_latency_ms: 0.0,
            status: StatusBreakdown::default(),
            per_route: HashMap::new(),
            captured_at: Utc::now(),
        };

        metrics.apply_snapshot(&snapshot);

        assert_eq!(metrics.blocked_requests, 3);
        assert_eq!(metrics.total_requests, 0);
        assert!(metrics.timeseries.is_empty());
        assert!((metrics.avg_latency_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn service_health_entry_is_replaced_not_merged() {
        let mut metrics = CredentialMetrics::empty("key");
        let service_id = Uuid::new_v4();

        metrics.set_service_health(ServiceHealthEntry {
            service_id,
            name: "billing".to_string(),
            status: ServiceStatus::Up,
            latency_ms: 12,
            checked_at: Utc::now(),
        });
        metrics.set_service_health(ServiceHealthEntry {
            service_id,
            name: "billing".to_string(),
            status: ServiceStatus::Down,
            latency_ms: 40,
            checked_at: Utc::now(),
        });

        assert_eq!(metrics.service_health.len(), 1);
        assert_eq!(metrics.service_health[0].status, ServiceStatus::Down);
        assert_eq!(metrics.service_health[0].latency_ms, 40);
    }

    #[test]
    fn credential_running_average_follows_the_weighted_formula() {
        let mut credential = Credential {
            id: Uuid::new_v4(),
            token: "key".to_string(),
            account_id: Uuid::new_v4(),
            name: "demo".to_string(),
            base_url: None,
            description: None,
            version: "1.0.0".to_string(),
            active: true,
            total_requests: 0,
            blocked_requests: 0,
            average_latency_ms: 0.0,
            created_at: Utc::now(),
        };

        credential.apply_delta(&CounterDelta::completed(100));
        credential.apply_delta(&CounterDelta::completed(50));
        credential.apply_delta(&CounterDelta::blocked());

        assert_eq!(credential.total_requests, 2);
        assert_eq!(credential.blocked_requests, 1);
        assert!((credential.average_latency_ms - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn method_parsing_matches_the_fixed_set() {
        assert_eq!(HttpMethod::from_method(&Method::GET), Some(HttpMethod::Get));
        assert_eq!(
            HttpMethod::from_method(&Method::PATCH),
            Some(HttpMethod::Patch)
        );
        assert_eq!(HttpMethod::from_method(&Method::HEAD), None);
        assert_eq!(HttpMethod::from_method(&Method::OPTIONS), None);
        assert_eq!("delete".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }
}
