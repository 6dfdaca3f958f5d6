// Each test binary exercises a different slice of this harness.
#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use chrono::Utc;
use tower::ServiceExt;
use uuid::Uuid;

use tollgate::{
    AppState, Forwarder, Gateway, HealthTracker, InMemoryStore, LogSink, MetadataStore,
    MetricsAggregator, ResolutionCache, SlidingWindowLimiter,
    model::{Credential, Route, Service, ServiceStatus},
    router,
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub metrics: Arc<MetricsAggregator>,
    pub logs: LogSink,
    pub tracker: HealthTracker,
}

// Zero-TTL caches so every request observes the store directly; cache
// retention itself is covered by unit tests.
pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let dyn_store: Arc<dyn MetadataStore> = store.clone();
    let cache = Arc::new(ResolutionCache::new(
        dyn_store.clone(),
        Duration::ZERO,
        Duration::ZERO,
        Duration::ZERO,
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new());
    let metrics = Arc::new(MetricsAggregator::new());
    let logs = LogSink::new(dyn_store.clone(), 64);
    let forwarder = Forwarder::new(Duration::from_secs(5)).unwrap();
    let tracker = HealthTracker::new(
        dyn_store.clone(),
        cache.clone(),
        Duration::from_secs(10),
        Duration::from_millis(500),
    )
    .unwrap();

    let gateway = Arc::new(Gateway::new(
        dyn_store.clone(),
        cache,
        limiter,
        metrics.clone(),
        logs.clone(),
        forwarder,
        100,
    ));
    let router = router(AppState {
        gateway,
        store: dyn_store,
        default_rate_limit: 100,
    });

    TestApp {
        router,
        store,
        metrics,
        logs,
        tracker,
    }
}

pub async fn seed_credential(store: &InMemoryStore, token: &str) -> Credential {
    store
        .create_credential(Credential {
            id: Uuid::new_v4(),
            token: token.to_string(),
            account_id: Uuid::new_v4(),
            name: "test tenant".to_string(),
            base_url: None,
            description: None,
            version: "1.0.0".to_string(),
            active: true,
            total_requests: 0,
            blocked_requests: 0,
            average_latency_ms: 0.0,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

pub async fn seed_service(
    store: &InMemoryStore,
    token: &str,
    base_url: &str,
    status: ServiceStatus,
) -> Service {
    store
        .create_service(Service {
            id: Uuid::new_v4(),
            credential: token.to_string(),
            name: "widgets".to_string(),
            base_url: base_url.to_string(),
            health_path: "/health".to_string(),
            status,
            latency_ms: 0,
            last_checked: None,
            description: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

pub async fn seed_route(
    store: &InMemoryStore,
    token: &str,
    path: &str,
    method: tollgate::model::HttpMethod,
    service_id: Uuid,
    destination_path: Option<&str>,
    rate_limit: u32,
) -> Route {
    store
        .create_route(Route {
            id: Uuid::new_v4(),
            credential: token.to_string(),
            path: path.to_string(),
            method,
            service_id,
            destination_path: destination_path.map(ToString::to_string),
            rate_limit,
            active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(
        router,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn put_json(router: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        router,
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn delete(router: &Router, uri: &str) -> Response<Body> {
    send(
        router,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
