//! Tests for the background health tracker working against the live proxy
//! pipeline: probe cycles flip service status in the store, invalidate the
//! resolution cache and gate traffic on the next request.

mod common;

use serde_json::json;
use tollgate::MetadataStore;
use tollgate::model::{HttpMethod, ServiceStatus};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use common::{body_json, get, seed_credential, seed_route, seed_service, test_app};

/// A failing health endpoint takes the service out of rotation: the next
/// proxy call is refused with 503 and the tenant's health summary shows the
/// service as down.
#[tokio::test]
async fn probe_cycle_marks_a_failing_service_down_and_blocks_traffic() {
    let app = test_app();
    seed_credential(&app.store, "ak_tenant").await;
    let backend = MockServer::start().await;
    let service =
        seed_service(&app.store, "ak_tenant", &backend.uri(), ServiceStatus::Up).await;
    seed_route(
        &app.store,
        "ak_tenant",
        "/widgets",
        HttpMethod::Get,
        service.id,
        None,
        100,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    assert_eq!(get(&app.router, "/proxy/ak_tenant/widgets").await.status(), 200);

    assert_eq!(app.tracker.run_cycle().await, 1);

    let stored = app.store.find_service(service.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ServiceStatus::Down);
    assert!(stored.last_checked.is_some());

    let metrics = app
        .store
        .fetch_metrics("ak_tenant")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.service_health.len(), 1);
    assert_eq!(metrics.service_health[0].service_id, service.id);
    assert_eq!(metrics.service_health[0].status, ServiceStatus::Down);

    let refused = get(&app.router, "/proxy/ak_tenant/widgets").await;
    assert_eq!(refused.status(), 503);
    assert_eq!(
        body_json(refused).await["error"],
        json!("Service temporarily unavailable")
    );
}

/// A freshly registered service starts out unknown and carries no traffic
/// until a probe confirms it is healthy.
#[tokio::test]
async fn probe_cycle_restores_an_unknown_service() {
    let app = test_app();
    seed_credential(&app.store, "ak_tenant").await;
    let backend = MockServer::start().await;
    let service =
        seed_service(&app.store, "ak_tenant", &backend.uri(), ServiceStatus::Unknown).await;
    seed_route(
        &app.store,
        "ak_tenant",
        "/widgets",
        HttpMethod::Get,
        service.id,
        None,
        100,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;

    assert_eq!(get(&app.router, "/proxy/ak_tenant/widgets").await.status(), 503);

    assert_eq!(app.tracker.run_cycle().await, 1);

    assert_eq!(get(&app.router, "/proxy/ak_tenant/widgets").await.status(), 200);
}

/// Each probe cycle rewrites the per-service summary entry in place rather
/// than appending a new one.
#[tokio::test]
async fn repeated_cycles_keep_one_summary_entry_per_service() {
    let app = test_app();
    seed_credential(&app.store, "ak_tenant").await;
    let backend = MockServer::start().await;
    let service =
        seed_service(&app.store, "ak_tenant", &backend.uri(), ServiceStatus::Unknown).await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;

    assert_eq!(app.tracker.run_cycle().await, 1);
    let first = app
        .store
        .fetch_metrics("ak_tenant")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.tracker.run_cycle().await, 1);
    let second = app
        .store
        .fetch_metrics("ak_tenant")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.service_health.len(), 1);
    assert_eq!(second.service_health.len(), 1);
    assert_eq!(second.service_health[0].status, ServiceStatus::Up);
    assert!(second.service_health[0].checked_at >= first.service_health[0].checked_at);

    let stored = app.store.find_service(service.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ServiceStatus::Up);
}
