use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    gateway::AppState,
    model::{Credential, CredentialMetrics, HttpMethod, LogEntry, Route, Service, ServiceStatus},
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::Conflict(_) => StatusCode::CONFLICT,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::Internal(msg),
        }
    }
}

// Thin management surface: validate, call the store, serialize. Gateway
// behavior picks changes up through cache expiry, not through any push.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/credentials",
            post(create_credential).get(list_credentials),
        )
        .route(
            "/admin/credentials/{token}",
            axum::routing::delete(deactivate_credential),
        )
        .route("/admin/services", post(create_service).get(list_services))
        .route(
            "/admin/services/{id}",
            put(update_service).delete(delete_service),
        )
        .route("/admin/routes", post(create_route).get(list_routes))
        .route("/admin/routes/{id}", put(update_route).delete(delete_route))
        .route("/admin/metrics/{token}", get(fetch_metrics))
        .route("/admin/logs", get(recent_logs))
}

#[derive(Debug, Deserialize)]
pub struct CreateCredentialRequest {
    pub name: String,
    pub account_id: Uuid,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

async fn create_credential(
    State(state): State<AppState>,
    Json(request): Json<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<Credential>), AdminError> {
    if request.name.trim().is_empty() {
        return Err(AdminError::InvalidRequest("name must not be empty".to_string()));
    }

    let credential = Credential {
        id: Uuid::new_v4(),
        token: format!("ak_{}", Uuid::new_v4().simple()),
        account_id: request.account_id,
        name: request.name,
        base_url: request.base_url,
        description: request.description,
        version: request.version.unwrap_or_else(|| "1.0.0".to_string()),
        active: true,
        total_requests: 0,
        blocked_requests: 0,
        average_latency_ms: 0.0,
        created_at: Utc::now(),
    };
    let created = state.store.create_credential(credential).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_credentials(
    State(state): State<AppState>,
) -> Result<Json<Vec<Credential>>, AdminError> {
    Ok(Json(state.store.list_credentials().await?))
}

async fn deactivate_credential(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Credential>, AdminError> {
    Ok(Json(state.store.deactivate_credential(&token).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub credential: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub health_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AdminError> {
    require_credential(&state, &request.credential).await?;

    let service = Service {
        id: Uuid::new_v4(),
        credential: request.credential,
        name: request.name,
        base_url: request.base_url,
        health_path: request.health_path.unwrap_or_else(|| "/health".to_string()),
        status: ServiceStatus::Unknown,
        latency_ms: 0,
        last_checked: None,
        description: request.description,
        created_at: Utc::now(),
    };
    let created = state.store.create_service(service).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>, AdminError> {
    Ok(Json(state.store.list_services().await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub health_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Service>, AdminError> {
    let mut service = state
        .store
        .find_service(id)
        .await?
        .ok_or(AdminError::NotFound("service"))?;

    // Status, latency and last-checked stay owned by the health tracker.
    if let Some(name) = request.name {
        service.name = name;
    }
    if let Some(base_url) = request.base_url {
        service.base_url = base_url;
    }
    if let Some(health_path) = request.health_path {
        service.health_path = health_path;
    }
    if let Some(description) = request.description {
        service.description = Some(description);
    }

    Ok(Json(state.store.update_service(service).await?))
}

async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    state.store.delete_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub credential: String,
    pub path: String,
    pub method: HttpMethod,
    pub service_id: Uuid,
    #[serde(default)]
    pub destination_path: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

async fn create_route(
    State(state): State<AppState>,
    Json(request): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<Route>), AdminError> {
    require_credential(&state, &request.credential).await?;
    require_path(&request.path)?;
    if let Some(destination) = &request.destination_path {
        require_path(destination)?;
    }

    let service = state
        .store
        .find_service(request.service_id)
        .await?
        .ok_or(AdminError::NotFound("service"))?;
    if service.credential != request.credential {
        return Err(AdminError::InvalidRequest(
            "service belongs to a different credential".to_string(),
        ));
    }

    let route = Route {
        id: Uuid::new_v4(),
        credential: request.credential,
        path: request.path,
        method: request.method,
        service_id: request.service_id,
        destination_path: request.destination_path,
        rate_limit: request.rate_limit.unwrap_or(state.default_rate_limit),
        active: true,
        created_at: Utc::now(),
    };
    let created = state.store.create_route(route).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct RouteListQuery {
    #[serde(default)]
    pub credential: Option<String>,
}

async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteListQuery>,
) -> Result<Json<Vec<Route>>, AdminError> {
    Ok(Json(
        state.store.list_routes(query.credential.as_deref()).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub destination_path: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default)]
    pub active: Option<bool>,
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> Result<Json<Route>, AdminError> {
    let routes = state.store.list_routes(None).await?;
    let mut route = routes
        .into_iter()
        .find(|route| route.id == id)
        .ok_or(AdminError::NotFound("route"))?;

    if let Some(path) = request.path {
        require_path(&path)?;
        route.path = path;
    }
    if let Some(method) = request.method {
        route.method = method;
    }
    if let Some(service_id) = request.service_id {
        let service = state
            .store
            .find_service(service_id)
            .await?
            .ok_or(AdminError::NotFound("service"))?;
        if service.credential != route.credential {
            return Err(AdminError::InvalidRequest(
                "service belongs to a different credential".to_string(),
            ));
        }
        route.service_id = service_id;
    }
    if let Some(destination) = request.destination_path {
        require_path(&destination)?;
        route.destination_path = Some(destination);
    }
    if let Some(rate_limit) = request.rate_limit {
        route.rate_limit = rate_limit;
    }
    if let Some(active) = request.active {
        route.active = active;
    }

    Ok(Json(state.store.update_route(route).await?))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    state.store.delete_route(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_metrics(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<CredentialMetrics>, AdminError> {
    state
        .store
        .fetch_metrics(&token)
        .await?
        .map(Json)
        .ok_or(AdminError::NotFound("metrics"))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub credential: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>, AdminError> {
    let limit = query.limit.unwrap_or(100).min(500);
    Ok(Json(state.store.recent_logs(&query.credential, limit).await?))
}

async fn require_credential(state: &AppState, token: &str) -> Result<(), AdminError> {
    state
        .store
        .find_credential(token)
        .await?
        .map(|_| ())
        .ok_or_else(|| AdminError::InvalidRequest("unknown credential".to_string()))
}

fn require_path(path: &str) -> Result<(), AdminError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(AdminError::InvalidRequest(
            "paths must start with '/'".to_string(),
        ))
    }
}
