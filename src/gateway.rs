use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::to_bytes,
    extract::{ConnectInfo, Path, Request, State},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    cache::ResolutionCache,
    context::ProxyContext,
    error::GatewayError,
    forwarder::Forwarder,
    logsink::LogSink,
    metrics::MetricsAggregator,
    model::{CounterDelta, HttpMethod, LogEntry, ServiceStatus},
    ratelimit::SlidingWindowLimiter,
    store::MetadataStore,
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<dyn MetadataStore>,
    pub default_rate_limit: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/proxy", any(missing_credential))
        .route("/proxy/{credential}", any(proxy_root))
        .route("/proxy/{credential}/{*rest}", any(proxy_rest))
        .merge(crate::admin::router())
        .with_state(state)
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn missing_credential() -> Response {
    GatewayError::MissingCredential.into_response()
}

async fn proxy_root(
    State(state): State<AppState>,
    Path(credential): Path<String>,
    request: Request,
) -> Response {
    state.gateway.handle(credential, "/".to_string(), request).await
}

async fn proxy_rest(
    State(state): State<AppState>,
    Path((credential, rest)): Path<(String, String)>,
    request: Request,
) -> Response {
    state
        .gateway
        .handle(credential, format!("/{rest}"), request)
        .await
}

// Per-request pipeline: credential, route, quota, service health, then
// the forward itself. Each terminal outcome records a metric and pushes
// one log entry.
pub struct Gateway {
    store: Arc<dyn MetadataStore>,
    cache: Arc<ResolutionCache>,
    limiter: Arc<SlidingWindowLimiter>,
    metrics: Arc<MetricsAggregator>,
    logs: LogSink,
    forwarder: Forwarder,
    default_rate_limit: u32,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        cache: Arc<ResolutionCache>,
        limiter: Arc<SlidingWindowLimiter>,
        metrics: Arc<MetricsAggregator>,
        logs: LogSink,
        forwarder: Forwarder,
        default_rate_limit: u32,
    ) -> Self {
        Self {
            store,
            cache,
            limiter,
            metrics,
            logs,
            forwarder,
            default_rate_limit,
        }
    }

    pub async fn handle(&self, token: String, path: String, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        let query = parts.uri.query().map(ToString::to_string);
        let ctx = ProxyContext::new(token, parts.method, path, query, parts.headers, client_ip);

        if self.cache.resolve_credential(&ctx.credential).await.is_none() {
            return self.reject(&ctx, GatewayError::InvalidCredential, None).await;
        }

        let Some(method) = HttpMethod::from_method(&ctx.method) else {
            return self
                .reject(
                    &ctx,
                    GatewayError::RouteNotFound {
                        method: ctx.method.to_string(),
                        path: ctx.path.clone(),
                    },
                    None,
                )
                .await;
        };
        let Some(route) = self
            .cache
            .resolve_route(&ctx.credential, &ctx.path, method)
            .await
        else {
            return self
                .reject(
                    &ctx,
                    GatewayError::RouteNotFound {
                        method: ctx.method.to_string(),
                        path: ctx.path.clone(),
                    },
                    None,
                )
                .await;
        };

        let ceiling = if route.rate_limit > 0 {
            route.rate_limit
        } else {
            self.default_rate_limit
        };
        match self.limiter.check(&ctx.credential, route.id, ceiling).await {
            Ok(decision) if !decision.allowed => {
                return self
                    .reject(
                        &ctx,
                        GatewayError::RateLimited {
                            reset_at: decision.reset_at,
                        },
                        Some(route.id),
                    )
                    .await;
            }
            Ok(_) => {}
            // An accounting fault must not block traffic.
            Err(err) => {
                tracing::warn!(error = %err.message(), credential = %ctx.credential, "rate limit check failed, failing open");
            }
        }

        let Some(service) = self.cache.resolve_service(route.service_id).await else {
            return self.reject(&ctx, GatewayError::ServiceMissing, None).await;
        };
        if service.status != ServiceStatus::Up {
            return self
                .reject(&ctx, GatewayError::ServiceDown, Some(route.id))
                .await;
        }

        let body = match to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(err) => {
                return self
                    .reject(&ctx, GatewayError::Internal(err.to_string()), None)
                    .await;
            }
        };

        let destination = route.destination_path.as_deref().unwrap_or(&ctx.path);
        let forwarded = self.forwarder.forward(&ctx, &service, destination, body).await;

        match forwarded {
            Ok(response) => {
                let latency_ms = ctx.started_at.elapsed().as_millis() as u64;
                let status = response.status().as_u16();
                self.metrics
                    .record(&ctx.credential, latency_ms, status, false, Some(route.id))
                    .await;
                if let Err(err) = self
                    .store
                    .increment_credential_counters(
                        &ctx.credential,
                        CounterDelta::completed(latency_ms),
                    )
                    .await
                {
                    tracing::debug!(error = %err, credential = %ctx.credential, "credential counter update failed");
                }
                self.push_log(&ctx, status, latency_ms, None);
                tracing::info!(
                    credential = %ctx.credential,
                    route_id = %route.id,
                    service = %service.name,
                    status,
                    latency_ms,
                    "request forwarded"
                );
                response
            }
            Err(err) => self.reject(&ctx, err, None).await,
        }
    }

    async fn reject(
        &self,
        ctx: &ProxyContext,
        error: GatewayError,
        route_id: Option<Uuid>,
    ) -> Response {
        let latency_ms = ctx.started_at.elapsed().as_millis() as u64;
        let status = error.status().as_u16();
        let blocked = matches!(error, GatewayError::RateLimited { .. });

        self.metrics
            .record(&ctx.credential, latency_ms, status, blocked, route_id)
            .await;
        if blocked {
            if let Err(err) = self
                .store
                .increment_credential_counters(&ctx.credential, CounterDelta::blocked())
                .await
            {
                tracing::debug!(error = %err, credential = %ctx.credential, "blocked counter update failed");
            }
        }
        self.push_log(ctx, status, latency_ms, Some(error.message()));
        tracing::info!(
            credential = %ctx.credential,
            status,
            latency_ms,
            error = %error.message(),
            "request rejected"
        );
        error.into_response()
    }

    fn push_log(&self, ctx: &ProxyContext, status: u16, latency_ms: u64, error: Option<String>) {
        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            method: ctx.method.to_string(),
            path: ctx.path.clone(),
            status,
            latency_ms,
            credential: ctx.credential.clone(),
            error,
        });
    }
}
