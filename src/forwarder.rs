use std::time::Duration;

use axum::{body::Body, response::Response};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, header::HeaderName};

use crate::{
    context::ProxyContext,
    error::{GatewayError, GatewayResult},
    model::Service,
};

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

// Owns the pooled client for proxied traffic. Forwarded calls relay the
// backend's status verbatim, server errors included; only a transport
// failure surfaces as a gateway error.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub async fn forward(
        &self,
        ctx: &ProxyContext,
        service: &Service,
        destination: &str,
        body: Bytes,
    ) -> GatewayResult<Response<Body>> {
        let mut target = join_url(&service.base_url, destination);
        if let Some(query) = ctx.query.as_deref() {
            target.push('?');
            target.push_str(query);
        }

        let mut outbound = HeaderMap::new();
        for (name, value) in &ctx.headers {
            if should_forward_header(name) {
                outbound.append(name, value.clone());
            }
        }
        // These two identify the gateway to the backend; client-supplied
        // values are overwritten, not merged.
        if let Ok(value) = HeaderValue::from_str(&ctx.credential) {
            outbound.insert(X_API_KEY, value);
        }
        if let Some(ip) = ctx.client_ip {
            if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
                outbound.insert(X_FORWARDED_FOR, value);
            }
        }

        let response = self
            .client
            .request(ctx.method.clone(), &target)
            .headers(outbound)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| GatewayError::Upstream(err.to_string()))?;

        let status = response.status();
        let response_headers = response.headers().clone();
        let response_body = response.bytes().await?;

        let mut builder = Response::builder().status(status);
        for (name, value) in &response_headers {
            if should_forward_header(name) {
                builder = builder.header(name, value);
            }
        }
        builder
            .body(Body::from(response_body))
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

// Hop-by-hop headers plus host and content-length, which the outbound
// client computes itself.
fn should_forward_header(name: &HeaderName) -> bool {
    !matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}
