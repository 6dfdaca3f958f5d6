use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug)]
pub enum GatewayError {
    MissingCredential,
    InvalidCredential,
    RouteNotFound { method: String, path: String },
    RateLimited { reset_at: DateTime<Utc> },
    ServiceMissing,
    ServiceDown,
    Upstream(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(rename = "resetAt", skip_serializing_if = "Option::is_none")]
    reset_at: Option<DateTime<Utc>>,
}

impl GatewayError {
    pub fn message(&self) -> String {
        match self {
            Self::MissingCredential => "API key is required".to_string(),
            Self::InvalidCredential => "Invalid API key".to_string(),
            Self::RouteNotFound { method, path } => {
                format!("No route found for {method} {path}")
            }
            Self::RateLimited { .. } => "Rate limit exceeded".to_string(),
            Self::ServiceMissing => "Service unavailable".to_string(),
            Self::ServiceDown => "Service temporarily unavailable".to_string(),
            Self::Upstream(msg) => format!("Upstream request failed: {msg}"),
            Self::Internal(_) => "Internal proxy error".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::BAD_REQUEST,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceMissing => StatusCode::BAD_GATEWAY,
            Self::ServiceDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reset_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "proxy request failed");
        }

        let status = self.status();
        let mut response = (
            status,
            Json(ErrorBody {
                success: false,
                error: self.message(),
                reset_at: self.reset_at(),
            }),
        )
            .into_response();

        if let Self::RateLimited { reset_at } = self {
            let retry_after = (reset_at - Utc::now()).num_seconds().max(0);
            if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }

        if !response.headers().contains_key(header::CONTENT_TYPE) {
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        response
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}
