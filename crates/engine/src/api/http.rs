//! HTTP routes.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use atlas_domain::{Tenant, TenantId};
use atlas_shared::{headers, JsonApiError};

use super::{characters, conversations, quests};
use crate::app::App;
use crate::infrastructure::ports::{Message, ProducerError, RepoError};
use crate::infrastructure::seed::SeedError;
use crate::use_cases::character::CharacterError;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/messages/{topic}", post(publish_message))
        .merge(characters::routes())
        .merge(quests::routes())
        .merge(conversations::routes())
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct PublishParams {
    #[serde(default)]
    key: String,
}

/// Ingress for peers without a shared broker: the body is published verbatim
/// under the named topic and consumed like any other message.
async fn publish_message(
    State(app): State<Arc<App>>,
    RequestTenant(tenant): RequestTenant,
    Path(topic): Path<String>,
    Query(params): Query<PublishParams>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    if app.bus.names().topic(&topic).is_none() {
        return Err(ApiError::BadRequest(format!("unknown topic {topic}")));
    }
    let message = Message::json(params.key, &body)?;
    app.bus.publish(&tenant, &topic, message);
    Ok(StatusCode::ACCEPTED)
}

// =============================================================================
// Tenant extraction
// =============================================================================

/// The tenant named by the request's tenant headers.
#[derive(Debug, Clone)]
pub struct RequestTenant(pub Tenant);

impl<S> FromRequestParts<S> for RequestTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &'static str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))
        };

        let id = Uuid::parse_str(header(headers::TENANT_ID)?)
            .map_err(|_| ApiError::BadRequest("invalid TENANT_ID header".into()))?;
        let region = header(headers::REGION)?;
        let major = header(headers::MAJOR_VERSION)?
            .parse()
            .map_err(|_| ApiError::BadRequest("invalid MAJOR_VERSION header".into()))?;
        let minor = header(headers::MINOR_VERSION)?
            .parse()
            .map_err(|_| ApiError::BadRequest("invalid MINOR_VERSION header".into()))?;

        Ok(RequestTenant(Tenant::new(
            TenantId::from_uuid(id),
            region,
            major,
            minor,
        )))
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, String::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        };
        let title = status.canonical_reason().unwrap_or_default();
        let body = JsonApiError::single(status.as_u16(), title, detail);
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<ProducerError> for ApiError {
    fn from(e: ProducerError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<CharacterError> for ApiError {
    fn from(e: CharacterError) -> Self {
        match e {
            CharacterError::NotFound(_) => ApiError::NotFound,
            e if e.is_validation() => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SeedError> for ApiError {
    fn from(e: SeedError) -> Self {
        match e {
            SeedError::Json(e) => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}
