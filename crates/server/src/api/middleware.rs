//! Metrics middleware and caller identity extraction for API routes.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Header naming the staff member behind a request.
pub const REQUESTED_BY_HEADER: &str = "x-requested-by";

/// Header carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Extractor for the caller identity.
///
/// Read from the `X-Requested-By` header and recorded with uploads. It is
/// not authenticated. Falls back to "anonymous" when the header is missing
/// or blank.
#[derive(Debug, Clone)]
pub struct RequestedBy(pub String);

impl<S> FromRequestParts<S> for RequestedBy
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = header_value(&parts.headers, REQUESTED_BY_HEADER)
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(RequestedBy(user_id)))
    }
}

/// Extractor for the request correlation id.
///
/// Uses `X-Request-Id` when present, otherwise a fresh UUID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let request_id = header_value(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        std::future::ready(Ok(RequestId(request_id)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}
