//! Request ID middleware for request tracing and correlation.
//!
//! An upstream `x-request-id` is kept when it is a sane token; otherwise a
//! UUID v4 is minted. The id is recorded on the request span, tagged on the
//! Sentry scope, and echoed in the response headers.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream request id we will echo back.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Pick the request id for `headers`.
fn request_id_for(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request_id_for(request.headers());

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_upstream_id_kept() {
        assert_eq!(request_id_for(&headers("cf-8a1b.2")), "cf-8a1b.2");
    }

    #[test]
    fn test_missing_or_odd_id_replaced() {
        let minted = request_id_for(&HeaderMap::new());
        assert!(Uuid::parse_str(&minted).is_ok());

        let replaced = request_id_for(&headers("has spaces;and=stuff"));
        assert!(Uuid::parse_str(&replaced).is_ok());
    }
}
