//! Security headers middleware.
//!
//! The storefront only serves JSON, so the policy denies everything a
//! document could load and forbids framing.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::STRICT_TRANSPORT_SECURITY,
    },
    middleware::Next,
    response::Response,
};

/// Headers applied to every response.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'",
    ),
    ("cache-control", "no-store, max-age=0"),
    ("cross-origin-resource-policy", "same-origin"),
];

/// Add security headers to all responses.
///
/// `Strict-Transport-Security` is only sent when the request arrived over
/// HTTPS at the proxy (`x-forwarded-proto: https`).
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let forwarded_https = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for &(name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    if forwarded_https {
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
