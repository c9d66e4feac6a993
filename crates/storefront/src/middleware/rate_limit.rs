//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login and callback (~10/min per IP)
//! - `checkout_rate_limiter`: card charges (~6/min per IP)
//! - `api_rate_limiter`: everything else under `/api` (~100/min per IP)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client address, most trusted first.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Key extractor that prefers proxy-supplied client addresses and falls back
/// to the socket peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req).ok_or(GovernorError::UnableToExtractKey)
    }
}

fn client_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();

    let from_single = CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    });

    // First hop of X-Forwarded-For
    let from_forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    let from_peer = || {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    from_single.or_else(from_forwarded).or_else(from_peer)
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Login endpoints: one token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Never in practice: the quota is a positive constant.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5).expect("rate limiter config with per_second(6) and burst_size(5) is valid")
}

/// Checkout: one token every 10 seconds, burst of 3.
///
/// # Panics
///
/// Never in practice: the quota is a positive constant.
#[must_use]
pub fn checkout_rate_limiter() -> RateLimiterLayer {
    limiter(10, 3).expect("rate limiter config with per_second(10) and burst_size(3) is valid")
}

/// General API: one token per second, burst of 50.
///
/// # Panics
///
/// Never in practice: the quota is a positive constant.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(1, 50).expect("rate limiter config with per_second(1) and burst_size(50) is valid")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/cart");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", " 198.51.100.4 , 10.0.0.2")]);
        assert_eq!(client_ip(&req), Some("198.51.100.4".parse().unwrap()));
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = request(&[]);
        assert_eq!(client_ip(&req), None);

        let peer: SocketAddr = "192.0.2.9:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&req), Some(peer.ip()));
    }

    #[test]
    fn test_limiters_build() {
        let _ = auth_rate_limiter();
        let _ = checkout_rate_limiter();
        let _ = api_rate_limiter();
    }
}
