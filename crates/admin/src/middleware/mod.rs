//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Security headers
//! 4. Session layer (OAuth state only)
//! 5. [`RequireAdmin`] extractor on every `/api` handler

pub mod auth;
pub mod security_headers;
pub mod session;

pub use auth::{AUTH_COOKIE_NAME, AuthCookie, RequireAdmin};
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_store};
