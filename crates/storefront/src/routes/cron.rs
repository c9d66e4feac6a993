//! Scheduled maintenance endpoints, gated by `CRON_API_KEY`.

use axum::{Json, extract::State};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use larder_db::ReservationRepository;
use larder_db::models::CleanupReport;

use crate::error::{ApiQuery, AppError, Result};
use crate::state::AppState;

/// Query parameters carrying the cron key.
#[derive(Deserialize)]
pub struct CronQuery {
    pub key: Option<String>,
}

/// Compare keys without leaking where they differ.
///
/// Both sides are hashed first so the comparison length is fixed.
fn keys_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Delete expired reservations from both cart tables.
///
/// # Route
///
/// `POST /api/cron/cleanup-reservations?key=`
pub async fn cleanup_reservations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CronQuery>,
) -> Result<Json<CleanupReport>> {
    let authorized = query
        .key
        .as_deref()
        .is_some_and(|key| keys_match(key, state.config().cron_api_key.expose_secret()));
    if !authorized {
        tracing::warn!("cleanup called with a missing or wrong key");
        return Err(AppError::Unauthorized("Invalid key".to_string()));
    }

    let report = ReservationRepository::new(state.pool())
        .cleanup_expired()
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("k3Y-9fQz!7wLm2Rt", "k3Y-9fQz!7wLm2Rt"));
        assert!(!keys_match("k3Y-9fQz!7wLm2R", "k3Y-9fQz!7wLm2Rt"));
        assert!(!keys_match("", "k3Y-9fQz!7wLm2Rt"));
    }
}
