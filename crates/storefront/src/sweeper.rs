//! In-process expired-reservation sweeper.
//!
//! Expired reservations never count toward reserved inventory, so sweeping
//! only reclaims rows. The cron endpoint does the same work on demand.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use larder_db::ReservationRepository;

/// Spawn a task that deletes expired reservations every `every`.
///
/// The first sweep runs one full interval after startup.
#[must_use]
pub fn spawn(pool: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = every.as_secs(), "reservation sweeper started");

        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match ReservationRepository::new(&pool).cleanup_expired().await {
                Ok(report) if report.total() > 0 => tracing::info!(
                    session_rows = report.session_rows,
                    user_rows = report.user_rows,
                    "expired reservations swept"
                ),
                Ok(_) => tracing::debug!("no expired reservations"),
                Err(e) => tracing::error!(error = %e, "reservation sweep failed"),
            }
        }
    })
}
