//! Reservation maintenance.

use sqlx::PgPool;

use larder_db::ReservationRepository;
use larder_db::models::CleanupReport;

use super::CommandError;

fn summary(report: &CleanupReport) -> String {
    format!(
        "Removed {} expired reservations ({} guest, {} customer)",
        report.total(),
        report.session_rows,
        report.user_rows
    )
}

/// Delete expired reservations. Expired rows already stopped counting
/// against availability, so this only reclaims space.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the sweep fails.
pub async fn sweep(pool: &PgPool) -> Result<(), CommandError> {
    let report = ReservationRepository::new(pool).cleanup_expired().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", summary(&report));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let report = CleanupReport {
            session_rows: 3,
            user_rows: 1,
        };
        assert_eq!(
            summary(&report),
            "Removed 4 expired reservations (3 guest, 1 customer)"
        );
    }
}
