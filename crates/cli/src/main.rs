//! Larder CLI - database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema migrations
//! larder migrate
//!
//! # Delete expired cart reservations (same as the cron endpoint)
//! larder reservations sweep
//!
//! # Print on-hand, reserved and available units per product
//! larder inventory report
//! larder inventory report --low 5 --json
//! ```
//!
//! Every command reads `DATABASE_URL` (or `STOREFRONT_DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "larder")]
#[command(author, version, about = "Larder CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage cart reservations
    Reservations {
        #[command(subcommand)]
        action: ReservationAction,
    },
    /// Inspect inventory
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
}

#[derive(Subcommand)]
enum ReservationAction {
    /// Delete expired reservations from both cart tables
    Sweep,
}

#[derive(Subcommand)]
enum InventoryAction {
    /// Print inventory levels for every product
    Report {
        /// Only show products with at most this many units available
        #[arg(long)]
        low: Option<i64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder_cli=info,larder_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await,
        Commands::Reservations {
            action: ReservationAction::Sweep,
        } => commands::reservations::sweep(&pool).await,
        Commands::Inventory {
            action: InventoryAction::Report { low, json },
        } => commands::inventory::report(&pool, low, json).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_inventory_report_flags() {
        let cli = Cli::try_parse_from(["larder", "inventory", "report", "--low", "3", "--json"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Inventory {
                action: InventoryAction::Report {
                    low: Some(3),
                    json: true
                }
            }
        ));
    }

    #[test]
    fn test_parses_sweep() {
        let cli = Cli::try_parse_from(["larder", "reservations", "sweep"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Reservations {
                action: ReservationAction::Sweep
            }
        ));
    }
}
