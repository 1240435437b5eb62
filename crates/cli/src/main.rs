//! Campus Ambassador portal CLI - migrations and zone repair tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cap-cli migrate
//!
//! # Re-link every ambassador to the head of their zone
//! cap-cli backfill
//!
//! # Re-link one zone
//! cap-cli assign --zone NORTH
//!
//! # Create the first admin
//! cap-cli admin create -e admin@example.org -p 'long passphrase' -n "Portal Admin"
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cap-cli")]
#[command(author, version, about = "Campus Ambassador portal CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Reconcile every zone
    Backfill,
    /// Reconcile a single zone
    Assign {
        /// Zone name (normalized before use)
        #[arg(short, long)]
        zone: String,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Admin display name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Backfill => {
            commands::assign::backfill().await?;
        }
        Commands::Assign { zone } => {
            commands::assign::zone(&zone).await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                password,
                name,
            } => {
                commands::admin::create(&email, &password, name).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assign_and_admin() {
        let cli = Cli::try_parse_from(["cap-cli", "assign", "--zone", "north zone"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Assign { zone }) if zone == "north zone"
        ));

        let cli = Cli::try_parse_from([
            "cap-cli", "admin", "create", "-e", "a@b.io", "-p", "longpassword",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin { action: AdminAction::Create { name: None, .. } })
        ));
    }
}
