//! GreenCart CLI - database migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations (including the session table)
//! greencart-cli migrate
//!
//! # Load products from a YAML file
//! greencart-cli seed products data/products.yaml
//!
//! # Print catalog and order counts
//! greencart-cli stats
//! ```
//!
//! Every command reads `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "greencart-cli")]
#[command(author, version, about = "GreenCart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Show catalog and order statistics
    Stats,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,

        /// Insert even if a product with the same name exists
        #[arg(long)]
        allow_duplicates: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products {
                file,
                allow_duplicates,
            } => commands::seed::products(&file, allow_duplicates).await?,
        },
        Commands::Stats => commands::stats::run().await?,
    }
    Ok(())
}
