//! `QuickCart` CLI - database migrations and catalogue seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! qc-cli migrate
//!
//! # Load products from a JSON array
//! qc-cli seed products fixtures/products.json
//!
//! # Load shipping addresses from a JSON array
//! qc-cli seed address fixtures/addresses.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qc-cli")]
#[command(author, version, about = "QuickCart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Insert fixture records into the storefront database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Seed products from a JSON array
    Products {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Seed shipping addresses from a JSON array
    Address {
        /// Path to the JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => {
            let report = match target {
                SeedTarget::Products { file } => commands::seed::products(&file).await?,
                SeedTarget::Address { file } => commands::seed::addresses(&file).await?,
            };
            tracing::info!(
                inserted = report.inserted,
                skipped = report.skipped,
                "Seeding complete"
            );
        }
    }
    Ok(())
}
