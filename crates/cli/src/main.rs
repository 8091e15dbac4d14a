//! Vitrine CLI - Database migrations and catalog sync tools.
//!
//! # Usage
//!
//! ```bash
//! # Run admin database migrations
//! vitrine-cli migrate
//!
//! # Sync the first 50 product groups
//! vitrine-cli sync sync-products --limit 50
//!
//! # Continue from a previous run, importing only unknown products
//! vitrine-cli sync sync-products --offset 50 --limit 50 --only-new
//!
//! # Inspect how one ERP product is classified
//! vitrine-cli sync debug-product --external-id 16070389001
//!
//! # Show or reset the sync policy
//! vitrine-cli policy show
//! vitrine-cli policy reset
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Run one sync action and print its JSON summary
//! - `policy` - Inspect or reset the sync policy row

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vitrine-cli")]
#[command(author, version, about = "Vitrine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run admin database migrations
    Migrate,
    /// Run a sync action against the ERP
    Sync {
        /// Action (`sync-products`, `first-import`, `sync-stock`,
        /// `relink-variants`, `cleanup-variations`, `debug-product`)
        action: String,

        /// Index of the first group (or product) to process
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum number of groups (or products) to process
        #[arg(long)]
        limit: Option<usize>,

        /// Skip groups whose parent is already linked
        #[arg(long)]
        only_new: bool,

        /// ERP product id (required by `debug-product`)
        #[arg(long)]
        external_id: Option<i64>,
    },
    /// Manage the sync policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Print the stored policy as JSON
    Show,
    /// Restore the default stock-only policy (keeps the first import marker)
    Reset,
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
        Commands::Migrate => commands::migrate::admin().await?,
        Commands::Sync {
            action,
            offset,
            limit,
            only_new,
            external_id,
        } => {
            let args = commands::sync::SyncArgs {
                action,
                offset,
                limit,
                only_new,
                external_id,
            };
            commands::sync::run(args).await?;
        }
        Commands::Policy { action } => match action {
            PolicyAction::Show => commands::policy::show().await?,
            PolicyAction::Reset => commands::policy::reset().await?,
        },
    }
    Ok(())
}
