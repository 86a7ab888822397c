//! IAPKit Demo CLI
//!
//! Command-line interface for exercising a billing session against the
//! in-memory store simulator.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "iapkit-demo")]
#[command(about = "IAPKit Demo CLI - Drive a billing session against a simulated store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Catalog JSON file (products, owned purchases, storefront)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Session configuration JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the final session status as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// Product kind filter accepted on the command line
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Inapp,
    Subs,
    All,
}

/// Scripted outcome of a purchase flow
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutcomeArg {
    Complete,
    Pending,
    Cancel,
    Fail,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch product metadata
    Products {
        /// Product identifiers
        #[arg(required = true)]
        ids: Vec<String>,

        /// Kind filter
        #[arg(short, long, value_enum, default_value = "inapp")]
        kind: KindArg,
    },

    /// Purchase a product and finish the transaction
    Buy {
        /// Product identifier
        id: String,

        /// Buy a subscription instead of a one-time product
        #[arg(long)]
        subscription: bool,

        /// How the simulated store answers
        #[arg(long, value_enum, default_value = "complete")]
        outcome: OutcomeArg,

        /// Consume instead of acknowledge
        #[arg(long)]
        consume: bool,
    },

    /// Restore owned purchases
    Restore,

    /// Show active subscriptions and the storefront
    Entitlements {
        /// Limit to these subscription identifiers
        ids: Vec<String>,
    },

    /// Run a scripted walkthrough of every session operation
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins when set
    let default_filter = if cli.verbose {
        "iapkit_demo_cli=debug,iapkit_lib=debug"
    } else {
        "iapkit_demo_cli=info,iapkit_lib=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ctx = commands::DemoContext::open(cli.catalog.as_deref(), cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Products { ids, kind } => commands::products::run(&ctx, &ids, kind).await,
        Commands::Buy {
            id,
            subscription,
            outcome,
            consume,
        } => commands::buy::run(&ctx, &id, subscription, outcome, consume).await,
        Commands::Restore => commands::restore::run(&ctx).await,
        Commands::Entitlements { ids } => commands::entitlements::run(&ctx, &ids).await,
        Commands::Demo => commands::demo::run(&ctx).await,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&ctx.session.status())?);
    } else if cli.verbose {
        ui::status(&ctx.session.status());
    }

    ctx.session.disconnect().await;
    outcome
}
