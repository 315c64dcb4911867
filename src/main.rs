mod api;
mod cli;
mod config;
mod db;
mod error;
mod ledger;
mod models;
mod orchestrator;
mod services;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "riskrouter")]
#[command(about = "Real-time wager risk routing for a shadow sports book")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the operator API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Evaluate a single-leg ticket without committing it
    Evaluate {
        #[arg(long)]
        ticket_id: String,
        #[arg(long)]
        stake: f64,
        #[arg(long)]
        match_id: String,
        #[arg(long)]
        selection: String,
        #[arg(long)]
        odds: f64,
    },
    /// Evaluate a single-leg ticket and commit it if accepted
    Commit {
        #[arg(long)]
        ticket_id: String,
        #[arg(long)]
        stake: f64,
        #[arg(long)]
        match_id: String,
        #[arg(long)]
        selection: String,
        #[arg(long)]
        odds: f64,
    },
    /// Show current per-match exposures
    Ledger,
    /// Show the most recent order book entries
    OrderBook {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Scan the configured bookmakers for 2-way arbitrage
    Arbitrage {
        #[arg(short, long, default_value = "10000")]
        capital: f64,
    },
    /// Export the order book audit trail to CSV
    ExportOrderBook {
        #[arg(short, long, default_value = "data/exports/order_book.csv")]
        path: String,
        #[arg(short, long, default_value = "100")]
        limit: i64,
    },
    /// Initialize the database
    InitDb,
    /// Wipe the ledger and order book
    Wipe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("starting riskrouter API server on port {}", port);
            api::serve(port).await?;
        }
        Some(Commands::Evaluate {
            ticket_id,
            stake,
            match_id,
            selection,
            odds,
        }) => {
            cli::evaluate_ticket(&ticket_id, stake, &match_id, &selection, odds).await?;
        }
        Some(Commands::Commit {
            ticket_id,
            stake,
            match_id,
            selection,
            odds,
        }) => {
            cli::commit_ticket(&ticket_id, stake, &match_id, &selection, odds).await?;
        }
        Some(Commands::Ledger) => {
            cli::show_ledger().await?;
        }
        Some(Commands::OrderBook { limit }) => {
            cli::show_order_book(limit).await?;
        }
        Some(Commands::Arbitrage { capital }) => {
            cli::scan_arbitrage(capital).await?;
        }
        Some(Commands::ExportOrderBook { path, limit }) => {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.ok();
                }
            }
            cli::export_order_book(&path, limit).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("initializing database...");
            db::init_database().await?;
        }
        Some(Commands::Wipe) => {
            cli::wipe().await?;
        }
        None => {
            tracing::info!("starting riskrouter API server on port 3000");
            api::serve(3000).await?;
        }
    }

    Ok(())
}
