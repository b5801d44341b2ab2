use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use mandi_tracker::board::PriceBoard;
use mandi_tracker::config::{AppConfig, Secrets};
use mandi_tracker::data::{build_source, PriceQuery};
use mandi_tracker::monitoring::{dashboard, logger};
use mandi_tracker::prices::{build_view, CompareOptions, Comparison, MarketView, PriceFilter};

#[derive(Parser)]
#[command(name = "mandi-tracker", version, about = "Track day-over-day mandi price movement")]
struct Cli {
    /// Config file (defaults to config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List fetched price records
    Records(FilterArgs),
    /// Show the biggest risers and fallers between the two latest dates
    Movers {
        #[command(flatten)]
        filter: FilterArgs,
        /// How many risers/fallers to show
        #[arg(long)]
        top: Option<usize>,
    },
    /// Serve the dashboard API and refresh prices periodically
    Serve(FilterArgs),
}

#[derive(Args, Clone)]
struct FilterArgs {
    #[arg(long, default_value = "")]
    state: String,
    #[arg(long, default_value = "")]
    district: String,
    #[arg(long, default_value = "")]
    commodity: String,
    /// Also ask the upstream API to narrow by state and commodity
    #[arg(long)]
    upstream: bool,
}

impl FilterArgs {
    fn filter(&self) -> PriceFilter {
        PriceFilter {
            state: self.state.clone(),
            district: self.district.clone(),
            commodity: self.commodity.clone(),
        }
    }

    fn query(&self) -> PriceQuery {
        if !self.upstream {
            return PriceQuery::default();
        }
        PriceQuery {
            state: Some(self.state.clone()).filter(|s| !s.is_empty()),
            commodity: Some(self.commodity.clone()).filter(|s| !s.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load(cli.config.as_deref())?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        source = ?config.source.kind,
        top_n = config.comparison.top_n,
        "Mandi tracker starting"
    );

    match cli.command {
        Command::Records(args) => {
            let view = fetch_view(&config, &secrets, &args, config.comparison.options()).await?;
            print_records(&view);
            Ok(())
        }
        Command::Movers { filter, top } => {
            let mut options = config.comparison.options();
            if let Some(top) = top.filter(|n| *n > 0) {
                options.top_n = top;
            }
            let view = fetch_view(&config, &secrets, &filter, options).await?;
            print_movers(&view);
            Ok(())
        }
        Command::Serve(args) => serve(config, secrets, args).await,
    }
}

async fn fetch_view(
    config: &AppConfig,
    secrets: &Secrets,
    args: &FilterArgs,
    options: CompareOptions,
) -> Result<MarketView> {
    let source = build_source(config, secrets).context("Failed to set up price source")?;
    let records = source
        .fetch(&args.query())
        .await
        .with_context(|| format!("Failed to fetch prices from {}", source.name()))?;

    Ok(build_view(&records, &args.filter(), &options))
}

fn print_records(view: &MarketView) {
    println!(
        "{:<24} {:<16} {:<16} {:<20} {:>10}  {}",
        "Commodity", "State", "District", "Market", "Price", "Date"
    );
    for r in &view.records {
        println!(
            "{:<24} {:<16} {:<16} {:<20} {:>10}  {}",
            r.commodity, r.state, r.district, r.market, r.price, r.observation_date
        );
    }
    println!("\n{} record(s)", view.records.len());
}

fn print_movers(view: &MarketView) {
    match &view.comparison {
        Comparison::Ready(report) => println!("\n{report}"),
        Comparison::InsufficientData(e) => {
            tracing::warn!(records = view.records.len(), "Comparison unavailable");
            println!("Not enough data to compare ({e}). {} record(s) matched.", view.records.len());
        }
    }
}

/// Run the dashboard until interrupted.
async fn serve(config: AppConfig, secrets: Secrets, args: FilterArgs) -> Result<()> {
    let source = build_source(&config, &secrets).context("Failed to set up price source")?;
    let board = PriceBoard::new(Arc::clone(&source), config.comparison.options());
    board.set_query(args.query()).await;
    board.apply_filter(args.filter()).await;

    let dashboard_handle =
        dashboard::spawn_dashboard(board.clone(), &config.dashboard.bind, config.dashboard.port);

    let interval = config.dashboard.refresh_interval_seconds;
    let refresh_board = board.clone();
    let refresh_handle = tokio::spawn(async move {
        loop {
            refresh_board.refresh().await;
            if interval == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");

    refresh_handle.abort();
    dashboard_handle.abort();

    Ok(())
}
