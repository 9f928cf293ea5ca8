use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use harvest::{DailyRunOptions, HarvestError, Orchestrator};
use mav::MavApiClient;
use storage::gcs::{GcsConfig, GcsStore};
use storage::SharedStore;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFLICT: u8 = 2;

#[derive(Parser)]
#[command(name = "mav-harvest", about = "Daily MÁV offer harvest and delay analytics")]
struct Cli {
    /// CSV with `source,destination` station pairs
    #[arg(long, default_value = "routes.csv")]
    pairs: PathBuf,

    /// local directory the day directories are written under
    #[arg(long, default_value = "json_output")]
    output_dir: PathBuf,

    /// object-store key prefix for all published artifacts
    #[arg(long, default_value = "blog/mav/json_output")]
    base_prefix: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest the day's offers and publish them (the default)
    RunDaily {
        /// target date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// base delay between requests in seconds (randomized around this)
        #[arg(long, default_value_t = 2.0)]
        delay: f64,

        #[arg(long)]
        max_pairs: Option<usize>,

        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// skip all uploads to the object store
        #[arg(long)]
        no_upload: bool,

        /// publish a batch every N processed pairs (0 disables)
        #[arg(long, default_value_t = 100)]
        incremental_interval: usize,

        /// directory of route geometry files; when given, the analytics
        /// tables and delay maps are derived and published after the harvest
        #[arg(long)]
        routes_dir: Option<PathBuf>,

        /// how many days the analytics loader may fall back
        #[arg(long, default_value_t = 8)]
        max_days_back: u32,
    },
    /// Harvest only the first three pairs with a short delay, uploads off
    Test,
    /// Verify the pair list, the output directory and the object store
    HealthCheck,
    /// Show the status of the currently running harvest, if any
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let store: Option<SharedStore> = match GcsConfig::env() {
        Ok(config) => match GcsStore::new(config) {
            Ok(store) => Some(Arc::new(store)),
            Err(why) => {
                // a configured but unusable store is a startup failure
                eprintln!("could not build object store: {}", why);
                return ExitCode::from(EXIT_FAILURE);
            }
        },
        Err(why) => {
            log::warn!("object store not configured ({}), uploads disabled", why);
            None
        }
    };

    let client = match MavApiClient::new() {
        Ok(client) => client,
        Err(why) => {
            eprintln!("could not build offer api client: {}", why);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(client),
            store.clone(),
            cli.base_prefix.clone(),
            cli.pairs.clone(),
            cli.output_dir.clone(),
        )
        .with_call_log(cli.output_dir.join("mav_calls.jsonl")),
    );

    let command = cli.command.unwrap_or(Command::RunDaily {
        date: None,
        delay: 2.0,
        max_pairs: None,
        workers: 1,
        no_upload: false,
        incremental_interval: 100,
        routes_dir: None,
        max_days_back: 8,
    });

    match command {
        Command::RunDaily {
            date,
            delay,
            max_pairs,
            workers,
            no_upload,
            incremental_interval,
            routes_dir,
            max_days_back,
        } => {
            let target_date = date.unwrap_or_else(|| Local::now().date_naive());
            let mut options = DailyRunOptions::new(target_date);
            options.base_delay = delay;
            options.max_pairs = max_pairs;
            options.workers = workers;
            options.upload = !no_upload;
            options.incremental_interval = incremental_interval;

            let report = match orchestrator.run_daily(options).await {
                Ok(report) => report,
                Err(HarvestError::Conflict) => {
                    eprintln!("a run is already active");
                    return ExitCode::from(EXIT_CONFLICT);
                }
                Err(why) => {
                    eprintln!("run failed: {}", why);
                    return ExitCode::from(EXIT_FAILURE);
                }
            };

            println!(
                "harvested {}/{} pairs ({} failed), uploaded {} files",
                report.stats.successful,
                report.stats.processed,
                report.stats.failed,
                report.upload_stats.incremental_files_uploaded
                    + report.upload_stats.final_files_uploaded,
            );

            if let (Some(routes_dir), Some(store)) = (routes_dir, store) {
                if let Err(why) = run_analytics(
                    store.as_ref(),
                    &cli.base_prefix,
                    target_date,
                    &routes_dir,
                    max_days_back,
                )
                .await
                {
                    eprintln!("analytics stage failed: {}", why);
                    return ExitCode::from(EXIT_FAILURE);
                }
            }

            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
        Command::Test => {
            let options = DailyRunOptions::test_mode(Local::now().date_naive());
            match orchestrator.run_daily(options).await {
                Ok(report) => {
                    println!(
                        "test run: {}/{} pairs successful",
                        report.stats.successful, report.stats.processed,
                    );
                    ExitCode::SUCCESS
                }
                Err(HarvestError::Conflict) => {
                    eprintln!("a run is already active");
                    ExitCode::from(EXIT_CONFLICT)
                }
                Err(why) => {
                    eprintln!("test run failed: {}", why);
                    ExitCode::from(EXIT_FAILURE)
                }
            }
        }
        Command::HealthCheck => match orchestrator.health_check().await {
            Ok(()) => {
                println!("health check passed");
                ExitCode::SUCCESS
            }
            Err(why) => {
                eprintln!("health check failed: {}", why);
                ExitCode::from(EXIT_FAILURE)
            }
        },
        Command::Status => {
            println!("{}", status_json(&orchestrator).await);
            ExitCode::SUCCESS
        }
    }
}

async fn run_analytics(
    store: &dyn storage::ObjectStore,
    base_prefix: &str,
    target_date: NaiveDate,
    routes_dir: &std::path::Path,
    max_days_back: u32,
) -> Result<(), analytics::AnalyticsError> {
    let graph = analytics::routes::load_route_graph(routes_dir).await?;
    let report =
        analytics::publish_daily_analytics(store, base_prefix, target_date, &graph, max_days_back)
            .await?;
    println!(
        "analytics for {}: {} observations, {} segments, {} artifacts",
        report.effective_date,
        report.observations,
        report.segments,
        report.published.len(),
    );
    Ok(())
}

/// Asks a local web trigger for its status first; a plain CLI process has no
/// long-lived run of its own to report.
async fn status_json(orchestrator: &Orchestrator) -> String {
    let port = env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(8080);
    let url = format!("http://127.0.0.1:{}/status", port);
    if let Ok(response) = reqwest::get(&url).await {
        if let Ok(body) = response.text().await {
            return body;
        }
    }
    serde_json::to_string_pretty(&orchestrator.status()).unwrap_or_else(|_| "{}".to_owned())
}
