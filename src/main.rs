//! CLI entry point for the Bizkaibus arrivals client.
//!
//! Provides subcommands for testing connectivity to the upstream service,
//! fetching the next arrivals once, and polling them on an interval.

use anyhow::Result;
use bizkaibus::fetch::BasicClient;
use bizkaibus::output::{headline, print_json, print_pretty, summary};
use bizkaibus::{BizkaibusData, Clock, Outcome, Settings, StopRoute, TimeMode};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LOG_PATH: &str = "logs/bizkaibus.log";

#[derive(Parser)]
#[command(name = "bizkaibus")]
#[command(about = "Next bus arrivals from the Bizkaibus service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Stop code
    #[arg(short, long, default_value = "0252")]
    stop: String,

    /// Route (line) code
    #[arg(short, long, default_value = "A3941")]
    route: String,
}

#[derive(Args)]
struct Format {
    /// Report wall-clock arrival times instead of minutes
    #[arg(long, default_value_t = false)]
    absolute: bool,

    /// Compute wall-clock times in UTC instead of local time
    #[arg(long, default_value_t = false)]
    utc: bool,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service answers for a stop/route pair
    Test {
        #[command(flatten)]
        target: Target,
    },
    /// Fetch and print the next arrivals once
    Next {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        format: Format,
    },
    /// Fetch the next arrivals repeatedly
    Watch {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        format: Format,

        /// Seconds between fetches
        #[arg(short, long, default_value_t = 60)]
        interval: u64,

        /// Number of fetches (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Test { target } => {
            let data = build(&target)?;
            println!("{}", data.test_connection().await);
        }
        Commands::Next { target, format } => {
            let data = build(&target)?;
            fetch_and_print(&data, &format).await?;
        }
        Commands::Watch {
            target,
            format,
            interval,
            samples,
        } => {
            let data = build(&target)?;
            watch(&data, &format, interval, samples).await?;
        }
    }

    Ok(())
}

/// Installs a colored stderr layer (`RUST_LOG`, default info) and a JSON
/// layer on a daily-rolling file at `LOG_FILE_PATH` (`RUST_LOG_JSON`,
/// default debug). The returned guard flushes the file writer on drop.
fn init_tracing() -> Result<WorkerGuard> {
    let log_path = PathBuf::from(
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_PATH.to_string()),
    );
    let log_dir = log_path.parent().unwrap_or(Path::new("logs"));
    let log_name = log_path
        .file_name()
        .unwrap_or(OsStr::new("bizkaibus.log"));

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, log_name));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Builds the facade for `target`, with endpoint and timeout taken from the
/// environment.
fn build(target: &Target) -> Result<BizkaibusData> {
    let client = BasicClient::with_connect_timeout(CONNECT_TIMEOUT)?;
    let data = BizkaibusData::with_client(
        client,
        StopRoute::new(&target.stop, &target.route),
        Settings::from_env(),
    );

    info!(
        endpoint = %data.settings().endpoint,
        timeout_secs = data.settings().timeout.as_secs(),
        stop = %data.stop_route().stop(),
        route = %data.stop_route().route(),
        "Using Bizkaibus endpoint"
    );
    Ok(data)
}

async fn fetch_and_print(data: &BizkaibusData, format: &Format) -> Result<()> {
    let outcome = data
        .fetch_next_arrivals(
            TimeMode::from_relative_flag(!format.absolute),
            Clock::from_utc_flag(format.utc),
        )
        .await;

    if let Outcome::Unavailable(e) = &outcome {
        warn!(kind = e.kind(), error = %e, "Arrivals unavailable");
    }

    let results = data.results();
    info!(next = %headline(&results), "Next arrival");
    print_pretty(&results);
    if format.json {
        print_json(&results)?;
    } else {
        println!("{}", summary(&results));
    }

    Ok(())
}

/// Fetches every `interval` seconds until `samples` rounds are done.
#[tracing::instrument(skip(data, format))]
async fn watch(data: &BizkaibusData, format: &Format, interval: u64, samples: usize) -> Result<()> {
    if samples == 0 {
        info!(interval, "Polling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(samples, interval, "Starting polling");
    }

    let mut count = 0;
    loop {
        // Check if we've reached the sample limit (0 = infinite)
        if samples > 0 && count >= samples {
            break;
        }
        count += 1;

        fetch_and_print(data, format).await?;

        if samples == 0 || count < samples {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    info!(count, "Finished polling");
    Ok(())
}
