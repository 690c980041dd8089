//! CLI entry point for the bike-share traffic explorer.
//!
//! Loads a station list and a trip log once, then answers time-of-day queries
//! the way the map's slider would: summaries, a marker export for one minute,
//! or a sweep across the whole day.

use anyhow::Result;
use bikeshare_traffic::{
    config::{LoadConfig, MalformedRowPolicy},
    loader::load_dataset,
    output::{append_markers, print_json, print_pretty},
    scales::{flow_ratio, quantize_flow},
    time_filter::{MINUTES_PER_DAY, TimeFilter, UNFILTERED},
};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_traffic")]
#[command(about = "Explore bike-share station traffic by time of day", long_about = None)]
struct Cli {
    /// Station list (JSON) as a file path or URL
    #[arg(long, env = "STATIONS_SOURCE")]
    stations: String,

    /// Trip log (CSV, optionally gzipped) as a file path or URL
    #[arg(long, env = "TRIPS_SOURCE")]
    trips: String,

    /// What to do with trip rows that fail to parse
    #[arg(long, value_enum, default_value_t = MalformedRowPolicy::Skip)]
    on_malformed: MalformedRowPolicy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log the busiest stations for a time filter
    Summary {
        /// Minute of day (0-1439), or -1 for the whole day
        #[arg(short, long, default_value_t = UNFILTERED, allow_negative_numbers = true)]
        minute: i32,

        /// Number of stations to list
        #[arg(short, long, default_value_t = 10)]
        top: usize,
    },
    /// Write station markers for one time filter
    Export {
        /// Minute of day (0-1439), or -1 for the whole day
        #[arg(short, long, default_value_t = UNFILTERED, allow_negative_numbers = true)]
        minute: i32,

        /// CSV file to write markers to (replaced if it exists)
        #[arg(short, long, default_value = "markers.csv")]
        output: String,

        /// Log markers as JSON instead of writing CSV
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Scrub through the day, writing markers for every step
    Sweep {
        /// Minutes between successive filters
        #[arg(short, long, default_value_t = 60, value_parser = clap::value_parser!(u16).range(1..1440))]
        step: u16,

        /// CSV file to write markers to (replaced if it exists)
        #[arg(short, long, default_value = "sweep.csv")]
        output: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/bikeshare_traffic.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_traffic.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::from_env("RUST_LOG").add_directive("info".parse::<Directive>()?),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse::<Directive>()?),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = LoadConfig::new(cli.stations, cli.trips).with_policy(cli.on_malformed);

    let dataset = match load_dataset(&config).await {
        Ok(dataset) => dataset,
        Err(e) => {
            error!(error = %e, "Failed to load data, nothing to show");
            return Err(e.into());
        }
    };
    let aggregator = dataset.aggregator();
    info!(domain_max = aggregator.domain_max(), "Radius domain fixed");

    match cli.command {
        Commands::Summary { minute, top } => {
            let filter = TimeFilter::from_slider(minute)?;
            let scale = aggregator.radius_scale(filter);
            let mut traffic = aggregator.station_traffic(filter);

            let departures: u64 = traffic.iter().map(|s| u64::from(s.departures)).sum();
            let arrivals: u64 = traffic.iter().map(|s| u64::from(s.arrivals)).sum();
            let idle = traffic.iter().filter(|s| s.total_traffic == 0).count();
            info!(%filter, departures, arrivals, idle, "Traffic summary");

            traffic.sort_by(|a, b| b.total_traffic.cmp(&a.total_traffic));
            for station in traffic.iter().take(top) {
                let flow = quantize_flow(flow_ratio(station.departures, station.total_traffic));
                info!(
                    station_id = %station.id(),
                    departures = station.departures,
                    arrivals = station.arrivals,
                    total = station.total_traffic,
                    radius = scale.radius(station.total_traffic),
                    flow = ?flow,
                    "Station"
                );
            }
        }
        Commands::Export {
            minute,
            output,
            json,
        } => {
            let filter = TimeFilter::from_slider(minute)?;
            let markers = aggregator.markers(filter);
            print_pretty(&markers);

            if json {
                print_json(&markers)?;
            } else {
                remove_if_exists(&output)?;
                append_markers(&output, &markers)?;
                info!(%filter, output = %output, rows = markers.len(), "Markers written");
            }
        }
        Commands::Sweep { step, output } => {
            remove_if_exists(&output)?;
            let mut rows = 0;
            for minute in (0..MINUTES_PER_DAY as u16).step_by(step as usize) {
                let markers = aggregator.markers(TimeFilter::Minute(minute));
                append_markers(&output, &markers)?;
                rows += markers.len();
            }
            info!(step, output = %output, rows, "Sweep written");
        }
    }

    Ok(())
}

fn remove_if_exists(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
