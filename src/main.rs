//! CLI entry point for the bus trip GeoJSON service.
//!
//! Provides subcommands for serving trips over HTTP, exporting one route's
//! or vehicle's trips to a file, and listing the indexed keys.

mod server;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use bus_trip_geo::provider::TripDataProvider;
use bus_trip_geo::render::render_feature_collection;
use bus_trip_geo::sanitize::DEFAULT_MAX_ROWS;

#[derive(Parser)]
#[command(name = "bus_trip_geo")]
#[command(
    about = "Reconstructs bus trips from a vehicle-position CSV feed and serves them as GeoJSON",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve trip queries over HTTP
    Serve {
        /// Path to the raw vehicle-position CSV
        #[arg(value_name = "DATA")]
        data: String,

        /// Port to bind on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Origin allowed by the CORS policy
        #[arg(long, default_value = "http://localhost:5173")]
        allowed_origin: String,

        /// Maximum raw rows scanned during cleaning
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
    },
    /// Render one route's or vehicle's trips as GeoJSON
    Export {
        /// Path to the raw vehicle-position CSV
        #[arg(value_name = "DATA")]
        data: String,

        /// Route name to export
        #[arg(long, conflicts_with = "vehicle")]
        route: Option<String>,

        /// Vehicle id to export
        #[arg(long)]
        vehicle: Option<String>,

        /// File to write instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Maximum raw rows scanned during cleaning
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
    },
    /// List indexed route names or vehicle ids
    List {
        /// Path to the raw vehicle-position CSV
        #[arg(value_name = "DATA")]
        data: String,

        /// Which key set to print
        #[arg(value_enum)]
        what: ListTarget,

        /// Maximum raw rows scanned during cleaning
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListTarget {
    Routes,
    Vehicles,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            data,
            port,
            allowed_origin,
            max_rows,
        } => {
            let provider = Arc::new(TripDataProvider::initialise_with(data, max_rows)?);
            actix_web::rt::System::new().block_on(server::run(
                provider,
                server::ServerConfig {
                    port,
                    allowed_origin,
                },
            ))?;
        }
        Commands::Export {
            data,
            route,
            vehicle,
            output,
            max_rows,
        } => {
            let provider = TripDataProvider::initialise_with(data, max_rows)?;
            let trips = match (&route, &vehicle) {
                (Some(name), None) => provider.trips_for_route(name)?,
                (None, Some(id)) => provider.trips_for_vehicle(id)?,
                _ => bail!("pass exactly one of --route or --vehicle"),
            };

            let document = render_feature_collection(trips)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &document)?;
                    info!(path = %path, trips = trips.len(), "wrote GeoJSON");
                }
                None => println!("{document}"),
            }
        }
        Commands::List {
            data,
            what,
            max_rows,
        } => {
            let provider = TripDataProvider::initialise_with(data, max_rows)?;
            let keys = match what {
                ListTarget::Routes => provider.route_names(),
                ListTarget::Vehicles => provider.vehicle_refs(),
            };
            for key in keys {
                println!("{key}");
            }
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_trip_geo.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_trip_geo.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}
