//! Panostitch CLI - downloads and stitches street-level panoramas.
//!
//! Reads a JSON list of panorama records and drives the batch pipeline
//! over them. Already-stitched panoramas are skipped, so the command can
//! be re-run on the same list to resume an interrupted session.

mod error;

use clap::Parser;
use error::CliError;
use panostitch::batch::BatchOrchestrator;
use panostitch::config::PipelineConfig;
use panostitch::logging::{default_log_dir, default_log_file, init_logging};
use panostitch::provider::{AsyncReqwestClient, StreetViewProvider};
use panostitch::record::load_records;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "panostitch")]
#[command(version = panostitch::VERSION)]
#[command(about = "Download and stitch street-level panorama imagery", long_about = None)]
struct Args {
    /// JSON file with panorama records (array of {panoid, lat, lon})
    input: String,

    /// Scratch directory for in-flight tiles
    #[arg(long, default_value = "tiles")]
    tile_dir: String,

    /// Output directory for stitched panoramas
    #[arg(long, default_value = "panoramas")]
    pano_dir: String,

    /// Panoramas processed per batch
    #[arg(long, default_value = "100")]
    batch_size: usize,

    /// Global ceiling on concurrent HTTP connections
    #[arg(long, default_value = "100")]
    connections: usize,

    /// Maximum attempts per tile before it is reported unavailable
    #[arg(long, default_value = "5")]
    max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Per-panorama deadline in seconds
    #[arg(long, default_value = "300")]
    deadline: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _logging_guard = match init_logging(default_log_dir(), default_log_file()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let records = match load_records(&args.input) {
        Ok(records) => records,
        Err(e) => CliError::Records {
            path: args.input.clone(),
            error: e,
        }
        .exit(),
    };
    info!(records = records.len(), input = %args.input, "loaded panorama records");

    let client = match AsyncReqwestClient::new() {
        Ok(client) => client,
        Err(e) => CliError::HttpClient(e.to_string()).exit(),
    };
    let provider = StreetViewProvider::new(client);

    let config = PipelineConfig::new()
        .with_connection_limit(args.connections)
        .with_max_retries(args.max_retries)
        .with_request_timeout(Duration::from_secs(args.request_timeout))
        .with_panorama_deadline(Duration::from_secs(args.deadline))
        .with_batch_size(args.batch_size)
        .with_tile_dir(&args.tile_dir)
        .with_pano_dir(&args.pano_dir);

    let orchestrator = BatchOrchestrator::new(provider, config);
    let stats = match orchestrator.run(&records).await {
        Ok(stats) => stats,
        Err(e) => CliError::Run(e).exit(),
    };

    println!(
        "Done: {} stitched, {} skipped, {} failed ({} total)",
        stats.succeeded,
        stats.skipped,
        stats.failed,
        stats.total()
    );

    if stats.failed > 0 {
        println!("Re-run the same command to retry failed panoramas.");
        std::process::exit(2);
    }
}
