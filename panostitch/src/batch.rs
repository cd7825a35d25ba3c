//! Batch orchestrator - drives the pipeline over a large panorama list.
//!
//! Records are processed in fixed-size batches; one batch fully resolves
//! (every panorama reaches success, skip, or terminal failure) before the
//! next starts, bounding peak concurrency and scratch-disk usage. Within a
//! batch all panoramas run concurrently, sharing the global connection
//! limiter.
//!
//! Per panorama the orchestrator walks
//! `Pending -> Located -> Fetching -> Fetched -> Stitching -> Done | Failed`.
//! A panorama whose artifact already exists is skipped outright with zero
//! network requests. A terminal failure is logged with id, location, and
//! failing stage and does not abort the batch; only disk-level I/O errors
//! abort the whole run.

use crate::config::PipelineConfig;
use crate::error::PanoError;
use crate::fetcher::{backoff, fetch_tiles, FetchOptions};
use crate::limiter::HttpConcurrencyLimiter;
use crate::locator::{locate, TileSet};
use crate::provider::PanoProvider;
use crate::record::{dedup_records, PanoramaRecord};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Panoramas stitched during this run.
    pub succeeded: usize,
    /// Panoramas whose artifact already existed.
    pub skipped: usize,
    /// Panoramas that reached terminal failure.
    pub failed: usize,
}

impl RunStats {
    /// Total panoramas accounted for.
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Terminal state of one panorama within a run.
enum PanoOutcome {
    Done,
    Skipped,
    Failed,
}

/// Drives Locator, Fetcher, and Stitcher over panorama batches.
///
/// # Example
///
/// ```ignore
/// use panostitch::batch::BatchOrchestrator;
/// use panostitch::config::PipelineConfig;
/// use panostitch::provider::{AsyncReqwestClient, StreetViewProvider};
///
/// let provider = StreetViewProvider::new(AsyncReqwestClient::new()?);
/// let orchestrator = BatchOrchestrator::new(provider, PipelineConfig::default());
/// let stats = orchestrator.run(&records).await?;
/// ```
pub struct BatchOrchestrator<P> {
    provider: Arc<P>,
    limiter: Arc<HttpConcurrencyLimiter>,
    config: PipelineConfig,
}

impl<P: PanoProvider + 'static> BatchOrchestrator<P> {
    /// Creates an orchestrator; the connection limiter is sized from the
    /// configuration and shared by every panorama in the run.
    pub fn new(provider: P, config: PipelineConfig) -> Self {
        let limiter = Arc::new(HttpConcurrencyLimiter::new(config.connection_limit()));
        Self {
            provider: Arc::new(provider),
            limiter,
            config,
        }
    }

    /// Processes every record, batch by batch.
    ///
    /// Duplicate ids are processed at most once. Both the scratch tile
    /// directory and the panorama directory are created on demand.
    ///
    /// # Errors
    ///
    /// Returns an error only for run-fatal conditions (directory creation
    /// or artifact write failures). Per-panorama failures are counted in
    /// the returned [`RunStats`] instead.
    pub async fn run(&self, records: &[PanoramaRecord]) -> Result<RunStats, PanoError> {
        let records = dedup_records(records.to_vec());
        info!(
            panoramas = records.len(),
            batch_size = self.config.batch_size(),
            connection_limit = self.config.connection_limit(),
            "starting run"
        );

        tokio::fs::create_dir_all(self.config.tile_dir()).await?;
        tokio::fs::create_dir_all(self.config.pano_dir()).await?;

        let mut stats = RunStats::default();

        for (index, batch) in records.chunks(self.config.batch_size().max(1)).enumerate() {
            debug!(batch = index + 1, size = batch.len(), "starting batch");

            let mut jobs = JoinSet::new();
            for record in batch {
                let record = record.clone();
                let provider = Arc::clone(&self.provider);
                let limiter = Arc::clone(&self.limiter);
                let config = self.config.clone();

                jobs.spawn(async move { process_panorama(record, provider, limiter, config).await });
            }

            // Each job returns its own outcome; aggregation happens here
            // rather than through any shared accumulator.
            while let Some(result) = jobs.join_next().await {
                match result {
                    Ok(Ok(PanoOutcome::Done)) => stats.succeeded += 1,
                    Ok(Ok(PanoOutcome::Skipped)) => stats.skipped += 1,
                    Ok(Ok(PanoOutcome::Failed)) => stats.failed += 1,
                    Ok(Err(fatal)) => {
                        jobs.abort_all();
                        return Err(fatal);
                    }
                    Err(join_err) => {
                        warn!(error = %join_err, "panorama task panicked");
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            failed = stats.failed,
            "run complete"
        );
        Ok(stats)
    }
}

/// Runs one panorama to a terminal state.
///
/// Returns `Err` only for run-fatal I/O errors; per-panorama failures are
/// logged with their stage and reported as `PanoOutcome::Failed`.
async fn process_panorama<P: PanoProvider + 'static>(
    record: PanoramaRecord,
    provider: Arc<P>,
    limiter: Arc<HttpConcurrencyLimiter>,
    config: PipelineConfig,
) -> Result<PanoOutcome, PanoError> {
    // Idempotence marker: the artifact's existence means this panorama is
    // done, no re-fetch and no re-stitch. Only a regular file counts; a
    // directory squatting on the name is not a finished panorama.
    let artifact = config.pano_dir().join(record.artifact_filename());
    let done = tokio::fs::metadata(&artifact)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if done {
        debug!(pano_id = %record.id, "artifact exists, skipping");
        return Ok(PanoOutcome::Skipped);
    }

    let cancel = CancellationToken::new();
    let deadline = config.panorama_deadline();

    let outcome = tokio::time::timeout(
        deadline,
        run_pipeline(&record, provider, limiter, &config, cancel.clone()),
    )
    .await;

    let result = match outcome {
        Ok(result) => result,
        Err(_) => {
            // Abandon in-flight fetches for this panorama only
            cancel.cancel();
            Err(PanoError::Deadline(deadline))
        }
    };

    match result {
        Ok(()) => {
            info!(pano_id = %record.id, lat = record.lat, lon = record.lon, "panorama done");
            Ok(PanoOutcome::Done)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(
                pano_id = %record.id,
                lat = record.lat,
                lon = record.lon,
                stage = failing_stage(&err),
                error = %err,
                "panorama failed"
            );
            Ok(PanoOutcome::Failed)
        }
    }
}

/// Locate -> Fetch -> Stitch for one panorama.
async fn run_pipeline<P: PanoProvider + 'static>(
    record: &PanoramaRecord,
    provider: Arc<P>,
    limiter: Arc<HttpConcurrencyLimiter>,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<(), PanoError> {
    let tile_set = locate_with_retries(record, provider.as_ref(), config).await?;
    debug!(pano_id = %record.id, tiles = tile_set.tiles.len(), state = "located", "tile grid derived");

    debug!(pano_id = %record.id, state = "fetching", "downloading tiles");
    fetch_tiles(
        &tile_set,
        config.tile_dir(),
        Arc::clone(&provider),
        limiter,
        FetchOptions {
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries(),
        },
        cancel,
    )
    .await?;
    debug!(pano_id = %record.id, state = "fetched", "all tiles on disk");

    // Stitching is CPU-bound; keep it off the async workers.
    debug!(pano_id = %record.id, state = "stitching", "composing panorama");
    let tile_dir = config.tile_dir().clone();
    let pano_dir = config.pano_dir().clone();
    let stitch_record = record.clone();
    tokio::task::spawn_blocking(move || {
        crate::stitcher::stitch(&tile_set, &tile_dir, &pano_dir, &stitch_record)
    })
    .await
    .map_err(|e| PanoError::Io(std::io::Error::other(format!("stitch task failed: {}", e))))??;

    Ok(())
}

/// Metadata lookup with the same bounded retry/backoff policy as tiles.
async fn locate_with_retries<P: PanoProvider>(
    record: &PanoramaRecord,
    provider: &P,
    config: &PipelineConfig,
) -> Result<TileSet, PanoError> {
    let max_attempts = config.max_retries().max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match locate(provider, &record.id).await {
            Ok(set) => return Ok(set),
            Err(e) if attempt >= max_attempts => {
                return Err(PanoError::Retrieval {
                    pano_id: record.id.clone(),
                    source: e,
                });
            }
            Err(e) => {
                debug!(pano_id = %record.id, attempt, error = %e, "metadata lookup failed");
                tokio::time::sleep(backoff(attempt)).await;
            }
        }
    }
}

/// Names the stage a per-panorama error belongs to, for logging.
fn failing_stage(err: &PanoError) -> &'static str {
    match err {
        PanoError::Retrieval { .. } => "locate",
        PanoError::TileUnavailable { .. } | PanoError::Deadline(_) => "fetch",
        PanoError::Stitch(_) => "stitch",
        PanoError::Io(_) => "io",
    }
}
