//! Tile fetcher - concurrent, retrying tile downloads.
//!
//! Downloads every tile in a [`TileSet`] concurrently, bounded by the
//! global [`HttpConcurrencyLimiter`] shared across the whole batch run.
//! Each tile is retried with exponential backoff up to a maximum attempt
//! count; after exhaustion the panorama fails with `TileUnavailable`.
//!
//! # Atomicity
//!
//! A tile write goes to `<name>.part` first and is renamed into place, so
//! a tile file under its final name is always complete. A pre-existing
//! complete tile is reused without re-downloading, which makes interrupted
//! runs resumable without a startup purge.

use crate::error::PanoError;
use crate::limiter::HttpConcurrencyLimiter;
use crate::locator::{TileDescriptor, TileSet};
use crate::provider::PanoProvider;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-tile fetch tunables, extracted from the pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Timeout for one HTTP request.
    pub request_timeout: Duration,
    /// Maximum attempts per tile.
    pub max_retries: u32,
}

/// Downloads all tiles of a panorama into the scratch directory.
///
/// Tile tasks run concurrently; each acquires a permit from the shared
/// limiter before issuing its request, so concurrency is bounded across
/// every panorama in flight, not just this one.
///
/// On the first terminal tile failure the remaining downloads for this
/// panorama are aborted. Already-renamed tile files are left in place;
/// they are reused if the panorama is retried.
///
/// # Errors
///
/// * [`PanoError::TileUnavailable`] - a tile exhausted its retry budget
/// * [`PanoError::Io`] - tile file could not be written (fatal)
pub async fn fetch_tiles<P>(
    tile_set: &TileSet,
    tile_dir: &Path,
    provider: Arc<P>,
    limiter: Arc<HttpConcurrencyLimiter>,
    options: FetchOptions,
    cancel: CancellationToken,
) -> Result<(), PanoError>
where
    P: PanoProvider + 'static,
{
    let mut downloads = JoinSet::new();

    for tile in &tile_set.tiles {
        let tile = tile.clone();
        let path = tile_dir.join(&tile.filename);
        let provider = Arc::clone(&provider);
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();

        downloads.spawn(async move {
            fetch_one_tile(tile, path, provider, limiter, options, cancel).await
        });
    }

    let mut first_error: Option<PanoError> = None;

    while let Some(result) = downloads.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                // Fatal disk errors take precedence over tile exhaustion
                let replace = match (&first_error, &err) {
                    (None, _) => true,
                    (Some(prev), PanoError::Io(_)) => !prev.is_fatal(),
                    _ => false,
                };
                if replace {
                    downloads.abort_all();
                    first_error = Some(err);
                }
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => {
                warn!(pano_id = tile_set.pano_id(), error = %join_err, "tile task panicked");
            }
        }
    }

    match first_error {
        None => {
            debug!(
                pano_id = tile_set.pano_id(),
                tiles = tile_set.tiles.len(),
                "all tiles fetched"
            );
            Ok(())
        }
        Some(err) => Err(err),
    }
}

/// Downloads a single tile with bounded retries and atomic write.
async fn fetch_one_tile<P>(
    tile: TileDescriptor,
    path: PathBuf,
    provider: Arc<P>,
    limiter: Arc<HttpConcurrencyLimiter>,
    options: FetchOptions,
    cancel: CancellationToken,
) -> Result<(), PanoError>
where
    P: PanoProvider,
{
    // A file under its final name is complete (writes are rename-atomic),
    // so an earlier interrupted run's work can be reused as-is. Only a
    // regular file counts as an existing tile.
    let existing = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if existing {
        debug!(tile = %tile.filename, "tile already on disk, skipping download");
        return Ok(());
    }

    let mut last_error = String::new();

    for attempt in 1..=options.max_retries {
        if cancel.is_cancelled() {
            return Err(unavailable(&tile, attempt - 1, "cancelled"));
        }

        // The permit is held only for the duration of the HTTP request;
        // backoff delays must not starve other panoramas' downloads.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(unavailable(&tile, attempt - 1, "cancelled"));
            }
            permit = limiter.acquire() => permit,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(unavailable(&tile, attempt, "cancelled"));
            }
            result = tokio::time::timeout(
                options.request_timeout,
                provider.fetch_tile(&tile.url),
            ) => result,
        };
        drop(permit);

        match outcome {
            Ok(Ok(data)) => {
                write_tile_atomic(&path, &data).await?;
                debug!(
                    tile = %tile.filename,
                    bytes = data.len(),
                    attempt,
                    "tile fetched"
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
            }
            Err(_) => {
                last_error = "timeout".to_string();
            }
        }

        if attempt < options.max_retries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(unavailable(&tile, attempt, "cancelled"));
                }
                _ = tokio::time::sleep(backoff(attempt)) => {}
            }
        }
    }

    warn!(
        tile = %tile.filename,
        attempts = options.max_retries,
        last_error = %last_error,
        "tile retry budget exhausted"
    );
    Err(unavailable(&tile, options.max_retries, &last_error))
}

/// Exponential backoff delay before retry attempt `attempt + 1`.
///
/// The exponent is capped so arbitrarily large configured attempt counts
/// cannot overflow the shift.
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100 * (1u64 << attempt.min(16)))
}

fn unavailable(tile: &TileDescriptor, attempts: u32, last_error: &str) -> PanoError {
    PanoError::TileUnavailable {
        col: tile.col,
        row: tile.row,
        attempts,
        last_error: last_error.to_string(),
    }
}

/// Writes tile bytes to `<path>.part` and renames into place.
///
/// From the caller's perspective the file either exists complete under its
/// final name or does not exist.
async fn write_tile_atomic(path: &Path, data: &[u8]) -> Result<(), io::Error> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tile path has no filename"))?;
    let part = path.with_file_name(format!("{}.part", file_name));

    tokio::fs::write(&part, data).await?;
    tokio::fs::rename(&part, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{PanoMetadata, ProviderError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock provider with a per-URL budget of failures before success.
    struct FlakyProvider {
        /// URL -> remaining failures before succeeding
        failures: Mutex<HashMap<String, u32>>,
        /// URLs that fail permanently
        dead: Vec<String>,
        /// Count of fetch_tile calls, for idempotence assertions
        calls: Mutex<u32>,
    }

    impl FlakyProvider {
        fn new() -> Self {
            Self {
                failures: Mutex::new(HashMap::new()),
                dead: Vec::new(),
                calls: Mutex::new(0),
            }
        }

        fn failing_first(mut self, url: &str, times: u32) -> Self {
            self.failures.get_mut().unwrap().insert(url.to_string(), times);
            self
        }

        fn dead_url(mut self, url: &str) -> Self {
            self.dead.push(url.to_string());
            self
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl PanoProvider for FlakyProvider {
        async fn fetch_metadata(&self, pano_id: &str) -> Result<PanoMetadata, ProviderError> {
            Ok(PanoMetadata {
                pano_id: pano_id.to_string(),
                zoom: 5,
                image_width: 1500,
                image_height: 1000,
                tile_width: 512,
                tile_height: 512,
            })
        }

        fn tile_url(&self, pano_id: &str, col: u32, row: u32, zoom: u8) -> String {
            format!("mock://{}/{}/{}/{}", pano_id, zoom, col, row)
        }

        async fn fetch_tile(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
            *self.calls.lock().unwrap() += 1;

            if self.dead.iter().any(|d| d == url) {
                return Err(ProviderError::HttpError("HTTP 404".to_string()));
            }

            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ProviderError::HttpError("connection reset".to_string()));
                }
            }

            Ok(url.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    async fn tile_set(provider: &FlakyProvider, pano_id: &str) -> TileSet {
        crate::locator::locate(provider, pano_id).await.unwrap()
    }

    fn options(max_retries: u32) -> FetchOptions {
        FetchOptions {
            request_timeout: Duration::from_secs(5),
            max_retries,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_tiles_written() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new());
        let set = tile_set(&provider, "p1").await;
        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));

        fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(3),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        for tile in &set.tiles {
            let path = dir.path().join(&tile.filename);
            assert!(path.exists(), "missing {}", tile.filename);
            // Content matches what the provider served for that URL
            assert_eq!(std::fs::read(&path).unwrap(), tile.url.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FlakyProvider::new();
        let set = tile_set(&provider, "p1").await;
        // First tile fails twice, succeeds on the third attempt
        let provider = Arc::new(provider.failing_first(&set.tiles[0].url, 2));
        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));

        fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(3),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let path = dir.path().join(&set.tiles[0].filename);
        assert_eq!(std::fs::read(&path).unwrap(), set.tiles[0].url.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_exhaustion_reports_tile_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FlakyProvider::new();
        let set = tile_set(&provider, "p1").await;
        let provider = Arc::new(provider.dead_url(&set.tiles[4].url));
        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));

        let err = fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(2),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            PanoError::TileUnavailable {
                col,
                row,
                attempts,
                last_error,
            } => {
                assert_eq!((col, row), (set.tiles[4].col, set.tiles[4].row));
                assert_eq!(attempts, 2);
                assert!(last_error.contains("404"));
            }
            other => panic!("expected TileUnavailable, got {:?}", other),
        }

        // No final-name file for the dead tile
        assert!(!dir.path().join(&set.tiles[4].filename).exists());
    }

    #[tokio::test]
    async fn test_fetch_skips_existing_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new());
        let set = tile_set(&provider, "p1").await;

        // Pre-place every tile; the fetcher must issue zero requests
        for tile in &set.tiles {
            std::fs::write(dir.path().join(&tile.filename), b"existing").unwrap();
        }

        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));
        fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(3),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(provider.call_count(), 0);
        // Pre-existing content untouched
        let first = dir.path().join(&set.tiles[0].filename);
        assert_eq!(std::fs::read(&first).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_fetch_no_part_files_left_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new());
        let set = tile_set(&provider, "p1").await;
        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));

        fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(3),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(
                !name.to_string_lossy().ends_with(".part"),
                "leftover partial file {:?}",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_cancellation_stops_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new());
        let set = tile_set(&provider, "p1").await;
        let limiter = Arc::new(HttpConcurrencyLimiter::new(10));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_tiles(
            &set,
            dir.path(),
            Arc::clone(&provider),
            limiter,
            options(3),
            cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PanoError::TileUnavailable { .. }));
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));

        // Large configured retry counts must not overflow the shift
        assert_eq!(backoff(64), backoff(16));
        assert_eq!(backoff(u32::MAX), backoff(16));
    }

    #[tokio::test]
    async fn test_write_tile_atomic_creates_final_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0_p.jpg");

        write_tile_atomic(&path, b"data").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        assert!(!dir.path().join("0_0_p.jpg.part").exists());
    }
}
