//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONNECTION_LIMIT: usize = 100;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PANORAMA_DEADLINE: Duration = Duration::from_secs(300);
const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for the download and stitch pipeline.
///
/// Groups every tunable the orchestrator needs, with defaults matching
/// typical provider limits.
///
/// # Example
///
/// ```
/// use panostitch::config::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.connection_limit(), 100);
/// assert_eq!(config.batch_size(), 100);
///
/// let config = PipelineConfig::new()
///     .with_connection_limit(32)
///     .with_max_retries(3)
///     .with_request_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Global ceiling on concurrent HTTP connections across the whole run
    connection_limit: usize,
    /// Maximum attempts per tile (and per metadata lookup)
    max_retries: u32,
    /// Timeout for a single HTTP request
    request_timeout: Duration,
    /// Overall deadline for one panorama, after which its in-flight
    /// fetches are abandoned and it is marked failed
    panorama_deadline: Duration,
    /// Number of panoramas processed per batch
    batch_size: usize,
    /// Scratch directory for in-flight tiles
    tile_dir: PathBuf,
    /// Output directory for stitched panoramas
    pano_dir: PathBuf,
}

impl PipelineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global concurrent-connection ceiling. Default: 100.
    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = limit;
        self
    }

    /// Set the maximum attempts per tile before it is reported
    /// unavailable. Default: 5.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the per-request timeout. Default: 30 seconds.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the per-panorama deadline. Default: 300 seconds.
    pub fn with_panorama_deadline(mut self, deadline: Duration) -> Self {
        self.panorama_deadline = deadline;
        self
    }

    /// Set the batch size. Default: 100 panoramas.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the scratch tile directory. Default: `tiles`.
    pub fn with_tile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tile_dir = dir.into();
        self
    }

    /// Set the stitched panorama directory. Default: `panoramas`.
    pub fn with_pano_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pano_dir = dir.into();
        self
    }

    /// Global concurrent-connection ceiling.
    pub fn connection_limit(&self) -> usize {
        self.connection_limit
    }

    /// Maximum attempts per tile.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Per-panorama deadline.
    pub fn panorama_deadline(&self) -> Duration {
        self.panorama_deadline
    }

    /// Panoramas per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Scratch tile directory.
    pub fn tile_dir(&self) -> &PathBuf {
        &self.tile_dir
    }

    /// Stitched panorama directory.
    pub fn pano_dir(&self) -> &PathBuf {
        &self.pano_dir
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            panorama_deadline: DEFAULT_PANORAMA_DEADLINE,
            batch_size: DEFAULT_BATCH_SIZE,
            tile_dir: PathBuf::from("tiles"),
            pano_dir: PathBuf::from("panoramas"),
        }
    }
}
