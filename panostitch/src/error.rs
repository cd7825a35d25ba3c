//! Pipeline error taxonomy.
//!
//! Errors are categorized by pipeline stage. Per-panorama errors
//! (`Retrieval`, `TileUnavailable`, `Stitch`, `Deadline`) mark that
//! panorama failed without aborting the batch; disk errors (`Io`, and
//! `Stitch` wrapping an I/O failure) are fatal for the run and surface
//! to the operator.

use crate::provider::ProviderError;
use crate::stitcher::StitchError;
use thiserror::Error;

/// Errors that can occur while processing one panorama.
#[derive(Debug, Error)]
pub enum PanoError {
    /// Metadata lookup failed after bounded retries
    #[error("metadata retrieval failed for {pano_id}: {source}")]
    Retrieval {
        pano_id: String,
        #[source]
        source: ProviderError,
    },

    /// A tile exhausted its retry budget
    #[error("tile ({col}, {row}) unavailable after {attempts} attempts: {last_error}")]
    TileUnavailable {
        col: u32,
        row: u32,
        attempts: u32,
        last_error: String,
    },

    /// Missing or corrupt tile data at composition time
    #[error("stitch failed: {0}")]
    Stitch(#[from] StitchError),

    /// Per-panorama deadline elapsed; in-flight fetches were abandoned
    #[error("deadline exceeded after {0:?}")]
    Deadline(std::time::Duration),

    /// Disk error (full, permission); fatal for the run
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PanoError {
    /// Whether this error must abort the whole run rather than just the
    /// panorama it occurred on. Disk errors are fatal wherever they
    /// surface, including on the stitcher's read and write paths.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PanoError::Io(_) | PanoError::Stitch(StitchError::Io(_))
        )
    }
}
