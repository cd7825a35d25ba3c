//! Provider types and traits.

use std::future::Future;
use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP request failed (transport error or non-success status)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Panorama id unknown to the provider
    #[error("unknown panorama id: {0}")]
    UnknownPanorama(String),

    /// Metadata response could not be parsed
    #[error("invalid metadata response: {0}")]
    InvalidMetadata(String),
}

/// Provider-reported facts about a panorama.
///
/// The tile grid is not globally fixed: its dimensions derive from the
/// panorama's native pixel size and tile size at the reported zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanoMetadata {
    /// Provider panorama identifier.
    pub pano_id: String,
    /// Zoom level at which the panorama is available at full resolution.
    pub zoom: u8,
    /// True panorama width in pixels at `zoom`.
    pub image_width: u32,
    /// True panorama height in pixels at `zoom`.
    pub image_height: u32,
    /// Width of one tile in pixels.
    pub tile_width: u32,
    /// Height of one tile in pixels.
    pub tile_height: u32,
}

impl PanoMetadata {
    /// Number of tile columns needed to cover the panorama width.
    ///
    /// The last column may overshoot a non-multiple true width; the
    /// stitcher crops the overshoot away.
    pub fn grid_cols(&self) -> u32 {
        self.image_width.div_ceil(self.tile_width)
    }

    /// Number of tile rows needed to cover the panorama height.
    pub fn grid_rows(&self) -> u32 {
        self.image_height.div_ceil(self.tile_height)
    }
}

/// Trait for panorama imagery providers.
///
/// Implementors expose a metadata lookup per panorama id plus tile fetch
/// by constructed URL. The URL scheme is provider-specific and must encode
/// panorama id, column, row, and zoom.
pub trait PanoProvider: Send + Sync {
    /// Fetches metadata for a panorama: native zoom, pixel dimensions,
    /// and tile size.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids, transport failures, or
    /// unparseable responses.
    fn fetch_metadata(
        &self,
        pano_id: &str,
    ) -> impl Future<Output = Result<PanoMetadata, ProviderError>> + Send;

    /// Builds the tile-fetch URL for one grid cell of a panorama.
    fn tile_url(&self, pano_id: &str, col: u32, row: u32, zoom: u8) -> String;

    /// Downloads one tile image given its URL.
    ///
    /// # Returns
    ///
    /// Raw image data (typically JPEG format) or an error.
    fn fetch_tile(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;
}
