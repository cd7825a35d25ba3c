//! Tile locator - derives a panorama's tile grid.
//!
//! Given a panorama id, the locator queries the provider's metadata to
//! learn the native zoom and pixel dimensions, then enumerates one
//! [`TileDescriptor`] per grid cell. Grid dimensions vary per panorama and
//! are computed from the metadata, never assumed.

use crate::provider::{PanoMetadata, PanoProvider, ProviderError};

/// One cell of a panorama's tile grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    /// Column within the grid, `0..grid_cols`.
    pub col: u32,
    /// Row within the grid, `0..grid_rows`.
    pub row: u32,
    /// On-disk filename in the scratch tile directory.
    ///
    /// Qualified by panorama id so concurrently processed panoramas never
    /// collide in the shared scratch directory.
    pub filename: String,
    /// Provider tile-fetch URL encoding id, col, row, and zoom.
    pub url: String,
}

/// The ordered tile set for one panorama, plus the facts the stitcher
/// needs to compose and crop it.
#[derive(Debug, Clone)]
pub struct TileSet {
    /// Panorama metadata the grid was derived from.
    pub metadata: PanoMetadata,
    /// Descriptors in row-major order: `(0,0), (1,0), .. (0,1), ..`.
    pub tiles: Vec<TileDescriptor>,
}

impl TileSet {
    /// Panorama identifier this set belongs to.
    pub fn pano_id(&self) -> &str {
        &self.metadata.pano_id
    }
}

/// Computes the tile set for a panorama.
///
/// # Errors
///
/// Returns a [`ProviderError`] if the metadata lookup fails (invalid id,
/// network error). The caller decides whether to retry or mark the
/// panorama failed.
pub async fn locate<P: PanoProvider>(
    provider: &P,
    pano_id: &str,
) -> Result<TileSet, ProviderError> {
    let metadata = provider.fetch_metadata(pano_id).await?;
    Ok(tile_set_for(provider, metadata))
}

/// Builds the descriptor list for already-fetched metadata.
fn tile_set_for<P: PanoProvider>(provider: &P, metadata: PanoMetadata) -> TileSet {
    let cols = metadata.grid_cols();
    let rows = metadata.grid_rows();

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            tiles.push(TileDescriptor {
                col,
                row,
                filename: tile_filename(&metadata.pano_id, col, row),
                url: provider.tile_url(&metadata.pano_id, col, row, metadata.zoom),
            });
        }
    }

    TileSet { metadata, tiles }
}

/// Scratch filename for one tile: `{col}_{row}_{id}.jpg`.
pub fn tile_filename(pano_id: &str, col: u32, row: u32) -> String {
    format!("{}_{}_{}.jpg", col, row, pano_id)
}
