//! Stitcher - composes a fetched tile set into one cropped panorama image.
//!
//! Every tile is painted at `(col * tile_w, row * tile_h)` on a canvas of
//! exactly `grid_cols * tile_w` by `grid_rows * tile_h` pixels, then the
//! canvas is cropped from the origin to the panorama's true pixel
//! dimensions, discarding the right/bottom overshoot of the last grid
//! column and row.
//!
//! A missing or undecodable tile aborts the stitch without producing a
//! partial artifact; the temp tiles are left in place for inspection. On
//! success the panorama's temp tiles are deleted to bound scratch disk
//! usage.

use crate::locator::TileSet;
use crate::record::PanoramaRecord;
use image::{ImageFormat, RgbImage};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during stitching.
#[derive(Debug, Error)]
pub enum StitchError {
    /// A tile file named in the tile set does not exist
    #[error("missing tile file {path}")]
    MissingTile { path: PathBuf },

    /// A tile file exists but is not a readable image
    #[error("corrupt tile {path}: {reason}")]
    CorruptTile { path: PathBuf, reason: String },

    /// The stitched image could not be encoded
    #[error("artifact encode failed: {0}")]
    Encode(String),

    /// Disk error reading tiles or writing the artifact
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Stitches a panorama's tiles into its final artifact.
///
/// Reads every tile named in `tile_set` from `tile_dir`, composes and
/// crops the panorama, and writes it to `pano_dir` under the
/// `{lat}_{lon}_{id}.jpg` name derived from `record`. The artifact is
/// written atomically (encode to memory, write `.part`, rename), which
/// keeps the orchestrator's existence check race-safe.
///
/// On success the panorama's temp tiles are removed; other panoramas'
/// tiles in the shared scratch directory are untouched. On failure no
/// artifact is produced and the temp tiles are preserved.
pub fn stitch(
    tile_set: &TileSet,
    tile_dir: &Path,
    pano_dir: &Path,
    record: &PanoramaRecord,
) -> Result<PathBuf, StitchError> {
    let canvas = compose(tile_set, tile_dir)?;

    let meta = &tile_set.metadata;
    let cropped =
        image::imageops::crop_imm(&canvas, 0, 0, meta.image_width, meta.image_height).to_image();

    let mut encoded = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
        .map_err(|e| StitchError::Encode(e.to_string()))?;

    let final_path = pano_dir.join(record.artifact_filename());
    let part_path = pano_dir.join(format!("{}.part", record.artifact_filename()));
    fs::write(&part_path, &encoded)?;
    fs::rename(&part_path, &final_path)?;

    delete_tiles(tile_set, tile_dir);

    debug!(
        pano_id = tile_set.pano_id(),
        width = meta.image_width,
        height = meta.image_height,
        artifact = %final_path.display(),
        "panorama stitched"
    );

    Ok(final_path)
}

/// Paints every tile onto the full-grid canvas.
///
/// The canvas is exactly `grid_cols * tile_w` by `grid_rows * tile_h`
/// pixels; cropping happens in [`stitch`].
fn compose(tile_set: &TileSet, tile_dir: &Path) -> Result<RgbImage, StitchError> {
    let meta = &tile_set.metadata;
    let mut canvas = RgbImage::new(
        meta.grid_cols() * meta.tile_width,
        meta.grid_rows() * meta.tile_height,
    );

    for tile in &tile_set.tiles {
        let path = tile_dir.join(&tile.filename);
        let data = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StitchError::MissingTile { path: path.clone() }
            } else {
                StitchError::Io(e)
            }
        })?;

        let tile_image = image::load_from_memory(&data)
            .map_err(|e| StitchError::CorruptTile {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        image::imageops::replace(
            &mut canvas,
            &tile_image,
            (tile.col * meta.tile_width) as i64,
            (tile.row * meta.tile_height) as i64,
        );
    }

    Ok(canvas)
}

/// Removes the panorama's temp tiles after a successful stitch.
///
/// Removal failures are logged, not propagated: the artifact already
/// exists and a leftover tile only costs scratch space.
fn delete_tiles(tile_set: &TileSet, tile_dir: &Path) {
    for tile in &tile_set.tiles {
        let path = tile_dir.join(&tile.filename);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(tile = %path.display(), error = %e, "failed to remove temp tile");
            }
        }
    }
}
