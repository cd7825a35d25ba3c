//! Google Street View panorama provider.
//!
//! Uses the unofficial `cbk` imagery service, which serves both per-panorama
//! metadata (`output=json`) and individual tiles (`output=tile`). The
//! service is undocumented; the endpoints below match what the official web
//! client requests.
//!
//! # Endpoints
//!
//! - Metadata: `https://cbk0.google.com/cbk?output=json&panoid={ID}&dm=0`
//! - Tile: `https://cbk0.google.com/cbk?output=tile&panoid={ID}&zoom={Z}&x={COL}&y={ROW}`
//!
//! # Coordinate System
//!
//! Tiles are addressed by `(x, y)` within the panorama's own grid, left to
//! right and top to bottom, starting at `(0, 0)`. Grid dimensions vary per
//! panorama and zoom level and must be derived from the reported pixel
//! dimensions, not assumed.

use crate::provider::{AsyncHttpClient, PanoMetadata, PanoProvider, ProviderError};
use serde_json::Value;

const METADATA_URL: &str = "https://cbk0.google.com/cbk?output=json";
const TILE_URL: &str = "https://cbk0.google.com/cbk?output=tile";

/// Tile edge length served by the cbk service.
const TILE_SIZE: u32 = 512;

/// Zoom level used when the metadata response does not report one.
const DEFAULT_ZOOM: u8 = 5;

/// Street View panorama imagery provider.
///
/// Generic over the HTTP client so tests can substitute a mock.
///
/// # Example
///
/// ```ignore
/// use panostitch::provider::{AsyncReqwestClient, PanoProvider, StreetViewProvider};
///
/// let provider = StreetViewProvider::new(AsyncReqwestClient::new()?);
/// let meta = provider.fetch_metadata("abc123").await?;
/// ```
pub struct StreetViewProvider<C: AsyncHttpClient> {
    http_client: C,
}

impl<C: AsyncHttpClient> StreetViewProvider<C> {
    /// Creates a new Street View provider.
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }

    /// Builds the metadata URL for a panorama.
    fn metadata_url(&self, pano_id: &str) -> String {
        format!("{}&panoid={}&dm=0", METADATA_URL, pano_id)
    }

    /// Parses the metadata JSON response into [`PanoMetadata`].
    ///
    /// The cbk service reports numeric fields as JSON strings; both string
    /// and number encodings are accepted.
    fn parse_metadata(pano_id: &str, body: &[u8]) -> Result<PanoMetadata, ProviderError> {
        let root: Value = serde_json::from_slice(body)
            .map_err(|e| ProviderError::InvalidMetadata(format!("not JSON: {}", e)))?;

        let data = root
            .get("Data")
            .ok_or_else(|| ProviderError::UnknownPanorama(pano_id.to_string()))?;

        let image_width = dimension(data, "image_width")?;
        let image_height = dimension(data, "image_height")?;
        let tile_width = dimension(data, "tile_width").unwrap_or(TILE_SIZE);
        let tile_height = dimension(data, "tile_height").unwrap_or(TILE_SIZE);
        let zoom = dimension(data, "num_zoom_levels")
            .map(|z| z as u8)
            .unwrap_or(DEFAULT_ZOOM);

        if image_width == 0 || image_height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(ProviderError::InvalidMetadata(format!(
                "degenerate dimensions {}x{} (tile {}x{})",
                image_width, image_height, tile_width, tile_height
            )));
        }

        Ok(PanoMetadata {
            pano_id: pano_id.to_string(),
            zoom,
            image_width,
            image_height,
            tile_width,
            tile_height,
        })
    }
}

/// Reads a numeric field that may be encoded as a JSON string or number.
fn dimension(data: &Value, key: &str) -> Result<u32, ProviderError> {
    let value = data
        .get(key)
        .ok_or_else(|| ProviderError::InvalidMetadata(format!("missing field {}", key)))?;

    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| ProviderError::InvalidMetadata(format!("non-integer {}", key))),
        Value::String(s) => s
            .parse::<u32>()
            .map_err(|_| ProviderError::InvalidMetadata(format!("unparseable {}: {:?}", key, s))),
        _ => Err(ProviderError::InvalidMetadata(format!(
            "unexpected type for {}",
            key
        ))),
    }
}

impl<C: AsyncHttpClient> PanoProvider for StreetViewProvider<C> {
    async fn fetch_metadata(&self, pano_id: &str) -> Result<PanoMetadata, ProviderError> {
        let url = self.metadata_url(pano_id);
        let body = self.http_client.get(&url).await?;
        Self::parse_metadata(pano_id, &body)
    }

    fn tile_url(&self, pano_id: &str, col: u32, row: u32, zoom: u8) -> String {
        format!(
            "{}&panoid={}&zoom={}&x={}&y={}",
            TILE_URL, pano_id, zoom, col, row
        )
    }

    async fn fetch_tile(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.http_client.get(url).await
    }

    fn name(&self) -> &str {
        "Street View"
    }
}
