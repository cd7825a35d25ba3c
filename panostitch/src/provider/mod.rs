//! Panorama imagery provider abstraction.
//!
//! This module provides traits and implementations for fetching panorama
//! metadata and tile images from an imagery provider.
//!
//! The provider is treated as a black box: given a panorama id it reports
//! the panorama's native zoom and pixel dimensions, and given a tile URL it
//! returns the raw image bytes for that grid cell.

mod http;
mod streetview;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient};
pub use streetview::StreetViewProvider;
pub use types::{PanoMetadata, PanoProvider, ProviderError};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
