//! Panostitch - panorama tile acquisition and stitching
//!
//! This library downloads street-level 360° panorama imagery tile by tile
//! and reassembles each panorama's tile grid into a single cropped image.
//!
//! # High-Level API
//!
//! The [`batch`] module drives the whole pipeline over a panorama list:
//!
//! ```ignore
//! use panostitch::batch::BatchOrchestrator;
//! use panostitch::config::PipelineConfig;
//! use panostitch::provider::{AsyncReqwestClient, StreetViewProvider};
//! use panostitch::record::load_records;
//!
//! let records = load_records("panoids.json")?;
//! let provider = StreetViewProvider::new(AsyncReqwestClient::new()?);
//! let orchestrator = BatchOrchestrator::new(provider, PipelineConfig::default());
//! let stats = orchestrator.run(&records).await?;
//! println!("{} done, {} skipped, {} failed", stats.succeeded, stats.skipped, stats.failed);
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod limiter;
pub mod locator;
pub mod logging;
pub mod provider;
pub mod record;
pub mod stitcher;

/// Version of the panostitch library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
