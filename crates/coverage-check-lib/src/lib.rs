//! Coverage Check Library - Core Spatial Index for KMZ Coverage Maps
//!
//! This library answers one question: is a geographic point inside a known
//! service area, and if not, is it within a coverage radius of a known tower?
//! It loads a KMZ archive into typed geometry records, partitions them into
//! polygon (area) and point (tower) collections, and serves containment and
//! proximity queries against the result.
//!
//! # Architecture
//!
//! - **[`GeometryRecord`]**: Immutable storage for one parsed placemark
//! - **[`load_kmz`]**: KMZ archive extraction and KML placemark parsing
//! - **[`CoverageIndex`]**: Read-only query surface built once at startup
//! - **[`utils`]**: WGS84 to Web Mercator projection and planar distance
//!
//! # Concurrency
//!
//! Loading and building are single-threaded, run-to-completion startup
//! operations. [`CoverageIndex::query`] takes `&self` and touches no shared
//! mutable state, so any number of threads may query concurrently without
//! locking once the index is built.

mod index;
mod kmz;
mod record;
pub mod utils;

// Public API exports
pub use index::{Config, CoverageIndex, IndexInfo, MatchKind, QueryResult};
pub use kmz::load_kmz;
pub use record::{Geometry, GeometryRecord};

use std::path::PathBuf;

/// Error types for archive loading
///
/// Archive-level failures surface here exactly once, at startup. Per-placemark
/// parse failures never reach this type; they are dropped with a warning and
/// loading continues.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("KML parsing error: {0}")]
    Kml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoverageError>;
