//! Geometry record storage
//!
//! This module provides the `GeometryRecord` struct for storing one parsed
//! placemark, with an explicit tagged geometry variant instead of the
//! duck-typed feature dictionaries the source data implies.

use geo::{Point, Polygon};

/// Geometry of a single placemark
///
/// Exactly one variant per record. A `Polygon` carries only its outer ring;
/// the loader guarantees the ring has at least 3 coordinates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    /// A single tower / coverage asset at (lon, lat)
    Point(Point<f64>),
    /// A coverage area bounded by its outer ring, (lon, lat) vertices
    Polygon(Polygon<f64>),
}

/// One named geometry entry from the source KML document
///
/// Records are created once during load and never mutated; the coverage
/// index owns them for the remainder of the process.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryRecord {
    /// Placemark name ("Unknown" if the source had none)
    pub name: String,
    /// Placemark description ("" if the source had none)
    pub description: String,
    /// The parsed geometry
    pub geometry: Geometry,
}

impl GeometryRecord {
    /// Create a new record with explicit fields
    pub fn new(name: impl Into<String>, description: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            geometry,
        }
    }

    /// Whether this record is a coverage area
    #[inline]
    pub fn is_polygon(&self) -> bool {
        matches!(self.geometry, Geometry::Polygon(_))
    }

    /// Whether this record is a tower / coverage asset
    #[inline]
    pub fn is_point(&self) -> bool {
        matches!(self.geometry, Geometry::Point(_))
    }

    /// The point location, if this record is a point
    #[inline]
    pub fn as_point(&self) -> Option<&Point<f64>> {
        match &self.geometry {
            Geometry::Point(p) => Some(p),
            Geometry::Polygon(_) => None,
        }
    }

    /// The polygon, if this record is an area
    #[inline]
    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match &self.geometry {
            Geometry::Polygon(p) => Some(p),
            Geometry::Point(_) => None,
        }
    }
}
