//! CoverageIndex - Immutable query surface over loaded geometry records
//!
//! The index partitions records into coverage polygons and tower points,
//! precomputes the projected tower positions, and answers containment and
//! proximity queries. It is built once at startup and never mutated, so
//! `query` is safe for unlimited concurrent invocation.

use crate::{Geometry, GeometryRecord, utils};

use geo::{Intersects, Point};
use std::sync::Arc;

/// Configuration for the coverage index
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Tower proximity radius in kilometers. A query point farther than this
    /// from every tower (after projection) is not covered by proximity.
    pub radius_km: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self { radius_km: 5.0 }
    }
}

/// How a query matched the coverage map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchKind {
    /// No polygon contains the point and no tower is within the radius
    None,
    /// The point lies inside a coverage polygon
    PolygonContainment,
    /// The point is within the coverage radius of a tower
    PointProximity,
}

/// Result of a single coverage query
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Whether the point is covered at all
    pub covered: bool,
    /// How the match was found
    pub match_kind: MatchKind,
    /// The matching record, for reporting only
    pub matched: Option<Arc<GeometryRecord>>,
    /// Projected distance to the matched tower in km, rounded to 2 decimals.
    /// Present only for [`MatchKind::PointProximity`].
    pub distance_km: Option<f64>,
}

impl QueryResult {
    fn not_covered() -> Self {
        Self {
            covered: false,
            match_kind: MatchKind::None,
            matched: None,
            distance_km: None,
        }
    }
}

/// Summary counts for the index
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexInfo {
    /// Number of coverage polygons
    pub polygon_count: usize,
    /// Number of tower points
    pub point_count: usize,
    /// Configured proximity radius in kilometers
    pub radius_km: f64,
}

/// Immutable spatial index over coverage polygons and tower points
#[derive(Debug, Clone)]
pub struct CoverageIndex {
    /// Coverage polygons in load order
    polygons: Vec<Arc<GeometryRecord>>,
    /// Tower points in load order
    points: Vec<Arc<GeometryRecord>>,
    /// Web Mercator position of each tower, parallel to `points`
    projected_points: Vec<Point<f64>>,
    /// Configuration settings
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CoverageIndex {
    /// Build an index from loaded records
    ///
    /// Records are partitioned into polygons and points, preserving load
    /// order within each partition. Tower positions are projected into Web
    /// Mercator once here so queries only project the query point.
    pub fn build(records: Vec<GeometryRecord>, config: Config) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::build");

        let mut polygons = Vec::new();
        let mut points = Vec::new();
        let mut projected_points = Vec::new();

        for record in records {
            let record = Arc::new(record);
            match &record.geometry {
                Geometry::Polygon(_) => polygons.push(record),
                Geometry::Point(p) => {
                    projected_points.push(utils::wgs84_to_mercator(p.y(), p.x()));
                    points.push(record);
                }
            }
        }

        tracing::info!(
            "Coverage index built: {} polygons, {} points, radius {} km",
            polygons.len(),
            points.len(),
            config.radius_km
        );

        Self {
            polygons,
            points,
            projected_points,
            config,
        }
    }

    /// Query whether a geographic point is covered
    ///
    /// Pure function of index state and input, in strict precedence order:
    ///
    /// 1. Polygon containment, in load order, first match wins. Containment
    ///    is boundary-INCLUSIVE: a point exactly on a polygon edge counts
    ///    as covered. Overlapping polygons are not disambiguated by area or
    ///    any other criterion, only by load order.
    /// 2. Tower proximity: the query point and every stored tower are
    ///    compared in Web Mercator meters; the nearest tower within the
    ///    configured radius wins, ties broken by load order (stable argmin).
    /// 3. Otherwise not covered.
    ///
    /// Out-of-range latitude/longitude values are accepted and simply match
    /// nothing.
    pub fn query(&self, lat: f64, lon: f64) -> QueryResult {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::query");

        let query_point = Point::new(lon, lat);

        // Pass 1: polygon containment, first match by load order
        for record in &self.polygons {
            let Geometry::Polygon(polygon) = &record.geometry else {
                continue;
            };
            if polygon.intersects(&query_point) {
                return QueryResult {
                    covered: true,
                    match_kind: MatchKind::PolygonContainment,
                    matched: Some(record.clone()),
                    distance_km: None,
                };
            }
        }

        // Pass 2: tower proximity in projected meters
        if !self.points.is_empty() {
            let projected_query = utils::wgs84_to_mercator(lat, lon);

            let mut nearest: Option<(usize, f64)> = None;
            for (i, tower) in self.projected_points.iter().enumerate() {
                let distance = utils::euclidean_distance_m(&projected_query, tower);
                // Strict less-than keeps the first tower on equal distance
                if nearest.is_none_or(|(_, best)| distance < best) {
                    nearest = Some((i, distance));
                }
            }

            if let Some((i, distance)) = nearest {
                if distance <= self.config.radius_km * 1000.0 {
                    return QueryResult {
                        covered: true,
                        match_kind: MatchKind::PointProximity,
                        matched: Some(self.points[i].clone()),
                        distance_km: Some(round_2dp(distance / 1000.0)),
                    };
                }
            }
        }

        QueryResult::not_covered()
    }

    /// Number of coverage polygons
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Number of tower points
    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Whether the index holds no geometry at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.points.is_empty()
    }

    /// Configured proximity radius in kilometers
    #[inline]
    pub fn radius_km(&self) -> f64 {
        self.config.radius_km
    }

    /// Get index information
    #[inline]
    pub fn get_info(&self) -> IndexInfo {
        IndexInfo {
            polygon_count: self.polygons.len(),
            point_count: self.points.len(),
            radius_km: self.config.radius_km,
        }
    }

    /// Coverage polygons in load order
    #[inline]
    pub fn polygons(&self) -> &[Arc<GeometryRecord>] {
        &self.polygons
    }

    /// Tower points in load order
    #[inline]
    pub fn points(&self) -> &[Arc<GeometryRecord>] {
        &self.points
    }
}

/// Round to two decimal places for reporting
#[inline]
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
