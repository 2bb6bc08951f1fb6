//! KMZ archive loading and KML placemark parsing
//!
//! A KMZ file is a zip container holding one KML document. Loading extracts
//! the first `.kml` entry (by archive listing order) into a scoped temporary
//! directory, decodes it lossily, and walks every `Placemark` element with a
//! streaming XML reader.
//!
//! Per-placemark failures are absorbed: a malformed placemark is dropped with
//! a warning and loading continues. Only archive-level problems (missing
//! file, corrupt container, untokenizable document) surface as errors.

use crate::{CoverageError, Geometry, GeometryRecord, Result};

use geo::{LineString, Point, Polygon};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::path::Path;

/// Load all geometry records from a KMZ archive
///
/// Returns an empty list (not an error) when the archive contains no `.kml`
/// entry; callers must treat "loaded but empty" as distinct from failure.
pub fn load_kmz(path: &Path) -> Result<Vec<GeometryRecord>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("kmz::load");

    if !path.exists() {
        return Err(CoverageError::ArchiveNotFound(path.to_path_buf()));
    }

    tracing::info!("Loading KMZ archive: {}", path.display());
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // First .kml entry by archive listing order wins; archives with multiple
    // documents use only one, deterministically.
    let mut kml_index = None;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name().to_ascii_lowercase().ends_with(".kml") {
            kml_index = Some(i);
            break;
        }
    }
    let Some(kml_index) = kml_index else {
        tracing::warn!("KMZ archive contains no KML document: {}", path.display());
        return Ok(Vec::new());
    };

    // The container may need disk-backed extraction before parsing; the
    // TempDir guarantees removal on every exit path.
    let temp_dir = tempfile::tempdir()?;
    let extracted = temp_dir.path().join("doc.kml");
    {
        let mut entry = archive.by_index(kml_index)?;
        let mut out = File::create(&extracted)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    let bytes = std::fs::read(&extracted)?;
    let text = String::from_utf8_lossy(&bytes);
    let records = parse_kml(&text)?;

    tracing::info!(
        "Loaded {} geometry records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Accumulated state for the placemark currently being read
#[derive(Default)]
struct PlacemarkState {
    name: Option<String>,
    description: Option<String>,
    point_coords: Option<String>,
    ring_coords: Option<String>,
    in_point: bool,
    in_outer_boundary: bool,
}

/// Which text content is currently being captured
#[derive(Clone, Copy, PartialEq)]
enum Capture {
    None,
    Name,
    Description,
    PointCoords,
    RingCoords,
}

/// Parse all placemarks from a KML document
fn parse_kml(content: &str) -> Result<Vec<GeometryRecord>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("kmz::parse_kml");

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut placemark: Option<PlacemarkState> = None;
    let mut capture = Capture::None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let local = e.local_name();
                let local = local.as_ref();

                if local == b"Placemark" {
                    placemark = Some(PlacemarkState::default());
                } else if let Some(state) = placemark.as_mut() {
                    match local {
                        // First occurrence of each text node wins
                        b"name" if state.name.is_none() => capture = Capture::Name,
                        b"description" if state.description.is_none() => {
                            capture = Capture::Description
                        }
                        b"Point" => state.in_point = true,
                        b"outerBoundaryIs" => state.in_outer_boundary = true,
                        b"coordinates" => {
                            if state.in_point && state.point_coords.is_none() {
                                capture = Capture::PointCoords;
                            } else if state.in_outer_boundary && state.ring_coords.is_none() {
                                capture = Capture::RingCoords;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Text(ref e) => {
                if capture != Capture::None {
                    if let Ok(unescaped) = e.unescape() {
                        text_buf.push_str(&unescaped);
                    }
                }
            }
            Event::CData(ref e) => {
                if capture != Capture::None {
                    text_buf.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => {
                let local = e.local_name();
                let local = local.as_ref();

                if local == b"Placemark" {
                    if let Some(state) = placemark.take() {
                        match finish_placemark(state) {
                            Some(record) => records.push(record),
                            None => {
                                tracing::warn!("Skipping placemark without a valid geometry");
                            }
                        }
                    }
                    capture = Capture::None;
                    text_buf.clear();
                } else if let Some(state) = placemark.as_mut() {
                    match local {
                        b"Point" => state.in_point = false,
                        b"outerBoundaryIs" => state.in_outer_boundary = false,
                        _ => {}
                    }
                    if capture != Capture::None {
                        let text = std::mem::take(&mut text_buf);
                        match capture {
                            Capture::Name => state.name = Some(text),
                            Capture::Description => state.description = Some(text),
                            Capture::PointCoords => state.point_coords = Some(text),
                            Capture::RingCoords => state.ring_coords = Some(text),
                            Capture::None => unreachable!(),
                        }
                        capture = Capture::None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Resolve an accumulated placemark into a record, or drop it
///
/// A valid polygon takes precedence over a point when both geometry tags are
/// present; an invalid polygon ring (< 3 tuples) falls back to the point.
fn finish_placemark(state: PlacemarkState) -> Option<GeometryRecord> {
    let name = state.name.unwrap_or_else(|| "Unknown".to_string());
    let description = state.description.unwrap_or_default();

    if let Some(raw) = &state.ring_coords {
        let ring = parse_coordinates(raw);
        if ring.len() >= 3 {
            let polygon = Polygon::new(LineString::from(ring), vec![]);
            return Some(GeometryRecord::new(name, description, Geometry::Polygon(polygon)));
        }
    }

    if let Some(raw) = &state.point_coords {
        // Only the first coordinate tuple locates a point geometry
        if let Some(&(lon, lat)) = parse_coordinates(raw).first() {
            return Some(GeometryRecord::new(
                name,
                description,
                Geometry::Point(Point::new(lon, lat)),
            ));
        }
    }

    None
}

/// Parse a whitespace-separated list of "lon,lat[,alt]" tuples
///
/// Only the first two numeric components of each tuple are used; a tuple
/// with fewer than two numeric components is discarded individually.
fn parse_coordinates(raw: &str) -> Vec<(f64, f64)> {
    raw.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next()?.parse::<f64>().ok()?;
            let lat = parts.next()?.parse::<f64>().ok()?;
            Some((lon, lat))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use zip::write::SimpleFileOptions;

    /// Write a zip archive with the given (entry name, content) pairs
    fn write_archive(dir: &Path, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(file_name);
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn kml_document(placemarks: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
{placemarks}
  </Document>
</kml>"#
        )
    }

    const TOWER_PLACEMARK: &str = r#"<Placemark>
  <name>Tower A</name>
  <description>North mast</description>
  <Point><coordinates>10.0,20.0,150.0</coordinates></Point>
</Placemark>"#;

    const ZONE_PLACEMARK: &str = r#"<Placemark>
  <name>Zone 1</name>
  <Polygon><outerBoundaryIs><LinearRing>
    <coordinates>0,0 0,1 1,1 1,0 0,0</coordinates>
  </LinearRing></outerBoundaryIs></Polygon>
</Placemark>"#;

    #[test]
    fn test_load_point_and_polygon() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(&format!("{TOWER_PLACEMARK}\n{ZONE_PLACEMARK}"));
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name, "Tower A");
        assert_eq!(records[0].description, "North mast");
        // Altitude component is ignored
        assert_eq!(records[0].as_point(), Some(&Point::new(10.0, 20.0)));

        assert_eq!(records[1].name, "Zone 1");
        assert_eq!(records[1].description, "");
        let ring = records[1].as_polygon().unwrap().exterior();
        assert_eq!(ring.0.len(), 5);
    }

    #[test]
    fn test_missing_name_defaults_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            "<Placemark><Point><coordinates>1.5,2.5</coordinates></Point></Placemark>",
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Unknown");
        assert_eq!(records[0].description, "");
    }

    #[test]
    fn test_missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_kmz(&dir.path().join("nope.kmz"));
        assert!(matches!(result, Err(CoverageError::ArchiveNotFound(_))));
    }

    #[test]
    fn test_archive_without_kml_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), "towers.kmz", &[("readme.txt", "no kml here")]);
        let records = load_kmz(&path).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.kmz");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let result = load_kmz(&path);
        assert!(matches!(result, Err(CoverageError::Archive(_))));
    }

    #[test]
    fn test_first_kml_entry_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = kml_document(TOWER_PLACEMARK);
        let second = kml_document(ZONE_PLACEMARK);
        let path = write_archive(
            dir.path(),
            "towers.kmz",
            &[("a.kml", &first), ("b.kml", &second)],
        );

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Tower A");
    }

    #[test]
    fn test_malformed_placemark_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(&format!(
            "<Placemark><name>Bad</name><Point><coordinates>not,numbers</coordinates></Point></Placemark>\n{TOWER_PLACEMARK}"
        ));
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Tower A");
    }

    #[test]
    fn test_short_ring_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            r#"<Placemark><name>Degenerate</name>
<Polygon><outerBoundaryIs><LinearRing>
  <coordinates>0,0 1,1</coordinates>
</LinearRing></outerBoundaryIs></Polygon></Placemark>"#,
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_short_tuples_are_discarded_individually() {
        // The lone "5" tuple is dropped; the ring keeps its other 4 tuples
        let ring = parse_coordinates("0,0 5 0,1,99 1,1 1,0");
        assert_eq!(ring, vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
    }

    #[test]
    fn test_point_uses_first_tuple_only() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            "<Placemark><Point><coordinates>3.0,4.0 5.0,6.0</coordinates></Point></Placemark>",
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records[0].as_point(), Some(&Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_polygon_wins_over_point_when_both_present() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            r#"<Placemark><name>Both</name>
<Point><coordinates>9,9</coordinates></Point>
<Polygon><outerBoundaryIs><LinearRing>
  <coordinates>0,0 0,1 1,1 0,0</coordinates>
</LinearRing></outerBoundaryIs></Polygon></Placemark>"#,
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_polygon());
    }

    #[test]
    fn test_invalid_polygon_falls_back_to_point() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            r#"<Placemark><name>Fallback</name>
<Point><coordinates>9,9</coordinates></Point>
<Polygon><outerBoundaryIs><LinearRing>
  <coordinates>0,0 1,1</coordinates>
</LinearRing></outerBoundaryIs></Polygon></Placemark>"#,
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_point(), Some(&Point::new(9.0, 9.0)));
    }

    #[test]
    fn test_namespaced_elements_are_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml:kml xmlns:kml="http://www.opengis.net/kml/2.2">
  <kml:Document>
    <kml:Placemark>
      <kml:name>Prefixed</kml:name>
      <kml:Point><kml:coordinates>7.0,8.0</kml:coordinates></kml:Point>
    </kml:Placemark>
  </kml:Document>
</kml:kml>"#;
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Prefixed");
        assert_eq!(records[0].as_point(), Some(&Point::new(7.0, 8.0)));
    }

    #[test]
    fn test_cdata_description() {
        let dir = tempfile::tempdir().unwrap();
        let doc = kml_document(
            r#"<Placemark>
  <name>Tower B</name>
  <description><![CDATA[<b>South mast</b>]]></description>
  <Point><coordinates>1,1</coordinates></Point>
</Placemark>"#,
        );
        let path = write_archive(dir.path(), "towers.kmz", &[("doc.kml", &doc)]);

        let records = load_kmz(&path).unwrap();
        assert_eq!(records[0].description, "<b>South mast</b>");
    }
}
