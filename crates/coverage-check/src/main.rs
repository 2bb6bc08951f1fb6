//! Coverage Check CLI
//!
//! Loads a KMZ coverage map once, then answers a single containment or
//! proximity query for the given coordinate. This binary owns startup,
//! configuration, and output formatting; all spatial logic lives in
//! `coverage-check-lib`.

use anyhow::Context;
use clap::Parser;
use coverage_check_lib::{Config, CoverageIndex, MatchKind, QueryResult, load_kmz};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "coverage-check", version, about)]
struct Cli {
    /// Path to the KMZ coverage archive
    #[arg(long, default_value = "towers.kmz")]
    archive: PathBuf,

    /// Tower proximity radius in kilometers
    #[arg(long, default_value_t = 5.0)]
    radius_km: f64,

    /// Latitude of the query point in degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the query point in degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Emit the result as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // A load failure is reported once; it must never panic.
    let records = load_kmz(&cli.archive).with_context(|| {
        format!(
            "coverage unavailable: could not load {}",
            cli.archive.display()
        )
    })?;

    if records.is_empty() {
        tracing::warn!("Archive loaded but contains no usable geometries");
    }

    let index = CoverageIndex::build(
        records,
        Config {
            radius_km: cli.radius_km,
        },
    );

    let result = index.query(cli.lat, cli.lon);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&result))?);
    } else {
        print!("{}", render_text(&result));
    }

    Ok(())
}

fn match_kind_label(kind: MatchKind) -> Option<&'static str> {
    match kind {
        MatchKind::None => None,
        MatchKind::PolygonContainment => Some("Inside Polygon Coverage"),
        MatchKind::PointProximity => Some("Tower Proximity"),
    }
}

fn render_text(result: &QueryResult) -> String {
    let mut out = String::new();
    out.push_str(if result.covered {
        "covered: yes\n"
    } else {
        "covered: no\n"
    });
    if let Some(label) = match_kind_label(result.match_kind) {
        out.push_str(&format!("match: {label}\n"));
    }
    if let Some(record) = &result.matched {
        out.push_str(&format!("name: {}\n", record.name));
        if !record.description.is_empty() {
            out.push_str(&format!("description: {}\n", record.description));
        }
    }
    if let Some(km) = result.distance_km {
        out.push_str(&format!("distance: {km:.2} km\n"));
    }
    out
}

fn to_json(result: &QueryResult) -> serde_json::Value {
    serde_json::json!({
        "covered": result.covered,
        "match_kind": match_kind_label(result.match_kind),
        "name": result.matched.as_ref().map(|r| r.name.clone()),
        "description": result.matched.as_ref().map(|r| r.description.clone()),
        "distance_km": result.distance_km,
    })
}
