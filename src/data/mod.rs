use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::map::{LineString, SceneRenderer};

/// Coastline files, most detailed first. The first one found wins.
const COASTLINE_FILES: [&str; 3] = ["ne_10m_coastline.json", "ne_50m_coastline.json", "ne_110m_coastline.json"];
const BORDER_FILES: [&str; 2] = ["ne_10m_borders.json", "ne_50m_borders.json"];

/// Load Natural Earth coastlines and borders from `data_dir`.
///
/// Missing files are skipped; unreadable ones are logged. Returns the number
/// of lines added.
pub fn load_base_map(renderer: &mut SceneRenderer, data_dir: &Path) -> usize {
    let mut added = 0;

    if let Some(lines) = first_readable(data_dir, &COASTLINE_FILES) {
        added += lines.len();
        lines.into_iter().for_each(|line| renderer.add_coastline(line));
    }
    if let Some(lines) = first_readable(data_dir, &BORDER_FILES) {
        added += lines.len();
        lines.into_iter().for_each(|line| renderer.add_border(line));
    }

    if added > 0 {
        info!(lines = added, dir = %data_dir.display(), "loaded base map");
    }
    added
}

fn first_readable(data_dir: &Path, files: &[&str]) -> Option<Vec<LineString>> {
    files.iter().map(|name| data_dir.join(name)).filter(|path| path.exists()).find_map(|path| {
        match read_lines(&path) {
            Ok(lines) => Some(lines),
            Err(e) => {
                warn!(path = %path.display(), "skipping base map file: {e:#}");
                None
            }
        }
    })
}

fn read_lines(path: &Path) -> Result<Vec<LineString>> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    Ok(geojson_lines(&geojson))
}

/// Every line and polygon exterior in a GeoJSON document.
pub fn geojson_lines(geojson: &GeoJson) -> Vec<LineString> {
    let mut lines = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for geometry in fc.features.iter().filter_map(|f| f.geometry.as_ref()) {
                collect_lines(geometry, &mut lines);
            }
        }
        GeoJson::Feature(f) => {
            if let Some(geometry) = &f.geometry {
                collect_lines(geometry, &mut lines);
            }
        }
        GeoJson::Geometry(geometry) => collect_lines(geometry, &mut lines),
    }
    lines
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords.iter().filter(|c| c.len() >= 2).map(|c| (c[0], c[1])).collect()
}

fn collect_lines(geometry: &Geometry, out: &mut Vec<LineString>) {
    match &geometry.value {
        Value::LineString(coords) => out.push(to_line(coords)),
        Value::MultiLineString(lines) => out.extend(lines.iter().map(|l| to_line(l))),
        Value::Polygon(rings) => out.extend(rings.first().map(|r| to_line(r))),
        Value::MultiPolygon(polygons) => out.extend(polygons.iter().filter_map(|p| p.first()).map(|r| to_line(r))),
        Value::GeometryCollection(geometries) => geometries.iter().for_each(|g| collect_lines(g, out)),
        _ => {}
    }
}

/// Rough continent outlines for when no Natural Earth data is installed.
const FALLBACK_OUTLINES: &[&[(f64, f64)]] = &[
    // North America
    &[
        (-165.0, 64.0), (-140.0, 59.0), (-124.0, 47.0), (-117.0, 32.0), (-105.0, 22.0),
        (-97.0, 26.0), (-83.0, 29.0), (-80.0, 26.0), (-76.0, 36.0), (-70.0, 42.0),
        (-60.0, 46.0), (-56.0, 52.0), (-65.0, 60.0), (-82.0, 64.0), (-110.0, 69.0),
        (-140.0, 70.0), (-165.0, 64.0),
    ],
    // South America
    &[
        (-78.0, 8.0), (-60.0, 6.0), (-50.0, 0.0), (-35.0, -7.0), (-40.0, -22.0),
        (-53.0, -33.0), (-65.0, -42.0), (-70.0, -54.0), (-74.0, -44.0), (-71.0, -18.0),
        (-81.0, -4.0), (-78.0, 8.0),
    ],
    // Europe and Asia
    &[
        (-9.0, 37.0), (3.0, 43.0), (12.0, 44.0), (19.0, 40.0), (28.0, 41.0),
        (36.0, 36.0), (50.0, 30.0), (57.0, 25.0), (67.0, 24.0), (77.0, 8.0),
        (88.0, 22.0), (98.0, 16.0), (106.0, 10.0), (117.0, 23.0), (122.0, 31.0),
        (128.0, 38.0), (142.0, 46.0), (140.0, 56.0), (160.0, 62.0), (180.0, 68.0),
        (130.0, 73.0), (70.0, 73.0), (40.0, 67.0), (25.0, 71.0), (8.0, 63.0),
        (5.0, 58.0), (-4.0, 48.0), (-9.0, 43.0), (-9.0, 37.0),
    ],
    // Africa
    &[
        (-17.0, 21.0), (-8.0, 34.0), (10.0, 37.0), (32.0, 31.0), (43.0, 12.0),
        (51.0, 11.0), (40.0, -5.0), (35.0, -24.0), (20.0, -35.0), (12.0, -18.0),
        (9.0, 4.0), (-8.0, 4.0), (-17.0, 14.0), (-17.0, 21.0),
    ],
    // Australia
    &[
        (114.0, -22.0), (130.0, -12.0), (142.0, -11.0), (153.0, -26.0), (150.0, -37.0),
        (140.0, -38.0), (131.0, -31.0), (115.0, -34.0), (114.0, -22.0),
    ],
];

/// Add the built-in outlines to a renderer that has no coastlines yet.
pub fn generate_simple_world(renderer: &mut SceneRenderer) {
    for outline in FALLBACK_OUTLINES {
        renderer.add_coastline(outline.to_vec());
    }
}

/// Read an image catalog (JSON array of records) from disk.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let mut bytes = fs::read(path).with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog = Catalog::from_json_slice(&mut bytes)
        .with_context(|| format!("failed to decode catalog {}", path.display()))?;
    info!(records = catalog.len(), path = %path.display(), "loaded catalog");
    Ok(catalog)
}
