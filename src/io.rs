//! File I/O for the CLI driver (C11): loading facilities, boundaries,
//! districts and road graphs from disk, and writing the §6 output contract
//! to a file or stdout. This is glue, not geometry - every geometric
//! decision lives in the engine modules this dispatches into.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::FeatureCollection;

use crate::population::District;
use crate::road_voronoi::RoadGraph;
use crate::types::{Facility, VoronoiCell};

pub fn read_facilities(path: &Path) -> Result<Vec<Facility>> {
    let text = fs::read_to_string(path).with_context(|| format!("read facilities file {}", path.display()))?;
    crate::output::parse_facilities(&text).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("parse facilities file {}", path.display()))
}

pub fn read_boundary_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read boundary file {}", path.display()))
}

#[derive(serde::Deserialize)]
struct RawDistrict {
    state: String,
    district: String,
    population: i64,
    geometry: geojson::Geometry,
}

/// Loads a districts/population file: a JSON array of
/// `{ state, district, population, geometry }` records (§4.5, §6).
pub fn read_districts(path: &Path) -> Result<Vec<District>> {
    let text = fs::read_to_string(path).with_context(|| format!("read districts file {}", path.display()))?;
    let raw: Vec<RawDistrict> = serde_json::from_str(&text).with_context(|| format!("parse districts file {}", path.display()))?;

    raw.into_iter()
        .map(|r| {
            let geom: geo::Geometry<f64> = geo::Geometry::try_from(&r.geometry.value)
                .map_err(|e| anyhow::anyhow!("invalid geometry for district {}/{}: {e}", r.state, r.district))?;
            let geometry = match geom {
                geo::Geometry::Polygon(p) => geo::MultiPolygon(vec![p]),
                geo::Geometry::MultiPolygon(mp) => mp,
                other => anyhow::bail!("district {}/{} geometry must be a polygon, got {other:?}", r.state, r.district),
            };
            Ok(District { state: r.state, district: r.district, population: r.population, geometry })
        })
        .collect()
}

#[derive(serde::Deserialize)]
struct RawRoadGraph {
    nodes: Vec<(f64, f64)>,
    edges: Vec<(u32, u32, f64)>,
}

/// Loads a road graph: `{ nodes: [[lng,lat]...], edges: [[a,b,weight]...] }`
/// (§4.8, §6), required for the road-graph and refinement flavours.
pub fn read_road_graph(path: &Path) -> Result<RoadGraph> {
    let text = fs::read_to_string(path).with_context(|| format!("read road graph file {}", path.display()))?;
    let raw: RawRoadGraph = serde_json::from_str(&text).with_context(|| format!("parse road graph file {}", path.display()))?;
    Ok(RoadGraph::new(raw.nodes, &raw.edges))
}

/// Loads a previously written feature collection back into cells, for the
/// `analytics` subcommand (§4.11).
pub fn read_diagram(path: &Path) -> Result<Vec<VoronoiCell>> {
    let text = fs::read_to_string(path).with_context(|| format!("read diagram file {}", path.display()))?;
    let geojson: geojson::GeoJson = text.parse().with_context(|| format!("parse diagram GeoJSON {}", path.display()))?;
    let fc = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        other => anyhow::bail!("expected a FeatureCollection in {}, got {other:?}", path.display()),
    };
    crate::output::from_feature_collection(&fc).map_err(|e| anyhow::anyhow!("{e}")).with_context(|| format!("reconstruct cells from {}", path.display()))
}

/// Writes `fc` to `out`, or to stdout when `out` is `None`.
pub fn write_feature_collection(fc: &FeatureCollection, out: Option<&Path>) -> Result<()> {
    let text = fc.to_string();
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
                }
            }
            fs::write(path, text).with_context(|| format!("write output file {}", path.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
