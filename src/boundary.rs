//! Loads and caches administrative boundaries (country + first-level states)
//! from a GeoJSON file (C2).

use std::collections::HashMap;

use geo::{BooleanOps, Buffer, MultiPolygon, Polygon, Rect};

use crate::error::{EngineError, Result};
use crate::projection::Projection;

const NAME_KEYS: &[&str] = &["state", "name", "NAME_1"];

/// A single named boundary polygon, kept in geographic coordinates.
#[derive(Clone, Debug)]
pub struct NamedBoundary {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Country + first-level administrative boundaries, loaded once and reused
/// across computations.
pub struct BoundaryStore {
    states: Vec<NamedBoundary>,
    by_name: HashMap<String, usize>,
    country_geo: MultiPolygon<f64>,
    fallback_bbox: Option<Rect<f64>>,
}

impl BoundaryStore {
    /// Loads states from a GeoJSON `FeatureCollection` whose features carry a
    /// name property (`state`, `name`, or `NAME_1`, matched case-insensitively).
    /// The country boundary is the buffer-repaired union of every state.
    pub fn load(geojson_text: &str) -> Result<Self> {
        let geojson: geojson::GeoJson = geojson_text
            .parse()
            .map_err(|e| EngineError::Internal(format!("invalid boundary GeoJSON: {e}")))?;

        let collection = match geojson {
            geojson::GeoJson::FeatureCollection(fc) => fc,
            other => {
                return Err(EngineError::Internal(format!(
                    "expected a GeoJSON FeatureCollection for boundaries, got {other:?}"
                )))
            }
        };

        let mut states = Vec::with_capacity(collection.features.len());
        for feature in &collection.features {
            let Some(geometry) = feature.geometry.as_ref() else {
                continue;
            };
            let name = name_of(feature).unwrap_or_else(|| format!("unnamed-{}", states.len()));
            let geom: geo::Geometry<f64> = match geo::Geometry::try_from(&geometry.value) {
                Ok(g) => g,
                Err(_) => continue,
            };
            let Some(mp) = as_multi_polygon(geom) else { continue };
            states.push(NamedBoundary { name, geometry: repair(&mp) });
        }

        if states.is_empty() {
            return Err(EngineError::NoData("boundary file contained no polygon features".into()));
        }

        let by_name = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.to_lowercase(), i))
            .collect();

        let country_geo = dissolve(&states);

        Ok(Self { states, by_name, country_geo, fallback_bbox: None })
    }

    /// Builds a store that has no boundary data at all; every lookup falls
    /// back to a computed bounding box. Used when the boundary file is
    /// missing (logged by the caller, not fatal per §4.2).
    pub fn fallback(bbox: Rect<f64>) -> Self {
        Self {
            states: Vec::new(),
            by_name: HashMap::new(),
            country_geo: MultiPolygon(vec![bbox.to_polygon()]),
            fallback_bbox: Some(bbox),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_bbox.is_some()
    }

    /// The country boundary in geographic (WGS84) coordinates.
    pub fn country_geo(&self) -> &MultiPolygon<f64> {
        &self.country_geo
    }

    /// The country boundary projected to the given planar CRS, buffer-repaired.
    pub fn country_planar(&self, projection: &Projection) -> Result<MultiPolygon<f64>> {
        let planar = projection.project_multi_polygon(&self.country_geo)?;
        Ok(repair(&planar))
    }

    /// Looks up a state boundary by case-insensitive exact name match.
    pub fn state(&self, name: &str) -> Result<&NamedBoundary> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.states[i])
            .ok_or_else(|| EngineError::BoundaryNotFound(name.to_string()))
    }

    pub fn state_planar(&self, name: &str, projection: &Projection) -> Result<MultiPolygon<f64>> {
        let state = self.state(name)?;
        let planar = projection.project_multi_polygon(&state.geometry)?;
        Ok(repair(&planar))
    }

    pub fn states(&self) -> &[NamedBoundary] {
        &self.states
    }
}

fn name_of(feature: &geojson::Feature) -> Option<String> {
    let props = feature.properties.as_ref()?;
    for key in NAME_KEYS {
        if let Some(v) = props.get(*key) {
            if let Some(s) = v.as_str() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn as_multi_polygon(geom: geo::Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

/// Repairs a geometry via zero-width buffering, the standard self-intersection
/// fix (§3, §4.2, §4.3).
pub fn repair(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    mp.buffer(0.0)
}

pub fn repair_polygon(p: &Polygon<f64>) -> MultiPolygon<f64> {
    p.buffer(0.0)
}

fn dissolve(states: &[NamedBoundary]) -> MultiPolygon<f64> {
    let mut union = MultiPolygon(vec![]);
    for state in states {
        union = union.union(&state.geometry);
    }
    repair(&union)
}

/// A padded bounding box around a set of geographic points, used as the
/// fallback clip region when no boundary file is supplied (§4.2).
pub fn padded_bbox(points: &[(f64, f64)], min_extent_deg: f64, pad_fraction: f64) -> Rect<f64> {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for &(lng, lat) in points {
        min_x = min_x.min(lng);
        max_x = max_x.max(lng);
        min_y = min_y.min(lat);
        max_y = max_y.max(lat);
    }
    let width = (max_x - min_x).max(min_extent_deg);
    let height = (max_y - min_y).max(min_extent_deg);
    let pad_x = width * pad_fraction;
    let pad_y = height * pad_fraction;
    Rect::new(
        geo::coord! { x: min_x - pad_x, y: min_y - pad_y },
        geo::coord! { x: max_x + pad_x, y: max_y + pad_y },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_feature(name: &str, min: (f64, f64), max: (f64, f64)) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"state":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{minx},{miny}],[{maxx},{miny}],[{maxx},{maxy}],[{minx},{maxy}],[{minx},{miny}]]]}}}}"#,
            name = name, minx = min.0, miny = min.1, maxx = max.0, maxy = max.1
        )
    }

    fn two_state_collection() -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square_feature("Alpha", (0.0, 0.0), (1.0, 1.0)),
            square_feature("Beta", (1.0, 0.0), (2.0, 1.0)),
        )
    }

    #[test]
    fn loads_named_states_case_insensitively() {
        let store = BoundaryStore::load(&two_state_collection()).unwrap();
        assert!(store.state("alpha").is_ok());
        assert!(store.state("BETA").is_ok());
        assert!(matches!(store.state("gamma"), Err(EngineError::BoundaryNotFound(_))));
    }

    #[test]
    fn country_is_union_of_states() {
        let store = BoundaryStore::load(&two_state_collection()).unwrap();
        use geo::Area;
        assert!((store.country_geo().unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fallback_bbox_has_minimum_extent() {
        let bbox = padded_bbox(&[(10.0, 10.0)], 1.0, 0.5);
        assert!(bbox.width() >= 1.0);
        assert!(bbox.height() >= 1.0);
    }
}
