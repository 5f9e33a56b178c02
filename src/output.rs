//! The §6 output contract: rendering computed cells as a GeoJSON
//! `FeatureCollection`, one feature per cell, in the order the cells were
//! produced (which matches generator-index order for every diagram flavour).

use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};

use crate::error::{EngineError, Result};
use crate::types::VoronoiCell;

/// Converts `cells` into a GeoJSON `FeatureCollection` per §6: each feature's
/// `id` is the facility id, its `properties` is the cell's property bag
/// serialized verbatim (so unknown/mode-specific keys pass through), and its
/// geometry is the cell's planar polygon reprojected back to WGS84.
pub fn to_feature_collection(cells: &[VoronoiCell]) -> Result<FeatureCollection> {
    let features = cells.iter().map(to_feature).collect::<Result<Vec<_>>>()?;
    Ok(FeatureCollection { bbox: None, features, foreign_members: None })
}

fn to_feature(cell: &VoronoiCell) -> Result<Feature> {
    let properties = serde_json::to_value(&cell.properties)
        .map_err(|e| EngineError::Internal(format!("failed to serialize cell properties: {e}")))?;
    let properties = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&cell.geometry))),
        id: Some(Id::String(cell.facility_id.clone())),
        properties,
        foreign_members: None,
    })
}

/// Reconstructs cells from a previously written [`to_feature_collection`]
/// output, for the `analytics` CLI command's "operates on the current
/// diagram" entry point (§4.11).
pub fn from_feature_collection(fc: &FeatureCollection) -> Result<Vec<VoronoiCell>> {
    fc.features.iter().map(from_feature).collect()
}

fn from_feature(feature: &Feature) -> Result<VoronoiCell> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| EngineError::InvalidInput("diagram feature has no geometry".into()))?;
    let geom: geo::Geometry<f64> = geo::Geometry::try_from(&geometry.value)
        .map_err(|e| EngineError::InvalidInput(format!("diagram feature has invalid geometry: {e}")))?;
    let geometry = match geom {
        geo::Geometry::Polygon(p) => geo::MultiPolygon(vec![p]),
        geo::Geometry::MultiPolygon(mp) => mp,
        other => return Err(EngineError::InvalidInput(format!("diagram feature geometry must be a polygon, got {other:?}"))),
    };

    let properties = feature
        .properties
        .clone()
        .ok_or_else(|| EngineError::InvalidInput("diagram feature has no properties".into()))?;
    let properties: crate::types::CellProperties = serde_json::from_value(serde_json::Value::Object(properties))
        .map_err(|e| EngineError::InvalidInput(format!("diagram feature has malformed properties: {e}")))?;

    let facility_id = properties.facility_id.clone();
    Ok(VoronoiCell { facility_id, properties, geometry })
}

/// Parses a facility input file: a JSON array of `{ id?, name, lat, lng,
/// type? }` records (§6). Missing `id` is derived from array position.
pub fn parse_facilities(json_text: &str) -> Result<Vec<crate::types::Facility>> {
    #[derive(serde::Deserialize)]
    struct RawFacility {
        id: Option<String>,
        name: String,
        lat: f64,
        lng: f64,
        #[serde(rename = "type")]
        kind: Option<String>,
    }

    let raw: Vec<RawFacility> =
        serde_json::from_str(json_text).map_err(|e| EngineError::InvalidInput(format!("malformed facilities file: {e}")))?;

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| crate::types::Facility::new(r.id, r.name, r.kind, r.lat, r.lng, i))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellProperties, CellType};

    #[test]
    fn round_trips_a_cell_into_a_feature() {
        let cell = VoronoiCell {
            facility_id: "f1".to_string(),
            properties: CellProperties {
                name: "Clinic".to_string(),
                facility_id: "f1".to_string(),
                kind: None,
                area_sq_km: 12.5,
                centroid_lng: 77.2,
                centroid_lat: 28.6,
                population: Some(1000),
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry: geo::MultiPolygon(vec![geo::Polygon::new(
                geo::LineString(vec![
                    geo::coord! { x: 0.0, y: 0.0 },
                    geo::coord! { x: 1.0, y: 0.0 },
                    geo::coord! { x: 1.0, y: 1.0 },
                    geo::coord! { x: 0.0, y: 0.0 },
                ]),
                vec![],
            )]),
        };
        let fc = to_feature_collection(&[cell]).unwrap();
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].id, Some(Id::String("f1".to_string())));
        assert!(fc.features[0].properties.as_ref().unwrap().contains_key("population"));
    }

    #[test]
    fn parses_facilities_deriving_missing_ids() {
        let json = r#"[{"name":"A","lat":1.0,"lng":2.0},{"id":"x","name":"B","lat":3.0,"lng":4.0}]"#;
        let facilities = parse_facilities(json).unwrap();
        assert_eq!(facilities[0].id, "0");
        assert_eq!(facilities[1].id, "x");
    }

    #[test]
    fn feature_collection_round_trips_back_into_cells() {
        let cell = VoronoiCell {
            facility_id: "f1".to_string(),
            properties: CellProperties {
                name: "Clinic".to_string(),
                facility_id: "f1".to_string(),
                kind: None,
                area_sq_km: 12.5,
                centroid_lng: 77.2,
                centroid_lat: 28.6,
                population: Some(1000),
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry: geo::MultiPolygon(vec![geo::Polygon::new(
                geo::LineString(vec![
                    geo::coord! { x: 0.0, y: 0.0 },
                    geo::coord! { x: 1.0, y: 0.0 },
                    geo::coord! { x: 1.0, y: 1.0 },
                    geo::coord! { x: 0.0, y: 0.0 },
                ]),
                vec![],
            )]),
        };
        let fc = to_feature_collection(&[cell]).unwrap();
        let cells = from_feature_collection(&fc).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].facility_id, "f1");
        assert_eq!(cells[0].properties.population, Some(1000));
    }
}
