//! Attributes district population to Voronoi cells by area-ratio overlap (C5).

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::Result;
use crate::projection::Projection;
use crate::types::{CellProperties, PopulationContribution, VoronoiCell};

/// A population-bearing administrative district, as loaded from the
/// districts/population input file.
#[derive(Clone, Debug)]
pub struct District {
    pub state: String,
    pub district: String,
    pub population: i64,
    pub geometry: MultiPolygon<f64>,
}

struct IndexedDistrict {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for IndexedDistrict {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Attributes population from `districts` to each of `cells`, projecting both
/// to a shared planar CRS and weighting by intersection-area ratio.
///
/// An empty `districts` slice yields every cell with zero population and an
/// empty breakdown rather than an error (§4.5 contract).
pub fn attribute_population(cells: &mut [VoronoiCell], districts: &[District]) -> Result<()> {
    if districts.is_empty() {
        for cell in cells.iter_mut() {
            apply(&mut cell.properties, 0, Vec::new());
        }
        return Ok(());
    }

    let site_coords: Vec<(f64, f64)> = cells.iter().map(|c| (c.properties.centroid_lng, c.properties.centroid_lat)).collect();
    let projection = Projection::for_points(site_coords.iter())?;

    let planar_districts: Vec<MultiPolygon<f64>> =
        districts.iter().map(|d| projection.project_multi_polygon(&d.geometry)).collect::<Result<Vec<_>>>()?;

    let rtree = RTree::bulk_load(
        planar_districts
            .iter()
            .enumerate()
            .filter_map(|(idx, mp)| mp.bounding_rect().map(|bbox| IndexedDistrict { idx, bbox }))
            .collect(),
    );

    for cell in cells.iter_mut() {
        let planar_cell = projection.project_multi_polygon(&cell.geometry)?;
        let Some(bbox) = planar_cell.bounding_rect() else {
            apply(&mut cell.properties, 0, Vec::new());
            continue;
        };
        let env = AABB::from_corners(bbox.min().into(), bbox.max().into());

        let mut breakdown = Vec::new();
        let mut total: i64 = 0;

        for candidate in rtree.locate_in_envelope_intersecting(&env) {
            let district = &districts[candidate.idx];
            let district_geom = &planar_districts[candidate.idx];
            let district_area = district_geom.unsigned_area();
            if district_area <= 0.0 {
                continue;
            }

            let intersection = planar_cell.intersection(district_geom);
            let intersection_area = intersection.unsigned_area();
            if intersection_area <= 0.0 {
                continue;
            }

            let ratio = intersection_area / district_area;
            let contributed = (district.population as f64 * ratio).trunc() as i64;
            if contributed <= 0 {
                continue;
            }

            total += contributed;
            breakdown.push(PopulationContribution {
                state: district.state.clone(),
                district: district.district.clone(),
                intersection_area_km2: intersection_area / 1_000_000.0,
                overlap_percentage: ratio * 100.0,
                contributed_population: contributed,
            });
        }

        breakdown.sort_by(|a, b| b.contributed_population.cmp(&a.contributed_population));
        breakdown.truncate(5);

        apply(&mut cell.properties, total, breakdown);
    }

    Ok(())
}

fn apply(properties: &mut CellProperties, total: i64, breakdown: Vec<PopulationContribution>) {
    properties.population = Some(total);
    properties.population_breakdown = breakdown;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellType;

    fn square(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![geo::Polygon::new(
            geo::LineString(vec![
                geo::coord! { x: min, y: min },
                geo::coord! { x: max, y: min },
                geo::coord! { x: max, y: max },
                geo::coord! { x: min, y: max },
                geo::coord! { x: min, y: min },
            ]),
            vec![],
        )])
    }

    fn cell(id: &str, min: f64, max: f64) -> VoronoiCell {
        VoronoiCell {
            facility_id: id.to_string(),
            properties: CellProperties {
                name: id.to_string(),
                facility_id: id.to_string(),
                kind: None,
                area_sq_km: (max - min) * (max - min),
                centroid_lng: (min + max) / 2.0,
                centroid_lat: (min + max) / 2.0,
                population: None,
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry: square(min, max),
        }
    }

    #[test]
    fn no_districts_yields_zero_population() {
        let mut cells = vec![cell("a", 0.0, 1.0)];
        attribute_population(&mut cells, &[]).unwrap();
        assert_eq!(cells[0].properties.population, Some(0));
        assert!(cells[0].properties.population_breakdown.is_empty());
    }

    #[test]
    fn full_overlap_attributes_whole_population() {
        let mut cells = vec![cell("a", 0.0, 1.0)];
        let districts = vec![District {
            state: "Alpha".into(),
            district: "Alpha-1".into(),
            population: 1000,
            geometry: square(0.0, 1.0),
        }];
        attribute_population(&mut cells, &districts).unwrap();
        let pop = cells[0].properties.population.unwrap();
        assert!(pop > 900, "expected near-full attribution, got {pop}");
        assert_eq!(cells[0].properties.population_breakdown.len(), 1);
    }

    #[test]
    fn disjoint_district_contributes_nothing() {
        let mut cells = vec![cell("a", 0.0, 1.0)];
        let districts =
            vec![District { state: "Beta".into(), district: "Beta-1".into(), population: 500, geometry: square(10.0, 11.0) }];
        attribute_population(&mut cells, &districts).unwrap();
        assert_eq!(cells[0].properties.population, Some(0));
    }
}
