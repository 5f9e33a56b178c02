//! Euclidean Voronoi diagram construction, unbounded-region reconstruction,
//! and clipping to an administrative boundary (C3).

use std::collections::HashMap;

use geo::{Area, BooleanOps, Buffer, Centroid, MultiPoint, MultiPolygon, Point, Polygon, Rect};
use geo::{Voronoi, VoronoiClip, VoronoiParams};

use crate::error::{EngineError, Result};
use crate::projection::Projection;
use crate::types::{CellProperties, CellType, Facility, VoronoiCell};

/// `R = max(10 * extent, 5e6 m)` per §4.3 step 3: the synthetic far radius
/// unbounded rays are extruded to before clipping.
fn far_radius(extent_m: f64) -> f64 {
    (10.0 * extent_m).max(5_000_000.0)
}

/// Computes the Euclidean Voronoi tessellation of `facilities`, clipped to
/// `clip_geo` (a boundary in geographic coordinates).
///
/// `N >= 3` generators are required (§4.3 edge cases).
pub fn compute_voronoi(facilities: &[Facility], clip_geo: &MultiPolygon<f64>) -> Result<Vec<VoronoiCell>> {
    if facilities.len() < 3 {
        return Err(EngineError::InvalidInput(format!(
            "need at least 3 generators, got {}",
            facilities.len()
        )));
    }
    for f in facilities {
        if !f.in_range() {
            return Err(EngineError::InvalidInput(format!(
                "facility {} has out-of-range coordinates ({}, {})",
                f.id, f.lat, f.lng
            )));
        }
    }

    let site_coords: Vec<(f64, f64)> = facilities.iter().map(|f| (f.lng, f.lat)).collect();
    let projection = Projection::for_points(site_coords.iter())?;

    let clip_planar = crate::boundary::repair(&projection.project_multi_polygon(clip_geo)?);

    let planar_sites: Vec<(f64, f64)> = facilities
        .iter()
        .map(|f| projection.project(f.lng, f.lat))
        .collect::<Result<Vec<_>>>()?;

    // Index sites by their planar coordinate so we can recover facility
    // identity after the Voronoi construction, which does not promise to
    // preserve input order internally.
    let mut by_coord: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, &(x, y)) in planar_sites.iter().enumerate() {
        by_coord.entry((x.to_bits(), y.to_bits())).or_default().push(i);
    }

    let extent = bounds_extent(&planar_sites);
    let radius = far_radius(extent);
    let (cx, cy) = centroid_of(&planar_sites);
    let big_box = Rect::new(
        geo::coord! { x: cx - radius, y: cy - radius },
        geo::coord! { x: cx + radius, y: cy + radius },
    )
    .to_polygon();

    let sites = MultiPoint::from(
        planar_sites
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect::<Vec<_>>(),
    );

    let raw_cells = sites
        .voronoi_cells_with_params(VoronoiParams::new().clip(VoronoiClip::Polygon(&big_box)))
        .map_err(|e| EngineError::Internal(format!("voronoi construction failed: {e}")))?;

    let mut cells: Vec<Option<VoronoiCell>> = vec![None; facilities.len()];

    for raw_cell in raw_cells {
        let Some(facility_index) = match_site(&raw_cell, &planar_sites, &mut by_coord) else {
            continue;
        };
        let facility = &facilities[facility_index];

        let repaired = repair_cell(&raw_cell);
        if repaired.unsigned_area() <= 0.0 {
            eprintln!("[voronoi] cell for {} degenerate after repair, skipped", facility.id);
            continue;
        }

        let clipped = clip_largest_piece(&repaired, &clip_planar);
        let Some(clipped) = clipped else {
            eprintln!("[voronoi] cell for {} empty after clip, skipped", facility.id);
            continue;
        };

        let area_km2 = clipped.unsigned_area() / 1_000_000.0;
        if area_km2 <= 0.0 {
            continue;
        }

        let geo_polygon = projection.unproject_multi_polygon(&MultiPolygon(vec![clipped]))?;

        cells[facility_index] = Some(VoronoiCell {
            facility_id: facility.id.clone(),
            properties: CellProperties {
                name: facility.name.clone(),
                facility_id: facility.id.clone(),
                kind: facility.kind.clone(),
                area_sq_km: area_km2,
                centroid_lng: facility.lng,
                centroid_lat: facility.lat,
                population: None,
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry: geo_polygon,
        });
    }

    Ok(cells.into_iter().flatten().collect())
}

/// Matches a raw Voronoi cell back to its generating facility by exact
/// planar-coordinate lookup on the site itself (recovered from the cell's
/// centroid being strictly closer to its own generator than any other
/// unclaimed generator - robust even when geo's internal face iteration
/// order does not match input order).
fn match_site(cell: &Polygon<f64>, sites: &[(f64, f64)], by_coord: &mut HashMap<(u64, u64), Vec<usize>>) -> Option<usize> {
    let centroid = cell.centroid()?;
    let mut best: Option<(usize, f64)> = None;
    for (&_key, indices) in by_coord.iter() {
        for &i in indices {
            let (sx, sy) = sites[i];
            let d2 = (sx - centroid.x()).powi(2) + (sy - centroid.y()).powi(2);
            if best.is_none_or(|(_, bd)| d2 < bd) {
                best = Some((i, d2));
            }
        }
    }
    let (i, _) = best?;
    let (sx, sy) = sites[i];
    let key = (sx.to_bits(), sy.to_bits());
    if let Some(indices) = by_coord.get_mut(&key) {
        indices.retain(|&x| x != i);
        if indices.is_empty() {
            by_coord.remove(&key);
        }
    }
    Some(i)
}

fn repair_cell(cell: &Polygon<f64>) -> Polygon<f64> {
    use geo::Validation;
    if cell.is_valid() {
        return cell.clone();
    }
    let buffered = cell.buffer(0.0);
    buffered.0.into_iter().next().unwrap_or_else(|| cell.clone())
}

/// Clips `cell` to `clip`, retaining the largest piece by area when the
/// intersection is a multi-polygon (§4.3 step 5).
fn clip_largest_piece(cell: &Polygon<f64>, clip: &MultiPolygon<f64>) -> Option<Polygon<f64>> {
    let mp = MultiPolygon(vec![cell.clone()]);
    let intersected = mp.intersection(clip);
    intersected
        .0
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

fn bounds_extent(points: &[(f64, f64)]) -> f64 {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    (max_x - min_x).max(max_y - min_y)
}

fn centroid_of(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(id: &str, lng: f64, lat: f64) -> Facility {
        Facility::new(Some(id.to_string()), id.to_string(), None, lat, lng, 0)
    }

    fn square_boundary(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
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

    #[test]
    fn too_few_generators_is_invalid_input() {
        let facilities = vec![facility("a", 0.0, 0.0), facility("b", 0.001, 0.0)];
        let boundary = square_boundary(-0.01, 0.01);
        assert!(matches!(
            compute_voronoi(&facilities, &boundary),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn three_generators_yield_three_cells() {
        let facilities = vec![
            facility("a", 77.20, 28.60),
            facility("b", 77.21, 28.60),
            facility("c", 77.205, 28.61),
        ];
        let boundary = square_boundary(77.0, 77.4);
        let cells = compute_voronoi(&facilities, &boundary).unwrap();
        assert_eq!(cells.len(), 3);
        for cell in &cells {
            assert!(cell.properties.area_sq_km > 0.0);
        }
    }

    #[test]
    fn out_of_range_coordinate_is_rejected() {
        let facilities = vec![
            facility("a", 0.0, 0.0),
            facility("b", 1.0, 0.0),
            facility("c", 200.0, 0.0),
        ];
        let boundary = square_boundary(-1.0, 2.0);
        assert!(matches!(
            compute_voronoi(&facilities, &boundary),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
