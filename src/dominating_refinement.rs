//! Local road-distance refinement of an Euclidean tessellation over a
//! dominating set of its cell-adjacency graph, with Delaunay-triangulated
//! majority-vote polygonisation and Euclidean fallback (C9).

use std::collections::{HashMap, HashSet};

use geo::{Area, BooleanOps, BoundingRect, Contains, MultiPoint, MultiPolygon, Point, Polygon, TriangulateDelaunayUnconstrained};

use crate::dcel::Dcel;
use crate::error::Result;
use crate::projection::Projection;
use crate::routing::RoutingOracle;
use crate::types::{AdvancedOptions, CellType, Facility, VoronoiCell};

/// Run summary mirrored alongside the feature collection (§4.9 supplement).
#[derive(Clone, Debug)]
pub struct RefinementSummary {
    /// Facility ids chosen as dominating-set centres, in selection order.
    pub dominating_set: Vec<String>,
    pub regions_processed: usize,
    pub total_grid_points: usize,
    pub routing_queries: usize,
}

/// The output of [`refine`]: the merged feature collection plus its summary.
pub struct RefinementResult {
    pub cells: Vec<VoronoiCell>,
    pub summary: RefinementSummary,
}

/// Greedy maximum-coverage dominating set over `adjacency`, iterating
/// candidates in ascending facility-id order so ties resolve deterministically.
fn dominating_set(node_ids: &[String], adjacency: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut covered: HashSet<&str> = HashSet::new();
    let mut chosen = Vec::new();

    while covered.len() < node_ids.len() {
        let mut best: Option<(&str, usize)> = None;
        for id in node_ids {
            if covered.contains(id.as_str()) {
                continue;
            }
            let neighbours = adjacency.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let new_count = 1 + neighbours.iter().filter(|n| !covered.contains(n.as_str())).count();
            match best {
                Some((_, best_count)) if new_count <= best_count => {}
                _ => best = Some((id.as_str(), new_count)),
            }
        }
        let Some((centre, _)) = best else { break };
        covered.insert(centre);
        if let Some(neighbours) = adjacency.get(centre) {
            for n in neighbours {
                covered.insert(n.as_str());
            }
        }
        chosen.push(centre.to_string());
    }
    chosen
}

fn snap(c: geo::Coord<f64>) -> (i64, i64) {
    const SCALE: f64 = 1e6;
    ((c.x * SCALE).round() as i64, (c.y * SCALE).round() as i64)
}

/// Labels every Delaunay triangle of `points` by majority vote of its three
/// vertex assignments (`assignment[i]` is the facility index owning
/// `points[i]`), then dissolves same-label triangles into one polygon per label.
fn triangulate_and_label(points: &[(f64, f64)], assignment: &[usize]) -> HashMap<usize, MultiPolygon<f64>> {
    let mut by_label: HashMap<usize, MultiPolygon<f64>> = HashMap::new();
    if points.len() < 3 {
        return by_label;
    }

    let mut index_of: HashMap<(i64, i64), usize> = HashMap::with_capacity(points.len());
    let coords: Vec<geo::Coord<f64>> = points
        .iter()
        .map(|&(x, y)| {
            let c = geo::coord! { x: x, y: y };
            let next = index_of.len();
            index_of.entry(snap(c)).or_insert(next);
            c
        })
        .collect();

    let multi_point = MultiPoint::from(coords.iter().map(|&c| Point::from(c)).collect::<Vec<_>>());
    let Ok(triangles) = multi_point.unconstrained_triangulation() else {
        return by_label;
    };

    for tri in triangles {
        let verts = tri.to_array();
        let mut labels = [0usize; 3];
        let mut ok = true;
        for (slot, v) in labels.iter_mut().zip(verts.iter()) {
            match index_of.get(&snap(*v)) {
                Some(&i) => *slot = assignment[i],
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        // Majority label: any value shared by >= 2 vertices wins; an
        // all-distinct triangle is labelled by its lowest-index vertex,
        // matching the facility-index tie-break used throughout the engine.
        let label = if labels[0] == labels[1] || labels[0] == labels[2] {
            labels[0]
        } else if labels[1] == labels[2] {
            labels[1]
        } else {
            *labels.iter().min().unwrap()
        };

        let triangle_poly = MultiPolygon(vec![tri.to_polygon()]);
        by_label
            .entry(label)
            .and_modify(|acc| *acc = acc.union(&triangle_poly))
            .or_insert(triangle_poly);
    }

    by_label
}

/// Samples a regular planar grid of up to `density * density` points inside
/// `region`, keeping only points that actually fall inside it.
fn sample_region(region: &MultiPolygon<f64>, density: usize) -> Vec<(f64, f64)> {
    let Some(bbox) = region.bounding_rect() else { return Vec::new() };
    let density = density.max(2);
    let step_x = bbox.width() / (density as f64 - 1.0);
    let step_y = bbox.height() / (density as f64 - 1.0);
    let mut points = Vec::new();
    for row in 0..density {
        for col in 0..density {
            let x = bbox.min().x + col as f64 * step_x;
            let y = bbox.min().y + row as f64 * step_y;
            if region.contains(&Point::new(x, y)) {
                points.push((x, y));
            }
        }
    }
    points
}

/// Refines `euclidean_cells` (the already-clipped output of
/// [`crate::voronoi::compute_voronoi`]) by reassigning points inside 1-hop
/// neighbourhoods of a dominating set using road distances from `oracle`.
///
/// Facilities whose local reassignment never observed a single connected
/// road-distance query are reported as `euclidean_fallback`, matching the
/// "oracle disabled" scenario where refinement degenerates to the original
/// Euclidean diagram (§4.9 E7).
pub fn refine(
    facilities: &[Facility],
    euclidean_cells: &[VoronoiCell],
    boundary_geo: &MultiPolygon<f64>,
    oracle: &dyn RoutingOracle,
    opts: &AdvancedOptions,
) -> Result<RefinementResult> {
    let dcel = Dcel::build(euclidean_cells.to_vec())?;

    let site_coords: Vec<(f64, f64)> = facilities.iter().map(|f| (f.lng, f.lat)).collect();
    let projection = Projection::for_points(site_coords.iter())?;
    let boundary_planar = crate::boundary::repair(&projection.project_multi_polygon(boundary_geo)?);

    let index_by_id: HashMap<&str, usize> = facilities.iter().enumerate().map(|(i, f)| (f.id.as_str(), i)).collect();
    let planar_by_id: HashMap<&str, (f64, f64)> = facilities
        .iter()
        .map(|f| (f.id.as_str(), projection.project(f.lng, f.lat)))
        .map(|(id, p)| p.map(|p| (id, p)))
        .collect::<Result<HashMap<_, _>>>()?;

    let node_ids: Vec<String> = {
        let mut ids: Vec<String> = euclidean_cells.iter().map(|c| c.facility_id.clone()).collect();
        ids.sort();
        ids
    };
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for id in &node_ids {
        let neighbours = dcel.adjacent(id)?.into_iter().map(|c| c.facility_id.clone()).collect();
        adjacency.insert(id.clone(), neighbours);
    }

    let centres = dominating_set(&node_ids, &adjacency);

    let mut refined_by_facility: HashMap<usize, MultiPolygon<f64>> = HashMap::new();
    let mut connected_once: HashSet<usize> = HashSet::new();
    let mut grid_points_for: HashMap<usize, usize> = HashMap::new();

    let mut regions_processed = 0usize;
    let mut total_grid_points = 0usize;
    let mut routing_queries = 0usize;

    for centre in &centres {
        let mut members: Vec<String> = vec![centre.clone()];
        members.extend(adjacency.get(centre).cloned().unwrap_or_default());
        members.sort();
        members.dedup();

        let mut region_planar = MultiPolygon(vec![]);
        for member in &members {
            if let Some(cell) = dcel.cell(member) {
                let planar = projection.project_multi_polygon(&cell.geometry)?;
                region_planar = region_planar.union(&planar);
            }
        }
        let region_planar = region_planar.intersection(&boundary_planar);
        if region_planar.0.is_empty() {
            continue;
        }

        let member_coords: Vec<(usize, (f64, f64))> = members
            .iter()
            .filter_map(|m| index_by_id.get(m.as_str()).zip(planar_by_id.get(m.as_str())))
            .map(|(&i, &p)| (i, p))
            .collect();
        if member_coords.len() < 2 {
            continue;
        }

        let grid = sample_region(&region_planar, opts.samples_per_edge.max(4));
        if grid.is_empty() {
            continue;
        }
        total_grid_points += grid.len();
        regions_processed += 1;

        let dst_coords: Vec<(f64, f64)> = member_coords.iter().map(|&(_, p)| p).collect();
        let mut assignment = Vec::with_capacity(grid.len());

        for batch in grid.chunks(opts.batch_size.max(1)) {
            for &point in batch {
                let nearest_euclid = member_coords
                    .iter()
                    .map(|&(i, (sx, sy))| (i, (sx - point.0).powi(2) + (sy - point.1).powi(2)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(i, _)| i)
                    .expect("member_coords is non-empty");

                let table = oracle.table(point, &dst_coords);
                routing_queries += table.len();

                let best = member_coords
                    .iter()
                    .zip(table.iter())
                    .filter(|(_, r)| r.connected)
                    .min_by(|(_, a), (_, b)| a.distance_km.total_cmp(&b.distance_km))
                    .map(|(&(i, _), _)| i);

                match best {
                    Some(i) => {
                        connected_once.insert(i);
                        assignment.push(i);
                    }
                    None => assignment.push(nearest_euclid),
                }
            }
        }

        let by_label = triangulate_and_label(&grid, &assignment);
        for (label, poly) in by_label {
            let clipped = poly.intersection(&region_planar);
            if clipped.unsigned_area() <= 0.0 {
                continue;
            }
            *grid_points_for.entry(label).or_insert(0) += grid.len();
            refined_by_facility
                .entry(label)
                .and_modify(|acc| *acc = acc.union(&clipped))
                .or_insert(clipped);
        }
    }

    let euclidean_by_id: HashMap<&str, &VoronoiCell> = euclidean_cells.iter().map(|c| (c.facility_id.as_str(), c)).collect();

    let mut out = Vec::with_capacity(facilities.len());
    for (i, facility) in facilities.iter().enumerate() {
        let Some(&baseline) = euclidean_by_id.get(facility.id.as_str()) else {
            continue;
        };

        let use_refined = connected_once.contains(&i) && refined_by_facility.get(&i).is_some_and(|mp| mp.unsigned_area() > 0.0);

        if use_refined {
            let planar = &refined_by_facility[&i];
            let clipped = planar.intersection(&boundary_planar);
            let area_km2 = clipped.unsigned_area() / 1_000_000.0;
            if area_km2 <= 0.0 {
                out.push(clone_with_type(baseline, CellType::EuclideanFallback, None));
                continue;
            }
            let geometry = projection.unproject_multi_polygon(&clipped)?;
            let mut cell = baseline.clone();
            cell.properties.area_sq_km = area_km2;
            cell.properties.cell_type = Some(CellType::RoadRefined);
            cell.properties.grid_points_count = grid_points_for.get(&i).copied();
            cell.geometry = geometry;
            out.push(cell);
        } else {
            out.push(clone_with_type(baseline, CellType::EuclideanFallback, None));
        }
    }

    Ok(RefinementResult {
        cells: out,
        summary: RefinementSummary { dominating_set: centres, regions_processed, total_grid_points, routing_queries },
    })
}

fn clone_with_type(cell: &VoronoiCell, cell_type: CellType, grid_points: Option<usize>) -> VoronoiCell {
    let mut cell = cell.clone();
    cell.properties.cell_type = Some(cell_type);
    cell.properties.grid_points_count = grid_points;
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::NullOracle;
    use crate::types::Facility;
    use crate::voronoi::compute_voronoi;

    fn facility(id: &str, lng: f64, lat: f64) -> Facility {
        Facility::new(Some(id.to_string()), id.to_string(), None, lat, lng, 0)
    }

    fn grid_facilities() -> Vec<Facility> {
        let mut out = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                let id = format!("f{row}{col}");
                out.push(facility(&id, 77.0 + col as f64 * 0.1, 28.0 + row as f64 * 0.1));
            }
        }
        out
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
    fn disabled_oracle_falls_back_for_every_facility() {
        let facilities = grid_facilities();
        let boundary = square_boundary(76.8, 77.3);
        let euclidean = compute_voronoi(&facilities, &boundary).unwrap();

        let opts = AdvancedOptions { samples_per_edge: 6, batch_size: 10, ..Default::default() };
        let result = refine(&facilities, &euclidean, &boundary, &NullOracle, &opts).unwrap();

        assert_eq!(result.cells.len(), euclidean.len());
        assert!(result.cells.iter().all(|c| c.properties.cell_type == Some(CellType::EuclideanFallback)));
        assert!(result.summary.routing_queries > 0, "oracle should still have been queried");
    }

    #[test]
    fn dominating_set_covers_every_node() {
        let mut adjacency = HashMap::new();
        adjacency.insert("a".to_string(), vec!["b".to_string()]);
        adjacency.insert("b".to_string(), vec!["a".to_string(), "c".to_string()]);
        adjacency.insert("c".to_string(), vec!["b".to_string()]);
        let nodes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let set = dominating_set(&nodes, &adjacency);
        assert!(set.contains(&"b".to_string()));
    }
}
