//! Facility-keyed spatial index over a computed diagram: point location,
//! range queries, adjacency, k-nearest, and population ranking (C4).
//!
//! The half-edge topology itself (`geograph::Dcel`) is materialised per cell
//! for structural queries and to satisfy the usual DCEL invariants
//! (`twin.twin == self`, `next.prev == self`) on each face's own boundary
//! cycle; cross-cell adjacency, which is what callers actually query, is
//! derived separately from a coordinate-snapped shared-edge index rather
//! than from half-edge traversal (following the same rook-contiguity
//! approach used by the boundary partition elsewhere in this crate).

use std::collections::HashMap;

use ahash::AHashMap;
use geo::{BoundingRect, Contains, Coord, Rect};
use geograph::{Dcel as TopoDcel, OUTER_FACE};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{EngineError, Result};
use crate::types::VoronoiCell;

struct IndexedFace {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for IndexedFace {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// A compact summary of one indexed face, for [`Dcel::to_dict`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceSummary {
    pub facility_id: String,
    pub name: String,
    pub population: Option<i64>,
    pub area_sq_km: f64,
}

/// The `to_dict()` response: total face count plus one summary per face.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DcelSummary {
    pub face_count: usize,
    pub faces: Vec<FaceSummary>,
}

/// A queryable index over the faces of a computed diagram, keyed by facility id.
pub struct Dcel {
    cells: Vec<VoronoiCell>,
    rtree: RTree<IndexedFace>,
    by_id: HashMap<String, usize>,
    adjacency: Vec<SmallVec<[usize; 6]>>,
    topology: TopoDcel<Coord<f64>>,
}

impl Dcel {
    /// Builds an index over `cells`. `cells` must be non-empty.
    pub fn build(cells: Vec<VoronoiCell>) -> Result<Self> {
        if cells.is_empty() {
            return Err(EngineError::NoData("no cells to index".into()));
        }

        let rtree = RTree::bulk_load(
            cells
                .iter()
                .enumerate()
                .filter_map(|(idx, c)| c.geometry.bounding_rect().map(|bbox| IndexedFace { idx, bbox }))
                .collect(),
        );

        let mut by_id = HashMap::with_capacity(cells.len());
        for (i, c) in cells.iter().enumerate() {
            by_id.insert(c.facility_id.clone(), i);
        }

        let adjacency = compute_adjacency(&cells);
        let topology = build_topology(&cells);

        Ok(Self { cells, rtree, by_id, adjacency, topology })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[VoronoiCell] {
        &self.cells
    }

    pub fn cell(&self, facility_id: &str) -> Option<&VoronoiCell> {
        self.by_id.get(facility_id).map(|&i| &self.cells[i])
    }

    /// The materialised half-edge topology (one boundary cycle per face).
    pub fn topology(&self) -> &TopoDcel<Coord<f64>> {
        &self.topology
    }

    /// Returns the unique face containing `(lat, lng)`, if any.
    pub fn point_query(&self, lat: f64, lng: f64) -> Option<&VoronoiCell> {
        let pt = geo::Point::new(lng, lat);
        let env = AABB::from_corners([lng, lat], [lng, lat]);
        self.rtree
            .locate_in_envelope_intersecting(&env)
            .map(|f| f.idx)
            .find(|&i| self.cells[i].geometry.contains(&pt))
            .map(|i| &self.cells[i])
    }

    /// Returns every face whose bounding box intersects the query box
    /// `(min_lat, min_lng)`..`(max_lat, max_lng)`.
    pub fn range_query(&self, min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Vec<&VoronoiCell> {
        let env = AABB::from_corners([min_lng, min_lat], [max_lng, max_lat]);
        self.rtree.locate_in_envelope_intersecting(&env).map(|f| &self.cells[f.idx]).collect()
    }

    /// Returns the faces sharing a border with `facility_id` (rook contiguity).
    pub fn adjacent(&self, facility_id: &str) -> Result<Vec<&VoronoiCell>> {
        let &i = self
            .by_id
            .get(facility_id)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown facility id: {facility_id}")))?;
        Ok(self.adjacency[i].iter().map(|&j| &self.cells[j]).collect())
    }

    /// The `k` faces nearest to `(lat, lng)` by centroid distance, nearest first.
    /// Ties break on facility id for determinism. `k` is capped at the face count.
    pub fn k_nearest(&self, lat: f64, lng: f64, k: usize) -> Vec<&VoronoiCell> {
        let k = k.min(self.cells.len());
        let mut by_dist: Vec<(f64, usize)> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let dlat = c.properties.centroid_lat - lat;
                let dlng = c.properties.centroid_lng - lng;
                (dlat * dlat + dlng * dlng, i)
            })
            .collect();
        by_dist.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| self.cells[a.1].facility_id.cmp(&self.cells[b.1].facility_id)));
        by_dist.into_iter().take(k).map(|(_, i)| &self.cells[i]).collect()
    }

    /// Widens `base_k` to `2 * base_k` when the query point's density appears
    /// anisotropic: the ratio between the farthest and nearest of the initial
    /// `base_k` neighbours exceeds `distortion_threshold`.
    pub fn adaptive_k(&self, lat: f64, lng: f64, base_k: usize, distortion_threshold: f64) -> (usize, Vec<&VoronoiCell>) {
        let probe = self.k_nearest(lat, lng, base_k.max(1));
        if probe.len() < 2 {
            return (base_k, probe);
        }
        let d_near = approx_km(lat, lng, probe[0]);
        let d_far = approx_km(lat, lng, probe[probe.len() - 1]);
        if d_near > 0.0 && d_far / d_near > distortion_threshold {
            let widened = base_k * 2;
            (widened, self.k_nearest(lat, lng, widened))
        } else {
            (base_k, probe)
        }
    }

    /// Up to `n` faces ordered by population descending (ties by facility id
    /// ascending), optionally restricted to faces with a population
    /// contribution from `state`.
    pub fn top_by_population(&self, n: usize, state: Option<&str>) -> Vec<&VoronoiCell> {
        let mut ranked: Vec<&VoronoiCell> = self
            .cells
            .iter()
            .filter(|c| {
                state.is_none_or(|s| c.properties.population_breakdown.iter().any(|b| b.state.eq_ignore_ascii_case(s)))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.properties
                .population
                .unwrap_or(0)
                .cmp(&a.properties.population.unwrap_or(0))
                .then_with(|| a.facility_id.cmp(&b.facility_id))
        });
        ranked.truncate(n);
        ranked
    }

    /// The `(lat, lng)` centroid of the named face, if it exists.
    pub fn centroid(&self, facility_id: &str) -> Option<(f64, f64)> {
        let &i = self.by_id.get(facility_id)?;
        let props = &self.cells[i].properties;
        Some((props.centroid_lat, props.centroid_lng))
    }

    pub fn to_dict(&self) -> DcelSummary {
        DcelSummary {
            face_count: self.cells.len(),
            faces: self
                .cells
                .iter()
                .map(|c| FaceSummary {
                    facility_id: c.facility_id.clone(),
                    name: c.properties.name.clone(),
                    population: c.properties.population,
                    area_sq_km: c.properties.area_sq_km,
                })
                .collect(),
        }
    }
}

fn approx_km(lat: f64, lng: f64, cell: &VoronoiCell) -> f64 {
    let dlat = (cell.properties.centroid_lat - lat) * 111.0;
    let dlng = (cell.properties.centroid_lng - lng) * 111.0 * lat.to_radians().cos();
    (dlat * dlat + dlng * dlng).sqrt()
}

type SnappedCoord = (i64, i64);

fn snap(c: Coord<f64>, scale: f64) -> SnappedCoord {
    ((c.x * scale).round() as i64, (c.y * scale).round() as i64)
}

/// Rook-contiguity adjacency via a coordinate-snapped shared-edge hash,
/// rather than a `relate()` scan: every boundary segment of every cell is
/// quantised and hashed, and any edge claimed by two or more faces joins them.
fn compute_adjacency(cells: &[VoronoiCell]) -> Vec<SmallVec<[usize; 6]>> {
    const SCALE: f64 = 1e7;

    let mut edge_to_faces: AHashMap<(SnappedCoord, SnappedCoord), SmallVec<[usize; 2]>> = AHashMap::default();
    for (i, cell) in cells.iter().enumerate() {
        for poly in &cell.geometry.0 {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                for seg in ring.lines() {
                    let mut p = snap(seg.start, SCALE);
                    let mut q = snap(seg.end, SCALE);
                    if p == q {
                        continue;
                    }
                    if p > q {
                        std::mem::swap(&mut p, &mut q);
                    }
                    let entry = edge_to_faces.entry((p, q)).or_default();
                    if entry.last() != Some(&i) {
                        entry.push(i);
                    }
                }
            }
        }
    }

    let mut adjacency = vec![SmallVec::new(); cells.len()];
    for faces in edge_to_faces.into_values() {
        for a in 0..faces.len() {
            for b in (a + 1)..faces.len() {
                adjacency[faces[a]].push(faces[b]);
                adjacency[faces[b]].push(faces[a]);
            }
        }
    }
    for nbrs in &mut adjacency {
        nbrs.sort_unstable();
        nbrs.dedup();
    }
    adjacency
}

/// Materialises one independent boundary cycle per face in the shared arena.
/// Twin half-edges all face `OUTER_FACE`: this crate's adjacency queries are
/// answered by [`compute_adjacency`], not by half-edge traversal, so no
/// cross-face welding is attempted here.
fn build_topology(cells: &[VoronoiCell]) -> TopoDcel<Coord<f64>> {
    let mut dcel = TopoDcel::new();
    for cell in cells {
        let face = dcel.add_face();
        for poly in &cell.geometry.0 {
            add_ring(&mut dcel, poly.exterior(), face);
            for hole in poly.interiors() {
                add_ring(&mut dcel, hole, face);
            }
        }
    }
    dcel
}

fn add_ring(dcel: &mut TopoDcel<Coord<f64>>, ring: &geo::LineString<f64>, face: geograph::FaceId) {
    let coords: Vec<Coord<f64>> = ring.coords().copied().collect();
    if coords.len() < 4 {
        return;
    }
    let n = coords.len() - 1; // closed ring: last coord duplicates the first
    let vids: Vec<_> = coords[..n].iter().map(|&c| dcel.add_vertex(c)).collect();
    let half_edges: Vec<_> = (0..n)
        .map(|i| dcel.add_edge(vids[i], vids[(i + 1) % n], face, OUTER_FACE).0)
        .collect();
    for i in 0..n {
        dcel.set_next(half_edges[i], half_edges[(i + 1) % n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellProperties, CellType};

    fn square_cell(id: &str, cx: f64, cy: f64, half: f64, population: i64) -> VoronoiCell {
        let geometry = geo::MultiPolygon(vec![geo::Polygon::new(
            geo::LineString(vec![
                geo::coord! { x: cx - half, y: cy - half },
                geo::coord! { x: cx + half, y: cy - half },
                geo::coord! { x: cx + half, y: cy + half },
                geo::coord! { x: cx - half, y: cy + half },
                geo::coord! { x: cx - half, y: cy - half },
            ]),
            vec![],
        )]);
        VoronoiCell {
            facility_id: id.to_string(),
            properties: CellProperties {
                name: id.to_string(),
                facility_id: id.to_string(),
                kind: None,
                area_sq_km: (2.0 * half) * (2.0 * half),
                centroid_lng: cx,
                centroid_lat: cy,
                population: Some(population),
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry,
        }
    }

    #[test]
    fn point_query_finds_the_containing_face() {
        let index = Dcel::build(vec![square_cell("a", 0.0, 0.0, 1.0, 10), square_cell("b", 3.0, 0.0, 1.0, 20)]).unwrap();
        assert_eq!(index.point_query(0.0, 0.0).unwrap().facility_id, "a");
        assert_eq!(index.point_query(0.0, 3.0).unwrap().facility_id, "b");
        assert!(index.point_query(10.0, 10.0).is_none());
    }

    #[test]
    fn adjacent_faces_share_an_edge() {
        // Two unit squares sharing the edge x=1.
        let index = Dcel::build(vec![square_cell("a", 0.0, 0.0, 1.0, 10), square_cell("b", 2.0, 0.0, 1.0, 20)]).unwrap();
        let neighbours = index.adjacent("a").unwrap();
        assert_eq!(neighbours.len(), 1);
        assert_eq!(neighbours[0].facility_id, "b");
    }

    #[test]
    fn top_by_population_orders_descending() {
        let index = Dcel::build(vec![
            square_cell("a", 0.0, 0.0, 1.0, 10),
            square_cell("b", 5.0, 0.0, 1.0, 50),
            square_cell("c", 10.0, 0.0, 1.0, 20),
        ])
        .unwrap();
        let top = index.top_by_population(2, None);
        assert_eq!(top.iter().map(|c| c.facility_id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn k_nearest_is_ordered_and_capped() {
        let index = Dcel::build(vec![
            square_cell("a", 0.0, 0.0, 1.0, 10),
            square_cell("b", 5.0, 0.0, 1.0, 20),
            square_cell("c", 10.0, 0.0, 1.0, 30),
        ])
        .unwrap();
        let nearest = index.k_nearest(0.0, 0.0, 100);
        assert_eq!(nearest.len(), 3);
        assert_eq!(nearest[0].facility_id, "a");
        assert_eq!(nearest[2].facility_id, "c");
    }
}
