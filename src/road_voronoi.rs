//! Graph Voronoi partition of a weighted road network by multi-source
//! Dijkstra, with convex-hull cell polygonisation (C8).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

use geo::{Area, BooleanOps, Centroid, ConvexHull, MultiPoint, MultiPolygon, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::{EngineError, Result};
use crate::types::{CellProperties, CellType, Facility, VoronoiCell};

/// A road network stored as a compressed-sparse-row (CSR) adjacency: flat
/// offset/target/weight arrays indexed by node id, rather than an
/// adjacency-list-of-`Vec` or a pointer graph (§4.8 implementation note).
pub struct RoadGraph {
    /// Node coordinates in (lng, lat) order.
    pub node_coords: Vec<(f64, f64)>,
    offsets: Vec<u32>,
    targets: Vec<u32>,
    weights: Vec<f64>,
}

impl RoadGraph {
    /// Builds a CSR graph from undirected `edges` (node_a, node_b, weight).
    pub fn new(node_coords: Vec<(f64, f64)>, edges: &[(u32, u32, f64)]) -> Self {
        let n = node_coords.len();
        let mut degree = vec![0u32; n];
        for &(a, b, _) in edges {
            degree[a as usize] += 1;
            degree[b as usize] += 1;
        }
        let mut offsets = vec![0u32; n + 1];
        for i in 0..n {
            offsets[i + 1] = offsets[i] + degree[i];
        }
        let mut targets = vec![0u32; offsets[n] as usize];
        let mut weights = vec![0.0f64; offsets[n] as usize];
        let mut cursor = offsets.clone();
        for &(a, b, w) in edges {
            let ia = cursor[a as usize] as usize;
            targets[ia] = b;
            weights[ia] = w;
            cursor[a as usize] += 1;

            let ib = cursor[b as usize] as usize;
            targets[ib] = a;
            weights[ib] = w;
            cursor[b as usize] += 1;
        }
        Self { node_coords, offsets, targets, weights }
    }

    pub fn num_nodes(&self) -> usize {
        self.node_coords.len()
    }

    fn neighbors(&self, node: u32) -> (&[u32], &[f64]) {
        let s = self.offsets[node as usize] as usize;
        let e = self.offsets[node as usize + 1] as usize;
        (&self.targets[s..e], &self.weights[s..e])
    }
}

struct IndexedNode {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        (self.x - point[0]).powi(2) + (self.y - point[1]).powi(2)
    }
}

#[derive(Clone, Copy, PartialEq)]
struct HeapEntry {
    dist: f64,
    node: u32,
    source: usize,
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed so `BinaryHeap` (a max-heap) pops the smallest distance first;
    // equal distances favour the lower source index (insertion-order tie-break).
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.total_cmp(&self.dist).then_with(|| other.source.cmp(&self.source))
    }
}

/// Assigns every reachable node to the nearest of `sources` (node ids) under
/// edge-weight shortest path. Returns each node's owning source index, or
/// `None` if unreachable from any source.
fn multi_source_dijkstra(graph: &RoadGraph, sources: &[u32]) -> Vec<Option<usize>> {
    let n = graph.num_nodes();
    let mut dist = vec![f64::INFINITY; n];
    let mut owner: Vec<Option<usize>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    for (source, &node) in sources.iter().enumerate() {
        dist[node as usize] = 0.0;
        owner[node as usize] = Some(source);
        heap.push(HeapEntry { dist: 0.0, node, source });
    }

    while let Some(HeapEntry { dist: d, node, source }) = heap.pop() {
        if d > dist[node as usize] {
            continue;
        }
        let (neighbors, weights) = graph.neighbors(node);
        for (&nbr, &w) in neighbors.iter().zip(weights) {
            let nd = d + w;
            let better = nd < dist[nbr as usize] || (nd == dist[nbr as usize] && Some(source) < owner[nbr as usize]);
            if better {
                dist[nbr as usize] = nd;
                owner[nbr as usize] = Some(source);
                heap.push(HeapEntry { dist: nd, node: nbr, source });
            }
        }
    }

    owner
}

/// Approximates the area of a geometry given in (lng, lat) degrees by
/// scaling its raw degree-squared area with a latitude-dependent
/// km-per-degree factor evaluated at the centroid (§4.8).
fn approx_area_km2(mp: &MultiPolygon<f64>) -> f64 {
    let Some(centroid) = mp.centroid() else { return 0.0 };
    let km_per_deg_lat = 111.0;
    let km_per_deg_lng = 111.0 * centroid.y().to_radians().cos();
    mp.unsigned_area() * km_per_deg_lat * km_per_deg_lng
}

/// Partitions `graph` among `facilities` by multi-source Dijkstra, clips each
/// partition's convex hull to `region_geo`, and emits one cell per facility
/// that ends up with a non-degenerate polygon.
pub fn compute_road_voronoi(facilities: &[Facility], graph: &RoadGraph, region_geo: &MultiPolygon<f64>) -> Result<Vec<VoronoiCell>> {
    let tree = RTree::bulk_load(graph.node_coords.iter().enumerate().map(|(idx, &(x, y))| IndexedNode { idx, x, y }).collect());

    let mut claimed: HashMap<usize, usize> = HashMap::new();
    let mut sources: Vec<(usize, u32)> = Vec::new();
    for (i, f) in facilities.iter().enumerate() {
        let Some(nearest) = tree.nearest_neighbor(&[f.lng, f.lat]) else { continue };
        if claimed.contains_key(&nearest.idx) {
            eprintln!("[road_voronoi] facility {} snapped to a node already claimed by another facility, dropped", f.id);
            continue;
        }
        claimed.insert(nearest.idx, i);
        sources.push((i, nearest.idx as u32));
    }

    if sources.len() < 2 {
        return Err(EngineError::InvalidInput(format!("need at least 2 distinct snappable generators, got {}", sources.len())));
    }

    let source_nodes: Vec<u32> = sources.iter().map(|&(_, n)| n).collect();
    let owner = multi_source_dijkstra(graph, &source_nodes);

    let mut nodes_by_source: Vec<Vec<u32>> = vec![Vec::new(); sources.len()];
    for node in 0..graph.num_nodes() {
        if let Some(src) = owner[node] {
            nodes_by_source[src].push(node as u32);
        }
    }

    let mut cells = Vec::new();
    for (src_idx, node_ids) in nodes_by_source.into_iter().enumerate() {
        let (facility_idx, _) = sources[src_idx];
        let facility = &facilities[facility_idx];
        if node_ids.len() < 3 {
            eprintln!("[road_voronoi] facility {facility_idx} ({}) reached fewer than 3 nodes, dropped as disconnected", facility.id);
            continue;
        }

        let points: Vec<Point<f64>> = node_ids
            .iter()
            .map(|&n| {
                let (lng, lat) = graph.node_coords[n as usize];
                Point::new(lng, lat)
            })
            .collect();
        let hull = MultiPoint::from(points).convex_hull();
        let clipped = MultiPolygon(vec![hull]).intersection(region_geo);
        if clipped.0.is_empty() {
            continue;
        }
        let area_km2 = approx_area_km2(&clipped);
        if area_km2 <= 0.0 {
            continue;
        }

        cells.push(VoronoiCell {
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
                cell_type: Some(CellType::RoadGraph),
                road_penalty_km: None,
                grid_points_count: Some(node_ids.len()),
            },
            geometry: clipped,
        });
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(id: &str, lng: f64, lat: f64) -> Facility {
        Facility::new(Some(id.to_string()), id.to_string(), None, lat, lng, 0)
    }

    /// A 4x3 rook-adjacency grid (4 columns, 3 rows), one facility snapped
    /// near the middle of each side. Multi-source Dijkstra splits it evenly
    /// at the column midpoint, so each partition spans two columns and three
    /// rows - non-collinear, so its convex hull has positive area (unlike a
    /// single line of nodes, whose hull degenerates to zero area).
    fn grid_graph() -> RoadGraph {
        const COLS: i64 = 4;
        const ROWS: i64 = 3;
        let mut coords = Vec::with_capacity((COLS * ROWS) as usize);
        for row in 0..ROWS {
            for col in 0..COLS {
                coords.push((col as f64 * 0.01, row as f64 * 0.01));
            }
        }
        let index = |row: i64, col: i64| -> u32 { (row * COLS + col) as u32 };
        let mut edges = Vec::new();
        for row in 0..ROWS {
            for col in 0..COLS - 1 {
                edges.push((index(row, col), index(row, col + 1), 1.0));
            }
        }
        for row in 0..ROWS - 1 {
            for col in 0..COLS {
                edges.push((index(row, col), index(row + 1, col), 1.0));
            }
        }
        RoadGraph::new(coords, &edges)
    }

    fn region() -> MultiPolygon<f64> {
        MultiPolygon(vec![geo::Polygon::new(
            geo::LineString(vec![
                geo::coord! { x: -1.0, y: -1.0 },
                geo::coord! { x: 1.0, y: -1.0 },
                geo::coord! { x: 1.0, y: 1.0 },
                geo::coord! { x: -1.0, y: 1.0 },
                geo::coord! { x: -1.0, y: -1.0 },
            ]),
            vec![],
        )])
    }

    #[test]
    fn partitions_grid_graph_between_two_generators() {
        let graph = grid_graph();
        let facilities = vec![facility("west", 0.0, 0.01), facility("east", 0.03, 0.01)];
        let cells = compute_road_voronoi(&facilities, &graph, &region()).unwrap();
        assert_eq!(cells.len(), 2);
        for cell in &cells {
            assert!(cell.properties.area_sq_km > 0.0);
        }
    }

    #[test]
    fn too_few_generators_is_invalid_input() {
        let graph = grid_graph();
        let facilities = vec![facility("only", 0.0, 0.0)];
        assert!(matches!(compute_road_voronoi(&facilities, &graph, &region()), Err(EngineError::InvalidInput(_))));
    }
}
