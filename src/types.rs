use serde::{Deserialize, Serialize};

/// A point-like facility: a health centre, school, or similar service point.
///
/// Insertion order of the slice a caller passes in defines the "site index"
/// used for tie-breaking throughout the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl Facility {
    /// Builds a facility, deriving `id` from `index` when the input omitted one.
    pub fn new(id: Option<String>, name: String, kind: Option<String>, lat: f64, lng: f64, index: usize) -> Self {
        Self {
            id: id.unwrap_or_else(|| index.to_string()),
            name,
            kind,
            lat,
            lng,
        }
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Options shared by every diagram flavour.
#[derive(Clone, Debug, Default)]
pub struct ComputeOptions {
    pub clip_to_country: bool,
    pub state_filter: Option<String>,
    pub include_population: bool,
}

/// Additional options for the weighted / road-graph / refinement flavours.
#[derive(Clone, Debug)]
pub struct AdvancedOptions {
    pub grid_density: usize,
    pub base_k: usize,
    pub adaptive_k: bool,
    pub distortion_threshold: f64,
    pub batch_size: usize,
    pub samples_per_edge: usize,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            grid_density: 100,
            base_k: 5,
            adaptive_k: false,
            distortion_threshold: 2.0,
            batch_size: 100,
            samples_per_edge: 5,
        }
    }
}

/// The flavour tag carried by each cell's `cell_type` property (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Euclidean,
    WeightedRoad,
    RoadGraph,
    RoadRefined,
    EuclideanFallback,
}

/// One entry of a population `breakdown` list (§4.5, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationContribution {
    pub state: String,
    pub district: String,
    pub intersection_area_km2: f64,
    pub overlap_percentage: f64,
    pub contributed_population: i64,
}

/// The property bag attached to a cell feature (§6). An open bag in spirit:
/// downstream consumers tolerate unknown keys, so this struct only models
/// the keys the engine itself populates and serializes `None` fields as
/// absent via `skip_serializing_if`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellProperties {
    pub name: String,
    pub facility_id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub area_sq_km: f64,
    pub centroid_lng: f64,
    pub centroid_lat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub population_breakdown: Vec<PopulationContribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<CellType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_penalty_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_points_count: Option<usize>,
}

/// A Voronoi cell ready for GeoJSON serialization (§6 cell feature).
#[derive(Clone, Debug)]
pub struct VoronoiCell {
    pub facility_id: String,
    pub properties: CellProperties,
    pub geometry: geo::MultiPolygon<f64>,
}

/// A computed diagram: the primary engine output, shared by all four flavours.
#[derive(Clone, Debug, Default)]
pub struct Diagram {
    pub cells: Vec<VoronoiCell>,
}

/// `{ center: [lng, lat] | null, radius_km: float }` (§6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CircleResult {
    pub center: Option<(f64, f64)>,
    pub radius_km: f64,
}

/// Siting output (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SitingCandidate {
    pub lng: f64,
    pub lat: f64,
    pub population: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SitingResult {
    pub success: bool,
    pub optimal_location: Option<(f64, f64)>,
    pub catchment_radius_km: f64,
    pub estimated_population: i64,
    pub candidates_evaluated: usize,
    pub top_alternatives: Vec<SitingCandidate>,
}
