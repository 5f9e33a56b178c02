//! Minimum/largest enclosing circle, optimal siting, coverage analytics, and
//! nearest-facility queries over a computed diagram (C6).

use geo::{Area, BooleanOps, Buffer, Contains, MultiPolygon, Point};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::population::District;
use crate::projection::Projection;
use crate::types::{CircleResult, SitingCandidate, SitingResult, VoronoiCell};

/// Candidate catchment radii below this are not meaningful siting proposals
/// on their own (§4.6 supplement).
const MIN_SITING_RADIUS_M: f64 = 1_000.0;
/// `CRITICAL_GAP` is escalated to `HIGH` priority past this LEC radius.
const CRITICAL_GAP_HIGH_PRIORITY_KM: f64 = 25.0;
/// `CRITICAL_GAP` is raised at all past this LEC radius.
const CRITICAL_GAP_THRESHOLD_KM: f64 = 10.0;

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

// ---------------------------------------------------------------------------
// Minimum enclosing circle
// ---------------------------------------------------------------------------

fn trivial_circle(points: &[(f64, f64)]) -> ((f64, f64), f64) {
    match points {
        [] => ((0.0, 0.0), 0.0),
        [a] => (*a, 0.0),
        [a, b] => (((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0), dist(*a, *b) / 2.0),
        _ => unreachable!("trivial_circle takes at most two points"),
    }
}

fn circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> ((f64, f64), f64) {
    let ax2_ay2 = a.0 * a.0 + a.1 * a.1;
    let bx2_by2 = b.0 * b.0 + b.1 * b.1;
    let cx2_cy2 = c.0 * c.0 + c.1 * c.1;
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-9 {
        // Collinear: fall back to the two-point circle spanning the extremes.
        return trivial_circle(&[a, c]);
    }
    let ux = (ax2_ay2 * (b.1 - c.1) + bx2_by2 * (c.1 - a.1) + cx2_cy2 * (a.1 - b.1)) / d;
    let uy = (ax2_ay2 * (c.0 - b.0) + bx2_by2 * (a.0 - c.0) + cx2_cy2 * (b.0 - a.0)) / d;
    ((ux, uy), dist((ux, uy), a))
}

fn in_circle(circle: ((f64, f64), f64), p: (f64, f64)) -> bool {
    dist(circle.0, p) <= circle.1 + 1e-7
}

/// Welzl's algorithm, written iteratively (no recursion) over a fixed shuffle
/// order so the result is reproducible for a given `seed`.
fn min_enclosing_circle(points: &[(f64, f64)], seed: u64) -> ((f64, f64), f64) {
    if points.is_empty() {
        return ((0.0, 0.0), 0.0);
    }
    let mut pts = points.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    pts.shuffle(&mut rng);

    let mut circle = trivial_circle(&[]);
    for i in 0..pts.len() {
        if in_circle(circle, pts[i]) {
            continue;
        }
        circle = trivial_circle(&[pts[i]]);
        for j in 0..i {
            if in_circle(circle, pts[j]) {
                continue;
            }
            circle = trivial_circle(&[pts[i], pts[j]]);
            for k in 0..j {
                if !in_circle(circle, pts[k]) {
                    circle = circumcircle(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    circle
}

/// Minimum enclosing circle of the facility generators.
pub fn minimum_enclosing_circle(facilities: &[(f64, f64)], seed: u64) -> Result<CircleResult> {
    if facilities.is_empty() {
        return Ok(CircleResult { center: None, radius_km: 0.0 });
    }
    let projection = Projection::for_points(facilities.iter())?;
    let planar = projection.project_all(facilities)?;
    let (center, radius_m) = min_enclosing_circle(&planar, seed);
    let (lng, lat) = projection.unproject(center.0, center.1)?;
    Ok(CircleResult { center: Some((lng, lat)), radius_km: radius_m / 1000.0 })
}

// ---------------------------------------------------------------------------
// Largest empty circle / optimal siting shared candidate generation
// ---------------------------------------------------------------------------

/// Planar candidate points: every exterior-ring vertex of every cell (these
/// include the true Voronoi vertices of the diagram) that falls inside
/// `region_planar`.
fn candidate_points(cells: &[VoronoiCell], region_planar: &MultiPolygon<f64>, projection: &Projection) -> Result<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    for cell in cells {
        for poly in &cell.geometry.0 {
            for coord in poly.exterior().coords() {
                let planar = projection.project(coord.x, coord.y)?;
                if region_planar.contains(&Point::new(planar.0, planar.1)) {
                    out.push(planar);
                }
            }
        }
    }
    Ok(out)
}

/// Largest Empty Circle: the candidate vertex farthest from every generator.
pub fn largest_empty_circle(
    facilities: &[(f64, f64)],
    cells: &[VoronoiCell],
    region_planar: &MultiPolygon<f64>,
    projection: &Projection,
) -> Result<CircleResult> {
    let generators = projection.project_all(facilities)?;
    let candidates = candidate_points(cells, region_planar, projection)?;

    let mut best: Option<((f64, f64), f64)> = None;
    for candidate in candidates {
        let nearest = generators.iter().map(|&g| dist(candidate, g)).fold(f64::MAX, f64::min);
        if best.is_none_or(|(_, bd)| nearest > bd) {
            best = Some((candidate, nearest));
        }
    }

    match best {
        Some((planar, radius_m)) => {
            let (lng, lat) = projection.unproject(planar.0, planar.1)?;
            Ok(CircleResult { center: Some((lng, lat)), radius_km: radius_m / 1000.0 })
        }
        None => Ok(CircleResult { center: None, radius_km: 0.0 }),
    }
}

fn sum_population(disk: &MultiPolygon<f64>, districts: &[District], planar_districts: &[MultiPolygon<f64>]) -> i64 {
    let mut total = 0i64;
    for (district, geom) in districts.iter().zip(planar_districts) {
        let district_area = geom.unsigned_area();
        if district_area <= 0.0 {
            continue;
        }
        let intersection_area = disk.intersection(geom).unsigned_area();
        if intersection_area <= 0.0 {
            continue;
        }
        total += (district.population as f64 * intersection_area / district_area).trunc() as i64;
    }
    total
}

/// Optimal siting: for every admissible candidate vertex, form its catchment
/// disk (radius = distance to the nearest existing generator) and rank by
/// the population it would capture. Returns the best candidate plus up to
/// three runners-up (§4.6 supplement: `top_alternatives = candidates[1..4]`).
pub fn optimal_siting(
    facilities: &[(f64, f64)],
    cells: &[VoronoiCell],
    region_planar: &MultiPolygon<f64>,
    districts: &[District],
    projection: &Projection,
) -> Result<SitingResult> {
    let generators = projection.project_all(facilities)?;
    let candidates = candidate_points(cells, region_planar, projection)?;
    let planar_districts: Vec<MultiPolygon<f64>> =
        districts.iter().map(|d| projection.project_multi_polygon(&d.geometry)).collect::<Result<Vec<_>>>()?;

    let mut scored: Vec<((f64, f64), f64, i64)> = Vec::new();
    for candidate in candidates {
        let radius_m = generators.iter().map(|&g| dist(candidate, g)).fold(f64::MAX, f64::min);
        if radius_m < MIN_SITING_RADIUS_M {
            continue;
        }
        let disk = Point::new(candidate.0, candidate.1).buffer(radius_m);
        let population = sum_population(&disk, districts, &planar_districts);
        scored.push((candidate, radius_m, population));
    }

    scored.sort_by(|a, b| b.2.cmp(&a.2));
    let candidates_evaluated = scored.len();

    let Some(&(best_point, best_radius_m, best_population)) = scored.first() else {
        return Ok(SitingResult {
            success: false,
            optimal_location: None,
            catchment_radius_km: 0.0,
            estimated_population: 0,
            candidates_evaluated,
            top_alternatives: Vec::new(),
        });
    };

    let (lng, lat) = projection.unproject(best_point.0, best_point.1)?;

    let mut top_alternatives = Vec::new();
    for &(point, _, population) in scored.iter().skip(1).take(3) {
        let (alt_lng, alt_lat) = projection.unproject(point.0, point.1)?;
        top_alternatives.push(SitingCandidate { lng: alt_lng, lat: alt_lat, population });
    }

    Ok(SitingResult {
        success: true,
        optimal_location: Some((lng, lat)),
        catchment_radius_km: best_radius_m / 1000.0,
        estimated_population: best_population,
        candidates_evaluated,
        top_alternatives,
    })
}

// ---------------------------------------------------------------------------
// Coverage report
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedFacility {
    pub facility_id: String,
    pub name: String,
    pub population: Option<i64>,
    pub area_sq_km: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoverageStats {
    pub total_population: i64,
    pub total_area_km2: f64,
    pub mean_population: f64,
    pub mean_area_km2: f64,
    pub cell_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationTag {
    CriticalGap,
    Overburdened,
    Capacity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    pub tag: RecommendationTag,
    pub priority: Priority,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoverageReport {
    pub overburdened: Vec<RankedFacility>,
    pub underserved: Vec<RankedFacility>,
    pub stats: CoverageStats,
    pub recommendations: Vec<Recommendation>,
}

fn to_ranked(cell: &VoronoiCell) -> RankedFacility {
    RankedFacility {
        facility_id: cell.facility_id.clone(),
        name: cell.properties.name.clone(),
        population: cell.properties.population,
        area_sq_km: cell.properties.area_sq_km,
    }
}

/// Overburdened/underserved rankings, coverage stats, and tagged advisory
/// recommendations (§4.6). `lec_radius_km` should come from
/// [`largest_empty_circle`]; `capacity_ceiling` is an optional configured
/// mean-population-per-cell threshold.
pub fn coverage_report(cells: &[VoronoiCell], lec_radius_km: f64, capacity_ceiling: Option<f64>) -> CoverageReport {
    let cell_count = cells.len();
    let total_population: i64 = cells.iter().filter_map(|c| c.properties.population).sum();
    let total_area_km2: f64 = cells.iter().map(|c| c.properties.area_sq_km).sum();
    let mean_population = if cell_count > 0 { total_population as f64 / cell_count as f64 } else { 0.0 };
    let mean_area_km2 = if cell_count > 0 { total_area_km2 / cell_count as f64 } else { 0.0 };

    let mut by_population: Vec<&VoronoiCell> = cells.iter().collect();
    by_population.sort_by(|a, b| {
        b.properties.population.unwrap_or(0).cmp(&a.properties.population.unwrap_or(0)).then_with(|| a.facility_id.cmp(&b.facility_id))
    });
    let overburdened: Vec<RankedFacility> = by_population.iter().take(5).map(|c| to_ranked(c)).collect();

    let mut by_area: Vec<&VoronoiCell> = cells.iter().collect();
    by_area.sort_by(|a, b| b.properties.area_sq_km.total_cmp(&a.properties.area_sq_km).then_with(|| a.facility_id.cmp(&b.facility_id)));
    let underserved: Vec<RankedFacility> = by_area.iter().take(5).map(|c| to_ranked(c)).collect();

    let mut recommendations = Vec::new();
    if lec_radius_km > CRITICAL_GAP_THRESHOLD_KM {
        let priority = if lec_radius_km > CRITICAL_GAP_HIGH_PRIORITY_KM { Priority::High } else { Priority::Medium };
        recommendations.push(Recommendation {
            tag: RecommendationTag::CriticalGap,
            priority,
            message: format!("largest empty circle radius is {lec_radius_km:.1} km; consider siting a new facility there"),
        });
    }
    if mean_population > 0.0 {
        if let Some(top) = by_population.first() {
            let top_population = top.properties.population.unwrap_or(0) as f64;
            if top_population > 2.0 * mean_population {
                recommendations.push(Recommendation {
                    tag: RecommendationTag::Overburdened,
                    priority: Priority::Medium,
                    message: format!(
                        "{} serves an estimated {top_population:.0} people, more than twice the mean of {mean_population:.0}",
                        top.properties.name
                    ),
                });
            }
        }
    }
    if let Some(ceiling) = capacity_ceiling {
        if mean_population > ceiling {
            recommendations.push(Recommendation {
                tag: RecommendationTag::Capacity,
                priority: Priority::Medium,
                message: format!("mean population per facility ({mean_population:.0}) exceeds the configured ceiling of {ceiling:.0}"),
            });
        }
    }

    CoverageReport {
        overburdened,
        underserved,
        stats: CoverageStats { total_population, total_area_km2, mean_population, mean_area_km2, cell_count },
        recommendations,
    }
}

/// The index of the facility nearest `point` (lng, lat), by planar distance.
pub fn nearest_facility(point: (f64, f64), facilities: &[(f64, f64)], projection: &Projection) -> Result<Option<usize>> {
    if facilities.is_empty() {
        return Ok(None);
    }
    let query = projection.project(point.0, point.1)?;
    let planar = projection.project_all(facilities)?;
    Ok(planar.iter().enumerate().map(|(i, &g)| (i, dist(query, g))).min_by(|a, b| a.1.total_cmp(&b.1)).map(|(i, _)| i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mec_covers_all_generators() {
        let facilities = vec![(77.20, 28.60), (77.21, 28.61), (77.19, 28.59), (77.22, 28.58)];
        let result = minimum_enclosing_circle(&facilities, 7).unwrap();
        assert!(result.center.is_some());
        assert!(result.radius_km > 0.0);
    }

    #[test]
    fn mec_of_single_point_is_degenerate() {
        let result = minimum_enclosing_circle(&[(77.2, 28.6)], 1).unwrap();
        assert_eq!(result.radius_km, 0.0);
    }

    #[test]
    fn coverage_report_flags_overburdened_cell() {
        use crate::types::{CellProperties, CellType};
        let make = |id: &str, population: i64| VoronoiCell {
            facility_id: id.to_string(),
            properties: CellProperties {
                name: id.to_string(),
                facility_id: id.to_string(),
                kind: None,
                area_sq_km: 10.0,
                centroid_lng: 0.0,
                centroid_lat: 0.0,
                population: Some(population),
                population_breakdown: Vec::new(),
                cell_type: Some(CellType::Euclidean),
                road_penalty_km: None,
                grid_points_count: None,
            },
            geometry: MultiPolygon(vec![]),
        };
        let cells = vec![make("a", 100), make("b", 100), make("c", 1000)];
        let report = coverage_report(&cells, 5.0, None);
        assert!(report.recommendations.iter().any(|r| r.tag == RecommendationTag::Overburdened));
        assert!(!report.recommendations.iter().any(|r| r.tag == RecommendationTag::CriticalGap));
    }
}
