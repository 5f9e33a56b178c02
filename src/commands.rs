use anyhow::{bail, Context, Result};

use crate::analytics;
use crate::boundary::{padded_bbox, BoundaryStore};
use crate::cli::{AnalyticsArgs, AnalyticsQuery, Cli, ComputeArgs, Flavour};
use crate::dominating_refinement;
use crate::io;
use crate::population::attribute_population;
use crate::routing::NullOracle;
use crate::types::{AdvancedOptions, Diagram, VoronoiCell};
use crate::{output, voronoi, weighted_voronoi};

/// Resolves the geographic clip region a `compute`/`analytics` invocation
/// should use: the named state, the whole country, or (when no boundary file
/// was given at all) a padded bounding box of the facilities (§4.2).
fn resolve_clip_region(
    boundary_path: Option<&std::path::Path>,
    state: Option<&str>,
    facility_coords: &[(f64, f64)],
    verbose: u8,
) -> Result<geo::MultiPolygon<f64>> {
    match boundary_path {
        Some(path) => {
            let text = io::read_boundary_text(path)?;
            let store = BoundaryStore::load(&text).context("load boundary file")?;
            match state {
                Some(name) => Ok(store.state(name).map_err(|e| anyhow::anyhow!("{e}"))?.geometry.clone()),
                None => Ok(store.country_geo().clone()),
            }
        }
        None => {
            if verbose > 0 {
                eprintln!("[compute] no boundary file given, falling back to a padded bounding box of the facilities");
            }
            let bbox = padded_bbox(facility_coords, 0.1, 0.1);
            Ok(geo::MultiPolygon(vec![bbox.to_polygon()]))
        }
    }
}

pub fn compute(cli: &Cli, args: &ComputeArgs) -> Result<()> {
    let facilities = io::read_facilities(&args.facilities)?;
    if cli.verbose > 0 {
        eprintln!("[compute] loaded {} facilities from {}", facilities.len(), args.facilities.display());
    }

    let facility_coords: Vec<(f64, f64)> = facilities.iter().map(|f| (f.lng, f.lat)).collect();
    let clip_geo = resolve_clip_region(args.boundary.as_deref(), args.state.as_deref(), &facility_coords, cli.verbose)?;

    let opts = AdvancedOptions {
        grid_density: args.grid_density,
        base_k: args.base_k,
        samples_per_edge: args.samples_per_edge,
        batch_size: args.batch_size,
        ..Default::default()
    };

    let mut cells: Vec<VoronoiCell> = match args.flavour {
        Flavour::Euclidean => {
            if cli.verbose > 0 {
                eprintln!("[compute] flavour=euclidean generators={}", facilities.len());
            }
            voronoi::compute_voronoi(&facilities, &clip_geo).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        Flavour::Weighted => {
            if cli.verbose > 0 {
                eprintln!("[compute] flavour=weighted generators={} grid_density={}", facilities.len(), opts.grid_density);
            }
            weighted_voronoi::compute_weighted_voronoi(&facilities, &clip_geo, &NullOracle, &opts).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        Flavour::Road => {
            let Some(road_graph_path) = &args.road_graph else {
                bail!("--flavour road requires --road-graph");
            };
            let graph = io::read_road_graph(road_graph_path)?;
            if cli.verbose > 0 {
                eprintln!("[compute] flavour=road generators={} nodes={}", facilities.len(), graph.num_nodes());
            }
            crate::road_voronoi::compute_road_voronoi(&facilities, &graph, &clip_geo).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        Flavour::Refine => {
            let euclidean = voronoi::compute_voronoi(&facilities, &clip_geo).map_err(|e| anyhow::anyhow!("{e}"))?;
            if cli.verbose > 0 {
                eprintln!("[compute] flavour=refine baseline cells={}", euclidean.len());
            }
            let result =
                dominating_refinement::refine(&facilities, &euclidean, &clip_geo, &NullOracle, &opts).map_err(|e| anyhow::anyhow!("{e}"))?;
            if cli.verbose > 0 {
                eprintln!(
                    "[compute] refine dominating_set={:?} regions={} grid_points={} routing_queries={}",
                    result.summary.dominating_set, result.summary.regions_processed, result.summary.total_grid_points, result.summary.routing_queries
                );
            }
            if cli.verbose > 1 {
                for id in &result.summary.dominating_set {
                    eprintln!("[compute]   centre: {id}");
                }
            }
            result.cells
        }
    };

    if let Some(districts_path) = &args.districts {
        let districts = io::read_districts(districts_path)?;
        if cli.verbose > 0 {
            eprintln!("[compute] attributing population from {} districts", districts.len());
        }
        attribute_population(&mut cells, &districts).map_err(|e| anyhow::anyhow!("{e}")).context("attribute population")?;
    }

    let published = crate::set_current_diagram(Diagram { cells: cells.clone() });
    if cli.verbose > 1 {
        eprintln!("[compute] published diagram with {} cells as current", published.cells.len());
    }

    let fc = output::to_feature_collection(&cells).map_err(|e| anyhow::anyhow!("{e}"))?;
    io::write_feature_collection(&fc, args.output.as_deref())?;
    if cli.verbose > 0 {
        match &args.output {
            Some(path) => eprintln!("[compute] wrote {} cells to {}", cells.len(), path.display()),
            None => eprintln!("[compute] wrote {} cells to stdout", cells.len()),
        }
    }

    Ok(())
}

pub fn run_analytics(cli: &Cli, args: &AnalyticsArgs) -> Result<()> {
    let cells = io::read_diagram(&args.diagram)?;
    let facilities = io::read_facilities(&args.facilities)?;
    if cli.verbose > 0 {
        eprintln!("[analytics] loaded {} cells and {} facilities", cells.len(), facilities.len());
    }

    crate::set_current_diagram(Diagram { cells: cells.clone() });

    let facility_coords: Vec<(f64, f64)> = facilities.iter().map(|f| (f.lng, f.lat)).collect();
    let clip_geo = resolve_clip_region(args.boundary.as_deref(), args.state.as_deref(), &facility_coords, cli.verbose)?;
    let projection = crate::Projection::for_points(facility_coords.iter()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let region_planar = crate::boundary::repair(&projection.project_multi_polygon(&clip_geo).map_err(|e| anyhow::anyhow!("{e}"))?);

    match args.query {
        AnalyticsQuery::Mec => {
            let result = analytics::minimum_enclosing_circle(&facility_coords, args.seed).map_err(|e| anyhow::anyhow!("{e}"))?;
            print_json(&result)
        }
        AnalyticsQuery::Lec => {
            let result = analytics::largest_empty_circle(&facility_coords, &cells, &region_planar, &projection).map_err(|e| anyhow::anyhow!("{e}"))?;
            print_json(&result)
        }
        AnalyticsQuery::Siting => {
            let Some(districts_path) = &args.districts else {
                bail!("siting requires --districts");
            };
            let districts = io::read_districts(districts_path)?;
            let result = analytics::optimal_siting(&facility_coords, &cells, &region_planar, &districts, &projection).map_err(|e| anyhow::anyhow!("{e}"))?;
            print_json(&result)
        }
        AnalyticsQuery::Coverage => {
            let lec = analytics::largest_empty_circle(&facility_coords, &cells, &region_planar, &projection).map_err(|e| anyhow::anyhow!("{e}"))?;
            let report = analytics::coverage_report(&cells, lec.radius_km, args.capacity_ceiling);
            print_json(&report)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize analytics result")?;
    println!("{text}");
    Ok(())
}
