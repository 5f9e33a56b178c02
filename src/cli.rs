use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

/// Facility-coverage Voronoi geometry engine.
#[derive(Parser, Debug)]
#[command(name = "coverage-geo", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase diagnostic verbosity (-v, -vv); gates the per-item recovery
    /// logging described in §4.10 (degenerate cells, routing timeouts,
    /// dropped generators).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute a diagram and write its feature collection.
    Compute(ComputeArgs),
    /// Run an analytics query against a previously computed diagram.
    Analytics(AnalyticsArgs),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum Flavour {
    /// Euclidean Voronoi, clipped to the boundary (C3).
    Euclidean,
    /// Additive-weighted Voronoi (C7).
    Weighted,
    /// Road-network graph Voronoi (C8).
    Road,
    /// Dominating-set refinement of the Euclidean diagram (C9).
    Refine,
}

#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Facility records: a JSON array of `{ id?, name, lat, lng, type? }`.
    #[arg(value_hint = ValueHint::FilePath)]
    pub facilities: PathBuf,

    /// Boundary GeoJSON FeatureCollection (states named by a `state`/`name`/
    /// `NAME_1` property). Omit to fall back to a padded bounding box of the
    /// facilities (§4.2).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub boundary: Option<PathBuf>,

    /// Clip to this named state/region instead of the country union.
    #[arg(long)]
    pub state: Option<String>,

    /// Diagram flavour to compute.
    #[arg(long, value_enum, default_value_t = Flavour::Euclidean)]
    pub flavour: Flavour,

    /// Districts file (`[{ state, district, population, geometry }]`) to
    /// attribute population onto each cell (C5).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub districts: Option<PathBuf>,

    /// Road graph (`{ nodes: [[lng,lat]...], edges: [[a,b,weight]...] }`),
    /// required for `--flavour road`.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub road_graph: Option<PathBuf>,

    /// Output file; omit to write the feature collection to stdout.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Grid density for the weighted-Voronoi sampling grid (§4.7).
    #[arg(long, default_value_t = 100)]
    pub grid_density: usize,

    /// Euclidean-nearest sibling count used for penalty computation (§4.7).
    #[arg(long, default_value_t = 5)]
    pub base_k: usize,

    /// Per-region sample density for dominating-set refinement (§4.9).
    #[arg(long, default_value_t = 8)]
    pub samples_per_edge: usize,

    /// Routing-table batch size (§4.7, §4.9).
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,
}

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    /// Feature collection produced by a previous `compute` call.
    #[arg(value_hint = ValueHint::FilePath)]
    pub diagram: PathBuf,

    /// The same facility records used to compute `diagram` (generator
    /// coordinates are not recoverable from cell centroids alone).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub facilities: PathBuf,

    /// Boundary to constrain LEC/siting candidates to; defaults to a padded
    /// bounding box of the facilities.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub boundary: Option<PathBuf>,

    #[arg(long)]
    pub state: Option<String>,

    /// Districts file, required for siting and the coverage report.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub districts: Option<PathBuf>,

    /// Mean-population-per-cell ceiling for the `CAPACITY` recommendation.
    #[arg(long)]
    pub capacity_ceiling: Option<f64>,

    /// Reproducibility seed for the minimum-enclosing-circle shuffle.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    #[command(subcommand)]
    pub query: AnalyticsQuery,
}

#[derive(Subcommand, Debug)]
pub enum AnalyticsQuery {
    /// Minimum enclosing circle of the facility generators.
    Mec,
    /// Largest empty circle constrained to the boundary/state region.
    Lec,
    /// Population-optimal siting candidates.
    Siting,
    /// Overburdened/underserved rankings and recommendations.
    Coverage,
}
