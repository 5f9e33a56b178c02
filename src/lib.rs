#![doc = "Facility-coverage Voronoi geometry engine."]
#![doc = ""]
#![doc = "Given a set of point facilities and an administrative boundary, computes the"]
#![doc = "Voronoi tessellation those facilities induce (Euclidean, additive-weighted,"]
#![doc = "road-network, or dominating-set-refined), indexes it for spatial queries, and"]
#![doc = "attributes district population to each cell."]

pub mod analytics;
pub mod boundary;
pub mod cli;
pub mod commands;
pub mod dcel;
pub mod diagram_store;
pub mod dominating_refinement;
pub mod error;
pub mod io;
pub mod output;
pub mod population;
pub mod projection;
pub mod road_voronoi;
pub mod routing;
pub mod types;
pub mod voronoi;
pub mod weighted_voronoi;

#[doc(inline)]
pub use dcel::Dcel;
#[doc(inline)]
pub use diagram_store::{clear_current_diagram, current_diagram, set_current_diagram};
#[doc(inline)]
pub use error::{EngineError, Result};
#[doc(inline)]
pub use population::District;
#[doc(inline)]
pub use projection::Projection;
#[doc(inline)]
pub use road_voronoi::RoadGraph;
#[doc(inline)]
pub use routing::{NullOracle, RoutingOracle};
#[doc(inline)]
pub use types::{AdvancedOptions, ComputeOptions, Diagram, Facility, VoronoiCell};
