use std::fmt;

/// The error kinds a facility-coverage computation can surface.
///
/// Per-item failures (a single degenerate cell, a single routing timeout) are
/// recovered locally by the component that hit them and only logged; these
/// variants are for failures serious enough to abort the call that produced
/// them.
#[derive(Debug)]
pub enum EngineError {
    /// Too few generators for the requested diagram flavour, or a generator
    /// coordinate outside its valid range.
    InvalidInput(String),
    /// A requested boundary/state name has no match in the boundary store.
    BoundaryNotFound(String),
    /// A reconstructed cell was empty or zero-area even after repair.
    GeometryDegenerate(String),
    /// The routing oracle could not be reached or every query failed.
    RoutingUnavailable(String),
    /// The road graph has no path between the nodes a query needed.
    DisconnectedGraph(String),
    /// No districts or facilities were loaded for an operation that needs them.
    NoData(String),
    /// A failure that should not be reachable given the component's own invariants.
    Internal(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::BoundaryNotFound(name) => write!(f, "boundary not found: {name}"),
            EngineError::GeometryDegenerate(msg) => write!(f, "degenerate geometry: {msg}"),
            EngineError::RoutingUnavailable(msg) => write!(f, "routing oracle unavailable: {msg}"),
            EngineError::DisconnectedGraph(msg) => write!(f, "disconnected graph: {msg}"),
            EngineError::NoData(msg) => write!(f, "no data: {msg}"),
            EngineError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
