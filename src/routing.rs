//! The routing-oracle interface consumed (not implemented) by `WeightedVoronoi`
//! and `DominatingRefinement`, plus a default stand-in that always reports
//! "not connected" so callers without a real road-network service still get
//! well-defined Euclidean-fallback behaviour.

use std::time::Duration;

/// Default per-request timeout for routing calls (§5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The result of a single origin-destination route query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_min: f64,
    pub connected: bool,
}

impl RouteResult {
    pub const fn disconnected() -> Self {
        Self { distance_km: 0.0, duration_min: 0.0, connected: false }
    }
}

/// A source of road-network distances, consumed by C7 and C9. Implementations
/// talk to whatever routing backend is available (OSRM, a local graph, a
/// mocked table for tests); the core engine never depends on a specific one.
pub trait RoutingOracle {
    /// One-to-one route distance from `src` to `dst` (lng, lat order).
    fn route(&self, src: (f64, f64), dst: (f64, f64)) -> RouteResult;

    /// One-to-many route distances from `src` to every entry of `dsts`, in
    /// the same order. A timeout or per-destination failure is reported as
    /// `RouteResult::disconnected()` for that entry rather than failing the
    /// whole batch (§7 `RoutingUnavailable`: recovered per-query).
    fn table(&self, src: (f64, f64), dsts: &[(f64, f64)]) -> Vec<RouteResult> {
        dsts.iter().map(|&dst| self.route(src, dst)).collect()
    }
}

/// The default oracle: every query reports "not connected", forcing
/// Euclidean fallback throughout (§6 ambient interfaces, E7).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOracle;

impl RoutingOracle for NullOracle {
    fn route(&self, _src: (f64, f64), _dst: (f64, f64)) -> RouteResult {
        RouteResult::disconnected()
    }

    fn table(&self, _src: (f64, f64), dsts: &[(f64, f64)]) -> Vec<RouteResult> {
        vec![RouteResult::disconnected(); dsts.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_oracle_never_connects() {
        let oracle = NullOracle;
        assert!(!oracle.route((0.0, 0.0), (1.0, 1.0)).connected);
        let table = oracle.table((0.0, 0.0), &[(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| !r.connected));
    }
}
