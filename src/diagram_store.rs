//! The process-wide "current diagram" slot (§3, §5, §6): init-on-compute,
//! replace-on-recompute, explicit clear. Replace and clear are atomic from a
//! reader's perspective - a reader observes the previous diagram wholly or
//! the new one wholly, never a partial write - because the slot hands out
//! `Arc` clones rather than references into its own storage.

use std::sync::{Arc, OnceLock, RwLock};

use crate::types::Diagram;

static CURRENT: OnceLock<RwLock<Option<Arc<Diagram>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Arc<Diagram>>> {
    CURRENT.get_or_init(|| RwLock::new(None))
}

/// Returns a handle to the currently published diagram, if any computation
/// has published one since the last [`clear_current_diagram`].
pub fn current_diagram() -> Option<Arc<Diagram>> {
    slot().read().expect("current diagram lock poisoned").clone()
}

/// Publishes `diagram`, replacing whatever was previously current. Returns
/// the published handle for callers that want to keep using it without a
/// second lookup.
pub fn set_current_diagram(diagram: Diagram) -> Arc<Diagram> {
    let handle = Arc::new(diagram);
    *slot().write().expect("current diagram lock poisoned") = Some(handle.clone());
    handle
}

/// Clears the slot; subsequent [`current_diagram`] calls return `None`
/// until the next [`set_current_diagram`].
pub fn clear_current_diagram() {
    *slot().write().expect("current diagram lock poisoned") = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // The slot is process-wide `static` state shared by every test in this
    // binary; serialize access through one test so assertions about its
    // before/after contents cannot race with other tests in this module.
    #[test]
    fn init_replace_and_clear_are_observable() {
        clear_current_diagram();
        assert!(current_diagram().is_none());

        set_current_diagram(Diagram { cells: vec![] });
        let first = current_diagram().expect("diagram should be set");
        assert!(first.cells.is_empty());

        set_current_diagram(Diagram {
            cells: vec![crate::types::VoronoiCell {
                facility_id: "a".to_string(),
                properties: crate::types::CellProperties {
                    name: "a".to_string(),
                    facility_id: "a".to_string(),
                    kind: None,
                    area_sq_km: 1.0,
                    centroid_lng: 0.0,
                    centroid_lat: 0.0,
                    population: None,
                    population_breakdown: Vec::new(),
                    cell_type: Some(crate::types::CellType::Euclidean),
                    road_penalty_km: None,
                    grid_points_count: None,
                },
                geometry: geo::MultiPolygon(vec![]),
            }],
        });
        let second = current_diagram().expect("diagram should still be set");
        assert_eq!(second.cells.len(), 1);

        clear_current_diagram();
        assert!(current_diagram().is_none());
    }
}
