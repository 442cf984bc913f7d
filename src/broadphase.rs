//! Sweep-and-prune broadphase over per-axis sorted endpoint lists.
//!
//! Each dynamic-index body contributes two endpoints (lower and upper bound) per axis. The
//! lists are kept sorted by coordinate; each tick, every endpoint is re-evaluated and "bubbled"
//! towards its new sorted position one swap at a time. Each swap that crosses two endpoints of
//! *different* bodies flips that pair's overlap bit for this axis in the [`OverlapTable`]: an
//! upper endpoint moving past a lower endpoint means the intervals started overlapping (or
//! stopped, depending on direction of travel), and vice versa.

use vek::Aabb;

use crate::overlap_table::{Axis, OverlapTable};

/// One bound of one body's extent on one axis.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    /// Dense body index this endpoint belongs to.
    body: u32,
    /// `true` for the upper bound, `false` for the lower bound.
    is_upper: bool,
    /// Coordinate value along the axis.
    value: f64,
}

/// Sorted endpoint list for a single axis.
#[derive(Debug, Clone, Default)]
struct EndpointList {
    endpoints: Vec<Endpoint>,
}

impl EndpointList {
    fn axis_index(&self, body: u32, is_upper: bool) -> Option<usize> {
        self.endpoints
            .iter()
            .position(|e| e.body == body && e.is_upper == is_upper)
    }
}

/// Sweep-and-prune broadphase, maintaining three [`EndpointList`]s and an [`OverlapTable`].
#[derive(Debug, Clone)]
pub struct Broadphase {
    axes: [EndpointList; 3],
    table: OverlapTable,
}

impl Broadphase {
    /// Build a broadphase sized for up to `capacity` simultaneous dynamic bodies.
    pub fn new(capacity: usize) -> Self {
        Self {
            axes: Default::default(),
            table: OverlapTable::new(capacity),
        }
    }

    /// Currently active (all-three-axes-overlapping) pairs of dense body indices.
    pub fn active_pairs(&self) -> &[(u32, u32)] {
        self.table.active_pairs()
    }

    /// Debug-only bijection check between the active list and the overlap table, forwarded from
    /// [`OverlapTable::verify`] for callers (tests in particular) that only hold a `Broadphase`.
    #[cfg(debug_assertions)]
    pub fn verify(&self) {
        self.table.verify();
    }

    /// Register a new body's initial bounds, inserting (unsorted; a subsequent `update` call
    /// will sort it in) two endpoints per axis.
    pub fn add_body(&mut self, body: u32, aabb: Aabb<f64>) {
        for (axis_idx, list) in self.axes.iter_mut().enumerate() {
            let (min, max) = axis_bounds(aabb, axis_idx);
            list.endpoints.push(Endpoint {
                body,
                is_upper: false,
                value: min,
            });
            list.endpoints.push(Endpoint {
                body,
                is_upper: true,
                value: max,
            });
        }
        self.bubble_all(body);
    }

    /// Remove a body's endpoints and any active overlaps it participates in.
    pub fn remove_body(&mut self, body: u32, live_bodies: impl Iterator<Item = u32> + Clone) {
        for list in &mut self.axes {
            list.endpoints.retain(|e| e.body != body);
        }
        self.table.remove_body(body, live_bodies);
    }

    /// Update a body's bounds and bubble its endpoints into their new sorted positions,
    /// flipping axis overlap bits for every pair of endpoints whose relative order changes.
    pub fn update_body(&mut self, body: u32, aabb: Aabb<f64>) {
        for (axis_idx, list) in self.axes.iter_mut().enumerate() {
            let (min, max) = axis_bounds(aabb, axis_idx);
            let axis = axis_from_index(axis_idx);

            if let Some(i) = list.axis_index(body, false) {
                list.endpoints[i].value = min;
            }
            if let Some(i) = list.axis_index(body, true) {
                list.endpoints[i].value = max;
            }

            bubble_axis(list, &mut self.table, axis);
        }
    }

    fn bubble_all(&mut self, body: u32) {
        for (axis_idx, list) in self.axes.iter_mut().enumerate() {
            let axis = axis_from_index(axis_idx);
            bubble_axis(list, &mut self.table, axis);
        }
        let _ = body;
    }
}

fn axis_bounds(aabb: Aabb<f64>, axis_idx: usize) -> (f64, f64) {
    match axis_idx {
        0 => (aabb.min.x, aabb.max.x),
        1 => (aabb.min.y, aabb.max.y),
        _ => (aabb.min.z, aabb.max.z),
    }
}

fn axis_from_index(axis_idx: usize) -> Axis {
    match axis_idx {
        0 => Axis::X,
        1 => Axis::Y,
        _ => Axis::Z,
    }
}

/// Bubble-sort the list into order, flipping the overlap bit for `axis` on every pair of
/// differing-body endpoints that cross.
///
/// A swap moving endpoint `j` (originally to the right) past endpoint `i` to its left means:
/// if the endpoint now entering from the right is a lower bound while the one it passed is an
/// upper bound, the two intervals have started overlapping on this axis; the symmetric case
/// (an upper bound passing a lower bound while shrinking) means they stopped.
fn bubble_axis(list: &mut EndpointList, table: &mut OverlapTable, axis: Axis) {
    let len = list.endpoints.len();
    for i in 1..len {
        let mut j = i;
        while j > 0 && list.endpoints[j - 1].value > list.endpoints[j].value {
            let a = list.endpoints[j - 1];
            let b = list.endpoints[j];

            if a.body != b.body {
                // `b` (smaller value) is moving left past `a`.
                if b.is_upper && !a.is_upper {
                    // An upper bound moved left past a lower bound: the interval shrank past
                    // the other body's lower bound, so the overlap ends.
                    table.set_axis_overlap(a.body, b.body, axis, false);
                } else if !b.is_upper && a.is_upper {
                    // A lower bound moved left past an upper bound: intervals now overlap.
                    table.set_axis_overlap(a.body, b.body, axis, true);
                }
            }

            list.endpoints.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec3;

    use super::*;

    fn aabb(min: f64, max: f64) -> Aabb<f64> {
        Aabb {
            min: Vec3::broadcast(min),
            max: Vec3::broadcast(max),
        }
    }

    #[test]
    fn two_separate_bodies_do_not_overlap() {
        let mut bp = Broadphase::new(8);
        bp.add_body(0, aabb(0.0, 1.0));
        bp.add_body(1, aabb(5.0, 6.0));
        assert!(bp.active_pairs().is_empty());
    }

    #[test]
    fn moving_bodies_into_contact_activates_the_pair() {
        let mut bp = Broadphase::new(8);
        bp.add_body(0, aabb(0.0, 1.0));
        bp.add_body(1, aabb(5.0, 6.0));
        bp.update_body(1, aabb(0.5, 1.5));
        assert_eq!(bp.active_pairs(), &[(0, 1)]);
    }

    #[test]
    fn moving_bodies_apart_deactivates_the_pair() {
        let mut bp = Broadphase::new(8);
        bp.add_body(0, aabb(0.0, 1.0));
        bp.add_body(1, aabb(0.5, 1.5));
        assert_eq!(bp.active_pairs().len(), 1);

        bp.update_body(1, aabb(10.0, 11.0));
        assert!(bp.active_pairs().is_empty());
    }

    #[test]
    fn stress_many_bodies_converge_to_correct_pair_count() {
        let mut bp = Broadphase::new(64);
        for i in 0..20u32 {
            bp.add_body(i, aabb(i as f64, i as f64 + 1.5));
        }
        // Each body overlaps its immediate neighbour (extent 1.5 with unit spacing).
        assert_eq!(bp.active_pairs().len(), 19);
    }
}
