//! Triangular overlap bitfield table and the active overlap list it indexes into.
//!
//! For `n` dynamic bodies there are `n*(n-1)/2` unordered pairs. Each pair gets one `u32` entry
//! packing three per-axis overlap bits plus a back-index into the compact active-pair list, so
//! testing "are these two AABBs overlapping on all three axes" and "is this pair already in the
//! active list" are both O(1), and removing a pair from the active list is O(1) via swap-with-tail.

/// Bit for "overlapping on the X axis".
const X_BIT: u32 = 0x8000_0000;
/// Bit for "overlapping on the Y axis".
const Y_BIT: u32 = 0x4000_0000;
/// Bit for "overlapping on the Z axis".
const Z_BIT: u32 = 0x2000_0000;
/// All three axis bits.
const XYZ_BITS: u32 = X_BIT | Y_BIT | Z_BIT;
/// Mask isolating the back-index into the active list.
const INDEX_MASK: u32 = 0x1FFF_FFFF;

/// Which axis an [`OverlapTable::set_axis_overlap`] call concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X.
    X,
    /// Y.
    Y,
    /// Z.
    Z,
}

impl Axis {
    fn bit(self) -> u32 {
        match self {
            Axis::X => X_BIT,
            Axis::Y => Y_BIT,
            Axis::Z => Z_BIT,
        }
    }
}

/// Triangular table of per-pair overlap bits, plus the compact list of pairs overlapping on all
/// three axes.
#[derive(Debug, Clone)]
pub struct OverlapTable {
    entries: Vec<u32>,
    active: Vec<(u32, u32)>,
    capacity: usize,
}

impl OverlapTable {
    /// Build a table sized for up to `capacity` dense body indices.
    pub fn new(capacity: usize) -> Self {
        let n_pairs = triangular_size(capacity);
        Self {
            entries: vec![0; n_pairs],
            active: Vec::new(),
            capacity,
        }
    }

    /// Configured body-index capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently active (all-three-axes-overlapping) pairs.
    pub fn active_pairs(&self) -> &[(u32, u32)] {
        &self.active
    }

    fn table_index(a: u32, b: u32) -> usize {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        (hi as usize * (hi as usize - 1)) / 2 + lo as usize
    }

    /// Set or clear the overlap bit for `axis` on pair `(a, b)`.
    ///
    /// Returns `true` if this call caused the pair to transition into or out of the active
    /// list (i.e. it now has, or no longer has, all three axis bits set).
    pub fn set_axis_overlap(&mut self, a: u32, b: u32, axis: Axis, overlapping: bool) -> bool {
        debug_assert_ne!(a, b, "a body cannot overlap with itself");

        let idx = Self::table_index(a, b);
        let entry = self.entries[idx];
        let was_full = (entry & XYZ_BITS) == XYZ_BITS;

        let bit = axis.bit();
        let new_entry = if overlapping { entry | bit } else { entry & !bit };
        let is_full = (new_entry & XYZ_BITS) == XYZ_BITS;

        if was_full == is_full {
            self.entries[idx] = new_entry;
            return false;
        }

        if is_full {
            let back_index = self.active.len() as u32;
            self.active.push((a.min(b), a.max(b)));
            self.entries[idx] = (new_entry & !INDEX_MASK) | back_index;
        } else {
            let back_index = (entry & INDEX_MASK) as usize;
            self.detach(back_index);
            self.entries[idx] = new_entry & !INDEX_MASK;
        }

        true
    }

    fn detach(&mut self, back_index: usize) {
        let last = self.active.len() - 1;
        if back_index != last {
            let moved = self.active[last];
            self.active[back_index] = moved;
            let moved_idx = Self::table_index(moved.0, moved.1);
            self.entries[moved_idx] =
                (self.entries[moved_idx] & !INDEX_MASK) | (back_index as u32);
        }
        self.active.pop();
    }

    /// Remove every entry touching body index `b` (used when a body is unregistered), leaving
    /// the table consistent for reuse of that index by a future body.
    pub fn remove_body(&mut self, b: u32, live_indices: impl Iterator<Item = u32>) {
        for other in live_indices {
            if other == b {
                continue;
            }
            let idx = Self::table_index(b, other);
            let entry = self.entries[idx];
            if (entry & XYZ_BITS) == XYZ_BITS {
                let back_index = (entry & INDEX_MASK) as usize;
                self.detach(back_index);
            }
            self.entries[idx] = 0;
        }
    }

    /// Debug-only bijection check: every active-list entry's back-index must point to an entry
    /// whose bits mark it full, and vice versa.
    #[cfg(debug_assertions)]
    pub fn verify(&self) {
        for (slot, &(a, b)) in self.active.iter().enumerate() {
            let idx = Self::table_index(a, b);
            let entry = self.entries[idx];
            debug_assert_eq!(entry & XYZ_BITS, XYZ_BITS);
            debug_assert_eq!((entry & INDEX_MASK) as usize, slot);
        }
    }
}

fn triangular_size(capacity: usize) -> usize {
    if capacity == 0 {
        0
    } else {
        capacity * (capacity - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_becomes_active_only_once_all_three_axes_overlap() {
        let mut table = OverlapTable::new(8);

        assert!(!table.set_axis_overlap(1, 3, Axis::X, true));
        assert!(!table.set_axis_overlap(1, 3, Axis::Y, true));
        assert!(table.active_pairs().is_empty());

        assert!(table.set_axis_overlap(1, 3, Axis::Z, true));
        assert_eq!(table.active_pairs(), &[(1, 3)]);
    }

    #[test]
    fn clearing_any_axis_deactivates_the_pair() {
        let mut table = OverlapTable::new(8);
        table.set_axis_overlap(2, 5, Axis::X, true);
        table.set_axis_overlap(2, 5, Axis::Y, true);
        table.set_axis_overlap(2, 5, Axis::Z, true);
        assert_eq!(table.active_pairs().len(), 1);

        assert!(table.set_axis_overlap(2, 5, Axis::Y, false));
        assert!(table.active_pairs().is_empty());
    }

    #[test]
    fn detach_swaps_with_tail_and_fixes_back_index() {
        let mut table = OverlapTable::new(8);
        for (a, b) in [(0u32, 1u32), (2, 3), (4, 5)] {
            for axis in [Axis::X, Axis::Y, Axis::Z] {
                table.set_axis_overlap(a, b, axis, true);
            }
        }
        assert_eq!(table.active_pairs().len(), 3);

        // Deactivate the first pair; the former tail entry should take its slot.
        table.set_axis_overlap(0, 1, Axis::X, false);
        assert_eq!(table.active_pairs().len(), 2);
        table.verify();
    }

    #[test]
    fn order_of_pair_arguments_does_not_matter() {
        let mut table = OverlapTable::new(8);
        table.set_axis_overlap(5, 1, Axis::X, true);
        table.set_axis_overlap(1, 5, Axis::Y, true);
        table.set_axis_overlap(5, 1, Axis::Z, true);
        assert_eq!(table.active_pairs(), &[(1, 5)]);
    }
}
