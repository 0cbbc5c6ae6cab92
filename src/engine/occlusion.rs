//! ----------------------------------------------------------------------------
//! **1-D angular occlusion buffer**
//!
//! Tracks which view directions are already hidden behind solid,
//! floor-to-ceiling walls.  Angles are view-relative [`Bam`]s; a span runs
//! counter-clockwise from its *right* edge to its *left* edge.
//!
//! * Covered directions are kept as a sorted list of disjoint half-open runs
//!   over `[0, 2^32)`; touching runs are merged on insertion.
//! * A span crossing angle 0 is split into two linear pieces.
//! ----------------------------------------------------------------------------

use smallvec::SmallVec;

use crate::world::Bam;

const FULL: u64 = 1 << 32;

type Pieces = SmallVec<[(u64, u64); 2]>;

#[derive(Clone, Debug, Default)]
pub struct OcclusionBuffer {
    runs: Vec<(u64, u64)>,
}

impl OcclusionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every covered span (start of a frame).
    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// True once every direction is covered.
    pub fn is_full(&self) -> bool {
        self.runs.first() == Some(&(0, FULL))
    }

    /// Number of disjoint covered runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Is the span `right -> left` entirely covered already?
    ///
    /// An empty span (`right == left`) is trivially covered.
    pub fn test(&self, right: Bam, left: Bam) -> bool {
        split(right, left)
            .into_iter()
            .all(|(lo, hi)| self.contains(lo, hi))
    }

    /// Merge the span `right -> left` into the covered set.
    pub fn mark_covered(&mut self, right: Bam, left: Bam) {
        for (lo, hi) in split(right, left) {
            self.insert(lo, hi);
        }
    }

    fn contains(&self, lo: u64, hi: u64) -> bool {
        let idx = self.runs.partition_point(|r| r.0 <= lo);
        idx > 0 && self.runs[idx - 1].1 >= hi
    }

    fn insert(&mut self, mut lo: u64, mut hi: u64) {
        // first run that ends at/after `lo`, one past the last that starts at/before `hi`
        let start = self.runs.partition_point(|r| r.1 < lo);
        let end = self.runs.partition_point(|r| r.0 <= hi);

        if start < end {
            lo = lo.min(self.runs[start].0);
            hi = hi.max(self.runs[end - 1].1);
        }
        self.runs.splice(start..end, [(lo, hi)]);
    }
}

/// Linear pieces of the counter-clockwise span `right -> left`.
fn split(right: Bam, left: Bam) -> Pieces {
    let (r, l) = (right.0 as u64, left.0 as u64);
    let mut out = Pieces::new();

    if r < l {
        out.push((r, l));
    } else if r > l {
        out.push((r, FULL));
        if l > 0 {
            out.push((0, l));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deg(d: f32) -> Bam {
        Bam::from_degrees(d)
    }

    #[test]
    fn empty_buffer_covers_nothing() {
        let buf = OcclusionBuffer::new();
        assert!(!buf.test(deg(10.0), deg(20.0)));
        assert!(buf.test(deg(10.0), deg(10.0)));
    }

    #[test]
    fn subspans_of_a_marked_span_are_covered() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(deg(10.0), deg(50.0));

        assert!(buf.test(deg(10.0), deg(50.0)));
        assert!(buf.test(deg(20.0), deg(30.0)));
        assert!(!buf.test(deg(5.0), deg(30.0)));
        assert!(!buf.test(deg(40.0), deg(60.0)));
        assert!(!buf.test(deg(60.0), deg(70.0)));
    }

    #[test]
    fn touching_spans_merge_into_one_run() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(deg(10.0), deg(20.0));
        buf.mark_covered(deg(30.0), deg(40.0));
        assert_eq!(buf.run_count(), 2);
        assert!(!buf.test(deg(15.0), deg(35.0)));

        buf.mark_covered(deg(20.0), deg(30.0));
        assert_eq!(buf.run_count(), 1);
        assert!(buf.test(deg(15.0), deg(35.0)));
    }

    #[test]
    fn overlapping_insert_swallows_inner_runs() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(deg(10.0), deg(12.0));
        buf.mark_covered(deg(14.0), deg(16.0));
        buf.mark_covered(deg(18.0), deg(20.0));
        buf.mark_covered(deg(5.0), deg(25.0));
        assert_eq!(buf.run_count(), 1);
        assert!(buf.test(deg(5.0), deg(25.0)));
    }

    #[test]
    fn wraparound_span_is_covered_across_zero() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(deg(350.0), deg(10.0));

        assert!(buf.test(deg(355.0), deg(5.0)));
        assert!(buf.test(deg(0.0), deg(5.0)));
        assert!(buf.test(deg(352.0), deg(358.0)));
        assert!(!buf.test(deg(340.0), deg(5.0)));
        assert!(!buf.test(deg(180.0), deg(190.0)));
    }

    #[test]
    fn full_ring_after_two_halves() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(Bam::ZERO, Bam::ANG180);
        buf.mark_covered(Bam::ANG180, Bam::ZERO);
        assert!(buf.is_full());
        assert!(buf.test(deg(100.0), deg(90.0)));
    }

    #[test]
    fn clear_resets_coverage() {
        let mut buf = OcclusionBuffer::new();
        buf.mark_covered(deg(10.0), deg(50.0));
        buf.clear();
        assert!(!buf.test(deg(20.0), deg(30.0)));
    }
}
