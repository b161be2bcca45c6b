//! Sequence-gap tracking for one frame-set.
//!
//! A [`GapList`] records which sequence numbers of a frame-set have not
//! been seen yet, as a sorted set of inclusive ranges. It is the state
//! behind outbound Acknack frames: the receiver reports `[low, high]`
//! watermarks plus the holes in between, and the sender retransmits.
//!
//! Invariant: ranges are ascending, disjoint, and never adjacent.
//! Adjacent ranges cannot arise because the number separating them was,
//! by construction, observed.

use serde::{Deserialize, Serialize};

/// An inclusive range `[start, end]` of missing sequence numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GapRange {
    pub start: u64,
    pub end: u64,
}

impl GapRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    fn contains(&self, value: u64) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Gap tracker for a single frame-set.
///
/// Created empty per connection session; every frame carrying a sequence
/// number feeds [`observe`](Self::observe).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapList {
    /// Lowest and highest sequence numbers observed so far.
    watermarks: Option<(u64, u64)>,
    gaps: Vec<GapRange>,
}

impl GapList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `seq` arrived.
    ///
    /// A jump above the high watermark opens a gap for the skipped
    /// numbers; a value inside an existing gap shrinks or splits it;
    /// duplicates and already-resolved values are no-ops.
    pub fn observe(&mut self, seq: u64) {
        let Some((low, high)) = self.watermarks else {
            self.watermarks = Some((seq, seq));
            return;
        };

        if seq > high {
            if seq > high + 1 {
                self.gaps.push(GapRange::new(high + 1, seq - 1));
            }
            self.watermarks = Some((low, seq));
        } else if seq < low {
            if seq + 1 < low {
                self.gaps.insert(0, GapRange::new(seq + 1, low - 1));
            }
            self.watermarks = Some((seq, high));
        } else {
            self.fill(seq);
        }
    }

    fn fill(&mut self, seq: u64) {
        let Some(idx) = self.gaps.iter().position(|g| g.contains(seq)) else {
            return; // duplicate or already resolved
        };
        let gap = self.gaps[idx];

        if gap.start == seq && gap.end == seq {
            self.gaps.remove(idx);
        } else if gap.start == seq {
            self.gaps[idx].start = seq + 1;
        } else if gap.end == seq {
            self.gaps[idx].end = seq - 1;
        } else {
            self.gaps[idx].end = seq - 1;
            self.gaps.insert(idx + 1, GapRange::new(seq + 1, gap.end));
        }
    }

    /// Clear all tracked state. Used after a validated Acknack round-trip
    /// or a reset frame confirms the sender's view.
    pub fn reset(&mut self) {
        self.watermarks = None;
        self.gaps.clear();
    }

    /// Current gaps, ascending and disjoint.
    pub fn snapshot(&self) -> Vec<GapRange> {
        self.gaps.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    /// Lowest sequence number observed, or 0 before any arrival.
    pub fn lowest(&self) -> u64 {
        self.watermarks.map_or(0, |(low, _)| low)
    }

    /// Highest sequence number observed, or 0 before any arrival.
    pub fn highest(&self) -> u64 {
        self.watermarks.map_or(0, |(_, high)| high)
    }
}
