use blockmesh_interfaces::storage::HeightHistogram;
use blockmesh_primitives::BlockNumber;
use std::ops::RangeInclusive;

/// Outcome of one verification sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// The analyzed heights.
    pub range: RangeInclusive<BlockNumber>,
    /// Heights without any stored copy.
    pub missing: Vec<BlockNumber>,
    /// Missing heights that were enqueued again.
    pub requeued: Vec<BlockNumber>,
    /// Heights that had surplus copies removed, with the number removed.
    pub pruned: Vec<(BlockNumber, usize)>,
}

/// Classified heights of a storage histogram.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SweepPlan {
    pub(crate) missing: Vec<BlockNumber>,
    pub(crate) redundant: Vec<BlockNumber>,
}

impl SweepPlan {
    pub(crate) fn new(histogram: &HeightHistogram, redundancy: usize) -> Self {
        let mut plan = Self::default();
        for (&height, &copies) in histogram {
            if copies == 0 {
                plan.missing.push(height);
            } else if copies > redundancy {
                plan.redundant.push(height);
            }
        }
        plan
    }
}

/// Picks the window the next sweep analyzes.
///
/// Starts at `cursor` (or `start` if there is none or it is past `pointer`) and spans at most
/// `max_heights` heights. Returns the window and the cursor for the following sweep, which is
/// `None` once the window reached the pointer.
pub(crate) fn next_window(
    start: BlockNumber,
    pointer: BlockNumber,
    cursor: Option<BlockNumber>,
    max_heights: u64,
) -> (RangeInclusive<BlockNumber>, Option<BlockNumber>) {
    let from = cursor.filter(|cursor| *cursor <= pointer && *cursor >= start).unwrap_or(start);
    let to = from.saturating_add(max_heights.saturating_sub(1)).min(pointer);
    let cursor = if to >= pointer { None } else { Some(to + 1) };
    (from..=to, cursor)
}
