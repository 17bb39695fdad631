use blockmesh_primitives::{BlockNumber, Priority};
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

/// A unit of work: fetch and store the block at `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTask {
    /// Height to sync.
    pub height: BlockNumber,
    /// Lane the task is serviced in.
    pub priority: Priority,
}

impl SyncTask {
    /// Creates a task.
    pub const fn new(height: BlockNumber, priority: Priority) -> Self {
        Self { height, priority }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct QueuedTask {
    task: SyncTask,
    seq: u64,
}

impl Ord for QueuedTask {
    // `BinaryHeap` is a max-heap: the lowest priority value and the oldest insertion rank highest
    fn cmp(&self, other: &Self) -> Ordering {
        other.task.priority.cmp(&self.task.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending tasks, lowest priority value first and FIFO within a priority.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
    /// Number of queued tasks per height.
    heights: HashMap<BlockNumber, usize>,
}

impl TaskQueue {
    pub(crate) fn push(&mut self, task: SyncTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        *self.heights.entry(task.height).or_default() += 1;
        self.heap.push(QueuedTask { task, seq });
    }

    pub(crate) fn pop(&mut self) -> Option<SyncTask> {
        let QueuedTask { task, .. } = self.heap.pop()?;
        if let Some(count) = self.heights.get_mut(&task.height) {
            *count -= 1;
            if *count == 0 {
                self.heights.remove(&task.height);
            }
        }
        Some(task)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn contains(&self, height: BlockNumber) -> bool {
        self.heights.contains_key(&height)
    }
}
