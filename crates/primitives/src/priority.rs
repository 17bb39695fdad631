use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority of a sync task.
///
/// Lower values are serviced first. Tasks sharing a priority are serviced in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    /// Lane for heights whose previous attempt failed.
    pub const RETRY: Self = Self(0);
    /// Lane for heights found missing by the verification sweep.
    pub const VERIFY: Self = Self(0);
    /// Lane for normal forward progress.
    pub const DEFAULT: Self = Self(5);
    /// Lane used by the top-up timer once the queue has drained.
    pub const CAUGHT_UP: Self = Self(5);

    /// Returns true if `self` is serviced before `other`.
    pub const fn is_more_urgent_than(&self, other: &Self) -> bool {
        self.0 < other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_lane_is_most_urgent() {
        assert!(Priority::RETRY.is_more_urgent_than(&Priority::DEFAULT));
        assert!(!Priority::DEFAULT.is_more_urgent_than(&Priority::RETRY));
        assert!(!Priority::RETRY.is_more_urgent_than(&Priority::VERIFY));
        assert_eq!(Priority::default(), Priority::DEFAULT);
    }
}
