use serde::{Deserialize, Serialize};

pub const SECONDS_PER_HOUR: i64 = 60 * 60;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Half-open `[from, to)` range of unix timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn duration(&self) -> i64 {
        self.to.saturating_sub(self.from).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.duration() == 0
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.from && timestamp < self.to
    }

    /// Splits at the midpoint, returning `(older, newer)`.
    pub fn bisect(&self) -> (Self, Self) {
        let mid = self.from + self.duration() / 2;
        (Self::new(self.from, mid), Self::new(mid, self.to))
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}
