use std::time::{Duration, SystemTime};

pub trait SystemTimeExt {
    /// Whether two timestamps are at most `tolerance` apart, in either direction.
    fn is_within(&self, other: &SystemTime, tolerance: Duration) -> bool;
}

impl SystemTimeExt for SystemTime {
    fn is_within(&self, other: &SystemTime, tolerance: Duration) -> bool {
        let distance = self
            .duration_since(*other)
            .or_else(|_| other.duration_since(*self))
            .unwrap_or(Duration::MAX);
        distance <= tolerance
    }
}
