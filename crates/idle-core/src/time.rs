//! Wall-clock timestamps used by the simulation.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_secs(secs: f64) -> Self {
        Timestamp((secs * 1000.0).round() as i64)
    }

    /// Seconds elapsed from `earlier` to `self`. Negative when `earlier` is later.
    pub fn secs_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0) as f64 / 1000.0
    }

    pub fn plus_secs(self, secs: f64) -> Self {
        Timestamp(self.0 + (secs * 1000.0).round() as i64)
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_between_timestamps() {
        let t0 = Timestamp(1_000);
        let t1 = t0.plus_secs(2.5);
        assert_eq!(t1, Timestamp(3_500));
        assert!((t1.secs_since(t0) - 2.5).abs() < 1e-9);
        assert!(t0.secs_since(t1) < 0.0);
    }

    #[test]
    fn serializes_as_plain_number() {
        let s = serde_json::to_string(&Timestamp(42)).unwrap();
        assert_eq!(s, "42");
    }
}
