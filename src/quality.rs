//! Signal-quality grading from a latency sample.

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityState;

/// Latency ceilings (exclusive) for each grade.
const EXCELLENT_BELOW_MS: u64 = 50;
const GOOD_BELOW_MS: u64 = 100;
const FAIR_BELOW_MS: u64 = 200;

/// Discrete signal-quality grade.
///
/// Variants are ordered from worst to best so the derived `Ord` matches the
/// grade ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    Disconnected,
    Unknown,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityGrade {
    /// Number of signal bars (0-4) shown for this grade.
    pub fn bars(self) -> u8 {
        match self {
            QualityGrade::Disconnected | QualityGrade::Unknown => 0,
            QualityGrade::Poor => 1,
            QualityGrade::Fair => 2,
            QualityGrade::Good => 3,
            QualityGrade::Excellent => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityGrade::Disconnected => "Disconnected",
            QualityGrade::Unknown => "Unknown",
            QualityGrade::Poor => "Poor",
            QualityGrade::Fair => "Fair",
            QualityGrade::Good => "Good",
            QualityGrade::Excellent => "Excellent",
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Grade a connection. First matching rule wins:
/// offline is always `Disconnected`, a missing sample is `Unknown`,
/// otherwise latency buckets with strict upper bounds.
pub fn classify(connectivity: ConnectivityState, latency_ms: Option<u64>) -> QualityGrade {
    if connectivity == ConnectivityState::Offline {
        return QualityGrade::Disconnected;
    }
    match latency_ms {
        None => QualityGrade::Unknown,
        Some(ms) if ms < EXCELLENT_BELOW_MS => QualityGrade::Excellent,
        Some(ms) if ms < GOOD_BELOW_MS => QualityGrade::Good,
        Some(ms) if ms < FAIR_BELOW_MS => QualityGrade::Fair,
        Some(_) => QualityGrade::Poor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityState::{Offline, Online};

    #[test]
    fn test_boundaries_fall_into_slower_bucket() {
        assert_eq!(classify(Online, Some(49)), QualityGrade::Excellent);
        assert_eq!(classify(Online, Some(50)), QualityGrade::Good);
        assert_eq!(classify(Online, Some(99)), QualityGrade::Good);
        assert_eq!(classify(Online, Some(100)), QualityGrade::Fair);
        assert_eq!(classify(Online, Some(199)), QualityGrade::Fair);
        assert_eq!(classify(Online, Some(200)), QualityGrade::Poor);
        assert_eq!(classify(Online, Some(0)), QualityGrade::Excellent);
        assert_eq!(classify(Online, Some(u64::MAX)), QualityGrade::Poor);
    }

    #[test]
    fn test_offline_always_disconnected() {
        for latency in [None, Some(0), Some(49), Some(150), Some(10_000)] {
            assert_eq!(classify(Offline, latency), QualityGrade::Disconnected);
        }
    }

    #[test]
    fn test_online_without_sample_is_unknown() {
        assert_eq!(classify(Online, None), QualityGrade::Unknown);
        assert_eq!(classify(Online, None).bars(), 0);
    }

    #[test]
    fn test_grade_monotonic_in_latency() {
        let mut previous = classify(Online, Some(0));
        for ms in 1..=1000 {
            let grade = classify(Online, Some(ms));
            assert!(grade <= previous, "grade improved at {ms}ms");
            assert_eq!(grade, classify(Online, Some(ms)));
            previous = grade;
        }
    }

    #[test]
    fn test_bars_and_ordering() {
        assert!(QualityGrade::Disconnected < QualityGrade::Unknown);
        assert!(QualityGrade::Unknown < QualityGrade::Poor);
        assert!(QualityGrade::Good < QualityGrade::Excellent);
        assert_eq!(QualityGrade::Poor.bars(), 1);
        assert_eq!(QualityGrade::Fair.bars(), 2);
        assert_eq!(QualityGrade::Good.bars(), 3);
        assert_eq!(QualityGrade::Excellent.bars(), 4);
        assert_eq!(QualityGrade::Disconnected.to_string(), "Disconnected");
    }
}
