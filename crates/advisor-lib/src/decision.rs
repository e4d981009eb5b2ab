//! Replica decision engine
//!
//! Maps a service's weighted request rate and p95 latency to a categorical
//! decision and a replica count. The rules overlap, so they are evaluated as
//! a strict priority chain and the first match wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Redundancy factor used when the configured value is zero
pub const DEFAULT_REDUNDANCY_FACTOR: f64 = 1.5;

/// Replica floor used when nothing else is configured
pub const DEFAULT_MIN_REPLICAS: u32 = 3;

/// Categorical outcome for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    NoTraffic,
    ScaleOut,
    Keep,
    DownsizeSafe,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::NoTraffic => "NO_TRAFFIC",
            Decision::ScaleOut => "SCALE_OUT",
            Decision::Keep => "KEEP",
            Decision::DownsizeSafe => "DOWNSIZE_SAFE",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk of leaving the service as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Confidence in the recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

macro_rules! level_display {
    ($ty:ty) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    Self::Low => "LOW",
                    Self::Medium => "MEDIUM",
                    Self::High => "HIGH",
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

level_display!(RiskLevel);
level_display!(ConfidenceLevel);

/// Output of [`decide`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: Decision,
    pub recommended_replicas: u32,
    pub risk: RiskLevel,
    pub confidence: ConfidenceLevel,
    pub reason: String,
}

/// Classify a service and recommend a replica count
///
/// # Arguments
/// * `rps` - Weighted requests per second over the window
/// * `latency_ms` - p95 latency in milliseconds
/// * `redundancy_factor` - Slack multiplier; zero selects [`DEFAULT_REDUNDANCY_FACTOR`]
/// * `min_replicas` - Replica floor for the workload
///
/// The result is clamped up to `min_replicas` on every branch except
/// `DOWNSIZE_SAFE`, which is allowed to go below the floor.
pub fn decide(rps: f64, latency_ms: f64, redundancy_factor: f64, min_replicas: u32) -> DecisionResult {
    let redundancy = if redundancy_factor == 0.0 {
        DEFAULT_REDUNDANCY_FACTOR
    } else {
        redundancy_factor
    };

    let (decision, replicas, risk, confidence, reason) = if rps == 0.0 {
        (
            Decision::NoTraffic,
            min_replicas,
            RiskLevel::Low,
            ConfidenceLevel::High,
            "no traffic observed during the metrics window",
        )
    } else if latency_ms > 1000.0 || rps > 200.0 {
        (
            Decision::ScaleOut,
            ceil_replicas(rps / 15.0 * redundancy),
            RiskLevel::High,
            ConfidenceLevel::High,
            "high load or high latency, scale out required",
        )
    } else if latency_ms > 500.0 || rps > 100.0 {
        (
            Decision::ScaleOut,
            ceil_replicas(rps / 20.0 * redundancy),
            RiskLevel::Medium,
            ConfidenceLevel::High,
            "elevated load, scale out recommended",
        )
    } else if rps < 10.0 && latency_ms < 100.0 {
        let replicas = ceil_replicas(min_replicas as f64 * 0.8).max(1);
        return DecisionResult {
            decision: Decision::DownsizeSafe,
            recommended_replicas: replicas,
            risk: RiskLevel::Low,
            confidence: ConfidenceLevel::Medium,
            reason: "low load, safe to downsize".to_string(),
        };
    } else {
        (
            Decision::Keep,
            ceil_replicas(rps / 25.0 * redundancy),
            RiskLevel::Low,
            ConfidenceLevel::High,
            "metrics stable, keep current configuration",
        )
    };

    DecisionResult {
        decision,
        recommended_replicas: replicas.max(min_replicas),
        risk,
        confidence,
        reason: reason.to_string(),
    }
}

fn ceil_replicas(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.ceil().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_traffic_ignores_latency() {
        for latency in [0.0, 50.0, 5_000.0] {
            let result = decide(0.0, latency, 1.5, 4);
            assert_eq!(result.decision, Decision::NoTraffic);
            assert_eq!(result.recommended_replicas, 4);
            assert_eq!(result.risk, RiskLevel::Low);
            assert_eq!(result.confidence, ConfidenceLevel::High);
        }
    }

    #[test]
    fn test_first_scale_out_rule_wins() {
        let result = decide(150.0, 1200.0, 1.5, 3);
        assert_eq!(result.decision, Decision::ScaleOut);
        assert_eq!(result.recommended_replicas, 15);
        assert_eq!(result.risk, RiskLevel::High);
    }

    #[test]
    fn test_second_scale_out_rule() {
        let result = decide(150.0, 300.0, 1.5, 3);
        assert_eq!(result.decision, Decision::ScaleOut);
        // ceil(150 / 20 × 1.5) = ceil(11.25)
        assert_eq!(result.recommended_replicas, 12);
        assert_eq!(result.risk, RiskLevel::Medium);
        assert_eq!(result.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_high_rps_alone_triggers_scale_out() {
        let result = decide(300.0, 10.0, 1.5, 3);
        assert_eq!(result.decision, Decision::ScaleOut);
        assert_eq!(result.recommended_replicas, 30);
    }

    #[test]
    fn test_scale_out_is_clamped_to_floor() {
        // Latency alone triggers the rule; ceil(1 / 20 × 1.5) = 1
        let result = decide(1.0, 700.0, 1.5, 3);
        assert_eq!(result.decision, Decision::ScaleOut);
        assert_eq!(result.recommended_replicas, 3);
    }

    #[test]
    fn test_downsize_can_go_below_floor() {
        let result = decide(5.0, 40.0, 1.5, 5);
        assert_eq!(result.decision, Decision::DownsizeSafe);
        assert_eq!(result.recommended_replicas, 4);
        assert!(result.recommended_replicas < 5);
        assert_eq!(result.confidence, ConfidenceLevel::Medium);

        let result = decide(5.0, 40.0, 1.5, 3);
        assert_eq!(result.recommended_replicas, 3);
    }

    #[test]
    fn test_downsize_never_below_one() {
        let result = decide(2.0, 10.0, 1.5, 0);
        assert_eq!(result.decision, Decision::DownsizeSafe);
        assert_eq!(result.recommended_replicas, 1);
    }

    #[test]
    fn test_keep_clamps_up_to_floor() {
        let result = decide(50.0, 200.0, 1.5, 3);
        assert_eq!(result.decision, Decision::Keep);
        // ceil(50 / 25 × 1.5) = 3
        assert_eq!(result.recommended_replicas, 3);

        let result = decide(20.0, 150.0, 1.5, 6);
        assert_eq!(result.decision, Decision::Keep);
        assert_eq!(result.recommended_replicas, 6);
    }

    #[test]
    fn test_keep_when_latency_blocks_downsize() {
        let result = decide(5.0, 150.0, 1.5, 3);
        assert_eq!(result.decision, Decision::Keep);
        assert_eq!(result.recommended_replicas, 3);
    }

    #[test]
    fn test_zero_redundancy_uses_default() {
        assert_eq!(decide(90.0, 200.0, 0.0, 1), decide(90.0, 200.0, 1.5, 1));
    }

    #[test]
    fn test_decision_is_deterministic() {
        let a = decide(123.4, 456.7, 1.2, 3);
        let b = decide(123.4, 456.7, 1.2, 3);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_enum_rendering() {
        assert_eq!(Decision::DownsizeSafe.to_string(), "DOWNSIZE_SAFE");
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
        assert_eq!(
            serde_json::to_string(&Decision::NoTraffic).unwrap(),
            "\"NO_TRAFFIC\""
        );
    }
}
