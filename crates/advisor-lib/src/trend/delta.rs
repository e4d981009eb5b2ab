//! Two-point delta trend classification
//!
//! Compares only the first and last samples against a fixed absolute
//! threshold. Cruder than the regression strategy and kept for the
//! lower-fidelity daily report.

use super::{TrendLabel, TrendResult, TrendStrategy};

/// Minimum samples required for a delta label
pub const DELTA_MIN_SAMPLES: usize = 2;

/// Absolute change between first and last sample that counts as a trend
pub const DELTA_THRESHOLD: f64 = 50.0;

/// First-versus-last trend strategy
#[derive(Debug, Clone)]
pub struct DeltaTrend {
    pub threshold: f64,
}

impl Default for DeltaTrend {
    fn default() -> Self {
        Self {
            threshold: DELTA_THRESHOLD,
        }
    }
}

impl TrendStrategy for DeltaTrend {
    fn name(&self) -> &'static str {
        "delta"
    }

    /// The reported slope is the raw `last - first` delta
    fn analyze(&self, values: &[f64]) -> TrendResult {
        let (first, last) = match (values.first(), values.last()) {
            (Some(first), Some(last)) if values.len() >= DELTA_MIN_SAMPLES => (*first, *last),
            _ => return TrendResult::insufficient(self.name()),
        };

        let delta = last - first;
        let label = if delta > self.threshold {
            TrendLabel::Rising
        } else if delta < -self.threshold {
            TrendLabel::Falling
        } else {
            TrendLabel::Stable
        };

        TrendResult {
            label,
            slope: delta,
            strategy: self.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_points_are_enough() {
        let result = DeltaTrend::default().analyze(&[100.0, 200.0]);
        assert_eq!(result.label, TrendLabel::Rising);
        assert_eq!(result.slope, 100.0);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let result = DeltaTrend::default().analyze(&[100.0]);
        assert_eq!(result.label, TrendLabel::InsufficientData);
        assert_eq!(result.slope, 0.0);
        assert_eq!(DeltaTrend::default().analyze(&[]).label, TrendLabel::InsufficientData);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let strategy = DeltaTrend::default();
        assert_eq!(strategy.analyze(&[0.0, 50.0]).label, TrendLabel::Stable);
        assert_eq!(strategy.analyze(&[0.0, -50.0]).label, TrendLabel::Stable);
        assert_eq!(strategy.analyze(&[0.0, 50.5]).label, TrendLabel::Rising);
        assert_eq!(strategy.analyze(&[300.0, 100.0]).label, TrendLabel::Falling);
    }

    #[test]
    fn test_middle_samples_ignored() {
        let result = DeltaTrend::default().analyze(&[10.0, 900.0, -400.0, 20.0]);
        assert_eq!(result.label, TrendLabel::Stable);
        assert_eq!(result.slope, 10.0);
    }
}
