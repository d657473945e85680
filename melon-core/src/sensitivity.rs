//! # Sensitivity Module
//!
//! Maps the user-facing sensitivity dial onto the two thresholds the
//! thump detector checks every frame. Higher sensitivity lowers both
//! thresholds, so quieter and less prominent taps are accepted.

/// Lowest accepted dial position.
pub const MIN_SENSITIVITY: f64 = 1.0;

/// Highest accepted dial position.
pub const MAX_SENSITIVITY: f64 = 20.0;

/// Detection thresholds in the `0..=255` magnitude scale of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    /// The band peak must exceed this value outright.
    pub absolute_threshold: f64,
    /// The band peak must exceed the band average by more than this value.
    pub relative_threshold: f64,
}

/// Converts a sensitivity dial value into a [`ThresholdPair`].
///
/// The dial is clamped to `[1, 20]` first; a NaN dial is treated as the
/// least sensitive setting.
///
/// # Arguments
/// * `sensitivity` - Dial position, nominally `1..=20`
///
/// # Returns
/// * `ThresholdPair` with `absolute = 160 - 10s` and `relative = 45 - 3s`
pub fn thresholds(sensitivity: f64) -> ThresholdPair {
    let s = if sensitivity.is_nan() {
        MIN_SENSITIVITY
    } else {
        sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    };

    ThresholdPair {
        absolute_threshold: 160.0 - 10.0 * s,
        relative_threshold: 45.0 - 3.0 * s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_linear_formulas_across_dial() {
        for s in 1..=20 {
            let s = s as f64;
            let pair = thresholds(s);
            assert_eq!(pair.absolute_threshold, 160.0 - 10.0 * s);
            assert_eq!(pair.relative_threshold, 45.0 - 3.0 * s);
        }
    }

    #[test]
    fn strictly_decreasing_in_sensitivity() {
        for s in 1..20 {
            let lower = thresholds(s as f64);
            let higher = thresholds((s + 1) as f64);
            assert!(higher.absolute_threshold < lower.absolute_threshold);
            assert!(higher.relative_threshold < lower.relative_threshold);
        }
    }

    #[test]
    fn default_dial_position() {
        let pair = thresholds(8.0);
        assert_eq!(pair.absolute_threshold, 80.0);
        assert_eq!(pair.relative_threshold, 21.0);
    }

    #[test]
    fn out_of_range_dial_is_clamped() {
        assert_eq!(thresholds(0.0), thresholds(1.0));
        assert_eq!(thresholds(-50.0), thresholds(1.0));
        assert_eq!(thresholds(99.0), thresholds(20.0));
        assert_eq!(thresholds(f64::INFINITY), thresholds(20.0));
        assert_eq!(thresholds(f64::NAN), thresholds(1.0));
    }

    #[test]
    fn outputs_are_finite() {
        for s in [f64::NEG_INFINITY, -1.0, 0.5, 7.5, 20.0, f64::INFINITY, f64::NAN] {
            let pair = thresholds(s);
            assert!(pair.absolute_threshold.is_finite());
            assert!(pair.relative_threshold.is_finite());
        }
    }
}
