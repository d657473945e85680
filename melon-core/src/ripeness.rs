//! # Ripeness Model
//!
//! Turns the dominant tap frequency and the fruit's mass into a ripeness
//! index, a verdict, a sweetness estimate in °Brix and a 0-100 score.
//!
//! The index is `f² · m^(2/3)`. Lower is riper: a ripe melon rings lower
//! for its size than a firm, unripe one.

use serde::Serialize;

use crate::error::ThumpError;

/// Index below which a melon is considered ripe.
pub const RIPE_LIMIT: f64 = 74_000.0;

/// Index from which a melon is considered unripe.
pub const UNRIPE_LIMIT: f64 = 85_000.0;

/// Index that maps to the best score (100) and to 12 °Brix.
pub const BEST_INDEX: f64 = 60_000.0;

/// Index that maps to the worst score (0).
pub const WORST_INDEX: f64 = 95_000.0;

/// Index span over which sweetness drops by 4 °Brix.
const SWEETNESS_SPAN: f64 = 30_000.0;

pub const MIN_BRIX: f64 = 5.0;
pub const MAX_BRIX: f64 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ripe,
    Borderline,
    Unripe,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Ripe => "ripe",
            Verdict::Borderline => "borderline",
            Verdict::Unripe => "unripe",
        }
    }

    /// Presentation class for front-ends that style the verdict.
    pub fn class(&self) -> &'static str {
        match self {
            Verdict::Ripe => "verdict-ripe",
            Verdict::Borderline => "verdict-borderline",
            Verdict::Unripe => "verdict-unripe",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RipenessResult {
    pub base_frequency_hz: f64,
    pub ripeness_index: f64,
    /// Always within `[0, 100]`.
    pub ripeness_score: f64,
    /// Always within `[5, 13]`.
    pub sweetness_brix: f64,
    pub verdict: Verdict,
}

impl RipenessResult {
    pub fn verdict_class(&self) -> &'static str {
        self.verdict.class()
    }
}

/// Computes the full ripeness result for a detected tap.
///
/// No rounding is applied; that is left to whoever displays the result.
///
/// # Arguments
/// * `frequency_hz` - Dominant frequency of the tap
/// * `mass_kg` - Mass of the fruit, must be strictly positive
///
/// # Returns
/// * `Ok(RipenessResult)` - Deterministic for identical inputs
/// * `Err(ThumpError::Validation)` - If `mass_kg` is not a positive number
pub fn compute(frequency_hz: f64, mass_kg: f64) -> Result<RipenessResult, ThumpError> {
    if !(mass_kg.is_finite() && mass_kg > 0.0) {
        return Err(ThumpError::validation(format!(
            "mass must be a positive number of kilograms, got {mass_kg}"
        )));
    }

    let ripeness_index = ripeness_index(frequency_hz, mass_kg);

    Ok(RipenessResult {
        base_frequency_hz: frequency_hz,
        ripeness_index,
        ripeness_score: score_for(ripeness_index),
        sweetness_brix: sweetness_for(ripeness_index),
        verdict: classify(ripeness_index),
    })
}

/// `f² · m^(2/3)`.
pub fn ripeness_index(frequency_hz: f64, mass_kg: f64) -> f64 {
    frequency_hz * frequency_hz * mass_kg.powf(2.0 / 3.0)
}

/// Classifies an index; both transitions include their lower bound.
pub fn classify(ripeness_index: f64) -> Verdict {
    if ripeness_index < RIPE_LIMIT {
        Verdict::Ripe
    } else if ripeness_index < UNRIPE_LIMIT {
        Verdict::Borderline
    } else {
        Verdict::Unripe
    }
}

/// Estimated sugar content in °Brix, clamped to `[5, 13]`.
pub fn sweetness_for(ripeness_index: f64) -> f64 {
    (12.0 - 4.0 * (ripeness_index - BEST_INDEX) / SWEETNESS_SPAN).clamp(MIN_BRIX, MAX_BRIX)
}

/// Normalised score: 100 at [`BEST_INDEX`], 0 at [`WORST_INDEX`], clamped outside.
pub fn score_for(ripeness_index: f64) -> f64 {
    (100.0 * (WORST_INDEX - ripeness_index) / (WORST_INDEX - BEST_INDEX)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_tap_on_average_melon_is_ripe_and_sweet() {
        let result = compute(120.0, 4.5).unwrap();
        let expected_index = 14_400.0 * 4.5_f64.powf(2.0 / 3.0);

        assert!((result.ripeness_index - expected_index).abs() < 1e-9);
        assert!(result.ripeness_index > 39_000.0 && result.ripeness_index < 40_000.0);
        assert_eq!(result.verdict, Verdict::Ripe);
        assert_eq!(result.sweetness_brix, 13.0);
        assert_eq!(result.ripeness_score, 100.0);
        assert_eq!(result.base_frequency_hz, 120.0);
    }

    #[test]
    fn best_anchor() {
        assert_eq!(score_for(60_000.0), 100.0);
        assert_eq!(sweetness_for(60_000.0), 12.0);
    }

    #[test]
    fn worst_anchor() {
        assert_eq!(score_for(95_000.0), 0.0);
        assert_eq!(score_for(200_000.0), 0.0);
        assert_eq!(sweetness_for(200_000.0), 5.0);
    }

    #[test]
    fn score_is_linear_between_anchors() {
        assert!((score_for(77_500.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn verdict_boundaries() {
        assert_eq!(classify(73_999.999), Verdict::Ripe);
        assert_eq!(classify(74_000.0), Verdict::Borderline);
        assert_eq!(classify(84_999.999), Verdict::Borderline);
        assert_eq!(classify(85_000.0), Verdict::Unripe);
    }

    #[test]
    fn high_tap_is_unripe() {
        let result = compute(300.0, 4.5).unwrap();
        assert_eq!(result.verdict, Verdict::Unripe);
        assert_eq!(result.ripeness_score, 0.0);
        assert_eq!(result.sweetness_brix, 5.0);
        assert_eq!(result.verdict_class(), "verdict-unripe");
    }

    #[test]
    fn outputs_stay_in_range() {
        for f in (50..=400).step_by(10) {
            for m in [0.5, 2.0, 4.5, 9.0, 15.0] {
                let r = compute(f as f64, m).unwrap();
                assert!((0.0..=100.0).contains(&r.ripeness_score));
                assert!((MIN_BRIX..=MAX_BRIX).contains(&r.sweetness_brix));
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_bits() {
        let a = compute(163.7, 5.25).unwrap();
        let b = compute(163.7, 5.25).unwrap();
        assert_eq!(a.ripeness_index.to_bits(), b.ripeness_index.to_bits());
        assert_eq!(a.ripeness_score.to_bits(), b.ripeness_score.to_bits());
        assert_eq!(a.sweetness_brix.to_bits(), b.sweetness_brix.to_bits());
        assert_eq!(a.verdict, b.verdict);
    }

    #[test]
    fn rejects_non_positive_mass() {
        for mass in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(compute(150.0, mass), Err(ThumpError::Validation(_))));
        }
    }

    #[test]
    fn verdict_serialises_lowercase() {
        let json = serde_json::to_string(&Verdict::Borderline).unwrap();
        assert_eq!(json, "\"borderline\"");
    }
}
