//! Significance testing for click-through experiments.
//!
//! A two-proportion Z-test decides whether the click rate of a treatment arm
//! differs from the control arm. For experiments with more than two arms the
//! best-performing challenger is compared against the first variant, which
//! always plays the role of control.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::types::VariantMetrics;

/// Confidence required before a winner is declared.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.95;

/// Below this many impressions in either arm the test keeps waiting for data
/// instead of calling the result inconclusive.
pub const DEFAULT_MIN_SAMPLE_IMPRESSIONS: u64 = 1000;

#[derive(Debug, Error, PartialEq)]
pub enum StatisticsError {
    #[error("Need at least 2 variants to compare, found {found}")]
    InsufficientVariants { found: usize },
}

/// Decision thresholds for a significance test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_confidence: f64,
    pub min_sample_impressions: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_sample_impressions: DEFAULT_MIN_SAMPLE_IMPRESSIONS,
        }
    }
}

impl Thresholds {
    pub fn with_min_confidence(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Wait,
    DeclareWinner,
    Inconclusive,
}

/// Which arm of a two-arm test won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Control,
    Treatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub winner: Option<Arm>,
    pub confidence: f64,
    pub is_significant: bool,
    /// Relative improvement of the winner over the loser.
    pub uplift: f64,
    pub recommendation: Recommendation,
    pub p_value: f64,
}

impl SignificanceResult {
    fn no_signal() -> Self {
        Self {
            winner: None,
            confidence: 0.0,
            is_significant: false,
            uplift: 0.0,
            recommendation: Recommendation::Wait,
            p_value: 1.0,
        }
    }
}

/// Outcome of comparing the control variant against its strongest challenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub comparison: String,
    pub control_id: String,
    pub challenger_id: String,
    pub control_ctr: f64,
    pub treatment_ctr: f64,
    pub winner_id: Option<String>,
    pub winner_confidence: f64,
    pub is_significant: bool,
    pub uplift: f64,
    pub recommendation: Recommendation,
    pub p_value: f64,
}

/// Standard normal CDF (Abramowitz and Stegun 7.1.26, absolute error < 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Two-tailed two-proportion Z-test of treatment against control.
pub fn two_proportion_test(
    control_clicks: u64,
    control_impressions: u64,
    treatment_clicks: u64,
    treatment_impressions: u64,
    thresholds: Thresholds,
) -> SignificanceResult {
    if control_impressions == 0 || treatment_impressions == 0 {
        return SignificanceResult::no_signal();
    }

    let n1 = control_impressions as f64;
    let n2 = treatment_impressions as f64;
    let p1 = control_clicks as f64 / n1;
    let p2 = treatment_clicks as f64 / n2;

    let p_pool = (control_clicks + treatment_clicks) as f64 / (n1 + n2);
    let se = (p_pool * (1.0 - p_pool) * (1.0 / n1 + 1.0 / n2)).sqrt();

    // NaN guard as well: clicks > impressions would make the variance negative.
    if se == 0.0 || se.is_nan() {
        return SignificanceResult::no_signal();
    }

    let z = (p2 - p1) / se;
    let p_value = (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0);
    let confidence = 1.0 - p_value;
    let is_significant = confidence >= thresholds.min_confidence;

    let (winner, uplift) = if !is_significant {
        (None, 0.0)
    } else if p2 > p1 {
        (Some(Arm::Treatment), if p1 > 0.0 { (p2 - p1) / p1 } else { 0.0 })
    } else {
        (Some(Arm::Control), if p2 > 0.0 { (p1 - p2) / p2 } else { 0.0 })
    };

    let recommendation = if is_significant {
        Recommendation::DeclareWinner
    } else if control_impressions < thresholds.min_sample_impressions
        || treatment_impressions < thresholds.min_sample_impressions
    {
        Recommendation::Wait
    } else {
        Recommendation::Inconclusive
    };

    SignificanceResult {
        winner,
        confidence,
        is_significant,
        uplift: round_to(uplift, 4),
        recommendation,
        p_value: round_to(p_value, 6),
    }
}

/// Compare the first variant (control) against the best-performing other one.
pub fn multi_variant_compare(
    variants: &[VariantMetrics],
    thresholds: Thresholds,
) -> Result<ComparisonResult, StatisticsError> {
    if variants.len() < 2 {
        return Err(StatisticsError::InsufficientVariants {
            found: variants.len(),
        });
    }

    let control = &variants[0];

    // Stable sort keeps encounter order among equal CTRs.
    let mut ranked: Vec<&VariantMetrics> = variants.iter().collect();
    ranked.sort_by(|a, b| b.ctr.total_cmp(&a.ctr));

    let mut challenger = ranked[0];
    if challenger.thumbnail_id == control.thumbnail_id {
        challenger = ranked[1];
    }

    let result = two_proportion_test(
        control.clicks,
        control.impressions,
        challenger.clicks,
        challenger.impressions,
        thresholds,
    );

    let winner_id = result.winner.map(|arm| match arm {
        Arm::Control => control.thumbnail_id.clone(),
        Arm::Treatment => challenger.thumbnail_id.clone(),
    });

    Ok(ComparisonResult {
        comparison: format!("{} vs {}", control.thumbnail_id, challenger.thumbnail_id),
        control_id: control.thumbnail_id.clone(),
        challenger_id: challenger.thumbnail_id.clone(),
        control_ctr: control.ctr,
        treatment_ctr: challenger.ctr,
        winner_id,
        winner_confidence: result.confidence,
        is_significant: result.is_significant,
        uplift: result.uplift,
        recommendation: result.recommendation,
        p_value: result.p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn variant(id: &str, impressions: u64, clicks: u64) -> VariantMetrics {
        VariantMetrics::new(id, "face_focused", impressions, clicks)
    }

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-4);
        assert!(normal_cdf(8.0) > 0.9999999);
    }

    #[test]
    fn test_identical_rates_are_inconclusive() {
        let result = two_proportion_test(500, 10_000, 500, 10_000, Thresholds::default());

        assert_eq!(result.recommendation, Recommendation::Inconclusive);
        assert_eq!(result.winner, None);
        assert!(result.confidence < 0.95);
        assert!(!result.is_significant);
    }

    #[test]
    fn test_clear_treatment_lift_declares_winner() {
        let result = two_proportion_test(50, 1_000, 150, 1_000, Thresholds::default());

        assert_eq!(result.recommendation, Recommendation::DeclareWinner);
        assert_eq!(result.winner, Some(Arm::Treatment));
        assert!((result.uplift - 2.0).abs() < 1e-3);
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_control_can_win() {
        let result = two_proportion_test(150, 1_000, 50, 1_000, Thresholds::default());
        assert_eq!(result.winner, Some(Arm::Control));
        assert!((result.uplift - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_impressions_waits() {
        let result = two_proportion_test(0, 0, 10, 100, Thresholds::default());
        assert_eq!(result.recommendation, Recommendation::Wait);
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_zero_standard_error_waits() {
        // No clicks anywhere: pooled proportion is 0.
        let result = two_proportion_test(0, 5_000, 0, 5_000, Thresholds::default());
        assert_eq!(result.recommendation, Recommendation::Wait);
        assert_eq!(result.winner, None);
    }

    #[test]
    fn test_small_samples_wait_instead_of_inconclusive() {
        let result = two_proportion_test(50, 900, 52, 900, Thresholds::default());
        assert_eq!(result.recommendation, Recommendation::Wait);
    }

    #[test]
    fn test_uplift_zero_when_loser_rate_is_zero() {
        let result = two_proportion_test(0, 2_000, 200, 2_000, Thresholds::default());
        assert_eq!(result.winner, Some(Arm::Treatment));
        assert_eq!(result.uplift, 0.0);
    }

    #[test]
    fn test_multi_variant_requires_two_variants() {
        let err = multi_variant_compare(&[variant("a", 100, 5)], Thresholds::default())
            .unwrap_err();
        assert_eq!(err, StatisticsError::InsufficientVariants { found: 1 });
    }

    #[test]
    fn test_multi_variant_skips_control_when_it_leads() {
        let variants = vec![
            variant("control", 10_000, 1_200),
            variant("second", 10_000, 900),
            variant("third", 10_000, 500),
        ];

        let result = multi_variant_compare(&variants, Thresholds::default()).unwrap();

        assert_eq!(result.challenger_id, "second");
        assert_eq!(result.comparison, "control vs second");
        assert_eq!(result.winner_id.as_deref(), Some("control"));
    }

    #[test]
    fn test_multi_variant_maps_treatment_to_thumbnail_id() {
        let variants = vec![
            variant("control", 5_000, 250),
            variant("b", 5_000, 300),
            variant("c", 5_000, 600),
        ];

        let result = multi_variant_compare(&variants, Thresholds::default()).unwrap();

        assert_eq!(result.challenger_id, "c");
        assert_eq!(result.winner_id.as_deref(), Some("c"));
        assert_eq!(result.recommendation, Recommendation::DeclareWinner);
        assert!((result.control_ctr - 0.05).abs() < 1e-9);
        assert!((result.treatment_ctr - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_multi_variant_ties_keep_encounter_order() {
        let variants = vec![
            variant("control", 1_000, 50),
            variant("b", 1_000, 80),
            variant("c", 1_000, 80),
        ];

        let result = multi_variant_compare(&variants, Thresholds::default()).unwrap();
        assert_eq!(result.challenger_id, "b");
    }

    proptest! {
        #[test]
        fn prop_confidence_and_p_value_are_probabilities(
            n1 in 1u64..50_000,
            n2 in 1u64..50_000,
            r1 in 0.0f64..1.0,
            r2 in 0.0f64..1.0,
        ) {
            let c1 = (n1 as f64 * r1) as u64;
            let c2 = (n2 as f64 * r2) as u64;
            let result = two_proportion_test(c1, n1, c2, n2, Thresholds::default());

            prop_assert!((0.0..=1.0).contains(&result.confidence));
            prop_assert!((0.0..=1.0).contains(&result.p_value));
            prop_assert_eq!(result.winner.is_some(), result.is_significant);
        }
    }
}
