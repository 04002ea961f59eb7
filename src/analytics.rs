//! Simulated click-through analytics.
//!
//! Experiments consume metrics through the [`AnalyticsSimulator`] trait and
//! never look inside it. [`SimulatedAnalytics`] is the stand-in used until a
//! real analytics backend is wired up: output is a pure function of
//! `(workflow_id, style, elapsed_minutes)` so runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::workflow::types::VariantMetrics;

pub const MIN_CTR: f64 = 0.01;
pub const MAX_CTR: f64 = 0.35;
const MIN_IMPRESSIONS: u64 = 100;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulatorError {
    #[error("analytics backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Produces one metrics batch per call for the given experiment variants.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait AnalyticsSimulator: Send + Sync {
    fn simulate_batch(
        &self,
        workflow_id: &str,
        variants: &[VariantMetrics],
        elapsed_minutes: u64,
    ) -> Result<Vec<VariantMetrics>, SimulatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub avg_view_duration: u32,
}

#[derive(Debug, Clone, Copy)]
struct StyleBaseline {
    ctr_mean: f64,
    ctr_std: f64,
    view_duration: f64,
}

fn baseline_for(style: &str) -> StyleBaseline {
    match style {
        "product_demo" | "product_focused" => StyleBaseline {
            ctr_mean: 0.062,
            ctr_std: 0.012,
            view_duration: 38.0,
        },
        "viral" => StyleBaseline {
            ctr_mean: 0.095,
            ctr_std: 0.025,
            view_duration: 52.0,
        },
        "text_heavy" => StyleBaseline {
            ctr_mean: 0.058,
            ctr_std: 0.010,
            view_duration: 35.0,
        },
        // face_focus, face_focused and anything unknown
        _ => StyleBaseline {
            ctr_mean: 0.085,
            ctr_std: 0.015,
            view_duration: 45.0,
        },
    }
}

fn derive_seed(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b":");
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Box-Muller sample from N(mean, std).
fn gauss(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std * z
}

/// Deterministic three-phase adoption model.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedAnalytics;

impl SimulatedAnalytics {
    pub fn new() -> Self {
        Self
    }

    pub fn metrics(&self, workflow_id: &str, style: &str, elapsed_minutes: u64) -> SimulatedMetrics {
        let baseline = baseline_for(style);

        // Curve rates and the true CTR are fixed per (workflow, style) so that
        // impressions only ever grow as elapsed time grows.
        let mut curve = StdRng::seed_from_u64(derive_seed(&[workflow_id, style, "curve"]));
        let slow_rate = gauss(&mut curve, 50.0, 10.0).max(1.0);
        let growth_rate = gauss(&mut curve, 80.0, 15.0).max(1.0);
        let plateau_rate = gauss(&mut curve, 20.0, 5.0).max(1.0);
        let true_ctr = gauss(&mut curve, baseline.ctr_mean, baseline.ctr_std);

        let minutes = elapsed_minutes as f64;
        let raw_impressions = slow_rate * minutes.min(60.0)
            + growth_rate * (minutes.min(360.0) - 60.0).max(0.0)
            + plateau_rate * (minutes - 360.0).max(0.0);
        let impressions = (raw_impressions as u64).max(MIN_IMPRESSIONS);

        let elapsed = elapsed_minutes.to_string();
        let mut sample = StdRng::seed_from_u64(derive_seed(&[workflow_id, style, &elapsed]));

        // Early observations are noisier; noise decays over the first day.
        let noise_factor = (1.0 - minutes / 1440.0).max(0.1);
        let observed_ctr =
            (true_ctr + gauss(&mut sample, 0.0, baseline.ctr_std * noise_factor)).clamp(MIN_CTR, MAX_CTR);

        // Integer bounds keep clicks / impressions inside [MIN_CTR, MAX_CTR].
        let min_clicks = impressions.div_ceil(100);
        let max_clicks = impressions * 35 / 100;
        let clicks = ((impressions as f64 * observed_ctr).round() as u64).clamp(min_clicks, max_clicks);

        let avg_view_duration = gauss(&mut sample, baseline.view_duration, 8.0).max(0.0).round() as u32;

        SimulatedMetrics {
            impressions,
            clicks,
            ctr: clicks as f64 / impressions as f64,
            avg_view_duration,
        }
    }
}

impl AnalyticsSimulator for SimulatedAnalytics {
    fn simulate_batch(
        &self,
        workflow_id: &str,
        variants: &[VariantMetrics],
        elapsed_minutes: u64,
    ) -> Result<Vec<VariantMetrics>, SimulatorError> {
        Ok(variants
            .iter()
            .map(|variant| {
                let m = self.metrics(workflow_id, &variant.style, elapsed_minutes);
                VariantMetrics::new(&variant.thumbnail_id, &variant.style, m.impressions, m.clicks)
                    .with_avg_view_duration(m.avg_view_duration)
            })
            .collect())
    }
}
