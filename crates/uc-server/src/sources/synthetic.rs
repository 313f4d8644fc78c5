use std::ops::Range;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uc_core::core::{round3, EvaluationTarget, MetricsFuture, MetricsSource, QualityMetrics};

use crate::bootstrap::SyntheticSettings;

const ROUGE_L: Range<f64> = 0.55..0.95;
const FIDELIDAD_FACTUAL: Range<f64> = 0.82..0.99;
const DIVERSIDAD_LEXICA: Range<f64> = 0.50..0.90;
const COHERENCIA_DIALOGICA: Range<f64> = 0.75..0.98;
const PII_LEAK: Range<f64> = 0.01..0.05;
const MEMORIZACION: Range<f64> = 0.0..0.012;
const TOOL_CALL_VALIDITY: Range<f64> = 0.70..1.0;

// ---------------------------------------------------------------------------
// SyntheticMetricsSource — plausible demo metrics, no external service
// ---------------------------------------------------------------------------

/// Draws metrics from fixed ranges that straddle the default thresholds,
/// so a batch yields a realistic mix of passing and failing reports.
pub struct SyntheticMetricsSource {
    rng: Mutex<StdRng>,
    pii_rate: f64,
    include_tool_calls: bool,
}

impl SyntheticMetricsSource {
    pub fn new(settings: &SyntheticSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
            pii_rate: settings.pii_rate.clamp(0.0, 1.0),
            include_tool_calls: settings.include_tool_calls,
        }
    }

    pub fn generate(&self) -> QualityMetrics {
        let mut rng = self.rng.lock().expect("synthetic rng mutex poisoned");

        let rouge_l = round3(rng.random_range(ROUGE_L));
        let fidelidad_factual = round3(rng.random_range(FIDELIDAD_FACTUAL));
        let diversidad_lexica = round3(rng.random_range(DIVERSIDAD_LEXICA));
        let coherencia_dialogica = round3(rng.random_range(COHERENCIA_DIALOGICA));
        let privacy_score = if rng.random_bool(self.pii_rate) {
            round3(rng.random_range(PII_LEAK))
        } else {
            0.0
        };
        let memorizacion = round3(rng.random_range(MEMORIZACION));
        let tool_call_validity = self
            .include_tool_calls
            .then(|| round3(rng.random_range(TOOL_CALL_VALIDITY)));

        QualityMetrics {
            rouge_l,
            fidelidad_factual,
            diversidad_lexica,
            coherencia_dialogica,
            privacy_score,
            memorizacion,
            tool_call_validity,
        }
    }
}

impl MetricsSource for SyntheticMetricsSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn fetch<'a>(&'a self, _target: &'a EvaluationTarget) -> MetricsFuture<'a> {
        let metrics = self.generate();
        Box::pin(async move { Ok(Some(metrics)) })
    }
}
