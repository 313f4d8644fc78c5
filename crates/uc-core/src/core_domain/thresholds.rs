use serde::{Deserialize, Serialize};

use crate::core::{MetricKey, QualityMetrics, ThresholdError};

// ---------------------------------------------------------------------------
// ThresholdSet — the single table of pass/fail limits
// ---------------------------------------------------------------------------

/// Quality limits, one per metric.
///
/// The graded metrics and `tool_call_validity` are minimums (`>=`).
/// `privacy_score` is a maximum (`<=`, normally exactly 0.0) and
/// `memorizacion` is an exclusive maximum (`<`). Loaded once at startup and
/// shared read-only for the life of the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub rouge_l: f64,
    pub fidelidad_factual: f64,
    pub diversidad_lexica: f64,
    pub coherencia_dialogica: f64,
    pub privacy_score: f64,
    pub memorizacion: f64,
    pub tool_call_validity: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            rouge_l: 0.65,
            fidelidad_factual: 0.90,
            diversidad_lexica: 0.65,
            coherencia_dialogica: 0.75,
            privacy_score: 0.0,
            memorizacion: 0.01,
            tool_call_validity: 0.80,
        }
    }
}

impl ThresholdSet {
    pub fn limit(&self, metric: MetricKey) -> f64 {
        match metric {
            MetricKey::RougeL => self.rouge_l,
            MetricKey::FidelidadFactual => self.fidelidad_factual,
            MetricKey::DiversidadLexica => self.diversidad_lexica,
            MetricKey::CoherenciaDialogica => self.coherencia_dialogica,
            MetricKey::PrivacyScore => self.privacy_score,
            MetricKey::Memorizacion => self.memorizacion,
            MetricKey::ToolCallValidity => self.tool_call_validity,
        }
    }

    /// Whether `value` satisfies the limit for `metric`.
    pub fn check(&self, metric: MetricKey, value: f64) -> bool {
        let limit = self.limit(metric);
        match metric {
            MetricKey::PrivacyScore => value <= limit,
            MetricKey::Memorizacion => value < limit,
            _ => value >= limit,
        }
    }

    /// Zero-tolerance compliance gate: any PII or memorised content forces
    /// the composite score to zero.
    pub fn compliance_gate_tripped(&self, metrics: &QualityMetrics) -> bool {
        !self.check(MetricKey::PrivacyScore, metrics.privacy_score)
            || !self.check(MetricKey::Memorizacion, metrics.memorizacion)
    }

    /// Fixed failure text for `metric`. Depends only on the limit, never on
    /// the measured value, so identical failures aggregate together.
    pub fn failure_reason(&self, metric: MetricKey) -> String {
        let limit = self.limit(metric);
        match metric {
            MetricKey::RougeL => format!("ROUGE-L below minimum {limit:.2}"),
            MetricKey::FidelidadFactual => format!("Factual fidelity below minimum {limit:.2}"),
            MetricKey::DiversidadLexica => format!("Lexical diversity below minimum {limit:.2}"),
            MetricKey::CoherenciaDialogica => {
                format!("Dialogic coherence below minimum {limit:.2}")
            }
            MetricKey::PrivacyScore if limit == 0.0 => {
                "PII detected (privacy score must be 0.0)".to_owned()
            }
            MetricKey::PrivacyScore => format!("PII detected (privacy score above {limit:.2})"),
            MetricKey::Memorizacion => {
                format!("Memorization rate at or above maximum {limit:.2}")
            }
            MetricKey::ToolCallValidity => {
                format!("Tool call validity below minimum {limit:.2}")
            }
        }
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        for metric in MetricKey::ALL {
            let value = self.limit(metric);
            if !value.is_finite() {
                return Err(ThresholdError::NonFinite { metric });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ThresholdError::OutOfRange { metric, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
