use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ConversationId, MetricsError, SeedId};

/// Value assumed for `tool_call_validity` when a conversation made no tool calls.
pub const DEFAULT_TOOL_CALL_VALIDITY: f64 = 1.0;

// ---------------------------------------------------------------------------
// MetricKey — the tracked quality dimensions, in reporting order
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    RougeL,
    FidelidadFactual,
    DiversidadLexica,
    CoherenciaDialogica,
    PrivacyScore,
    Memorizacion,
    ToolCallValidity,
}

impl MetricKey {
    pub const ALL: [MetricKey; 7] = [
        MetricKey::RougeL,
        MetricKey::FidelidadFactual,
        MetricKey::DiversidadLexica,
        MetricKey::CoherenciaDialogica,
        MetricKey::PrivacyScore,
        MetricKey::Memorizacion,
        MetricKey::ToolCallValidity,
    ];

    /// The graded dimensions whose minimum forms the composite score.
    pub const GRADED: [MetricKey; 4] = [
        MetricKey::RougeL,
        MetricKey::FidelidadFactual,
        MetricKey::DiversidadLexica,
        MetricKey::CoherenciaDialogica,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::RougeL => "rouge_l",
            MetricKey::FidelidadFactual => "fidelidad_factual",
            MetricKey::DiversidadLexica => "diversidad_lexica",
            MetricKey::CoherenciaDialogica => "coherencia_dialogica",
            MetricKey::PrivacyScore => "privacy_score",
            MetricKey::Memorizacion => "memorizacion",
            MetricKey::ToolCallValidity => "tool_call_validity",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// QualityMetrics — raw per-conversation measurements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub rouge_l: f64,
    pub fidelidad_factual: f64,
    pub diversidad_lexica: f64,
    pub coherencia_dialogica: f64,
    /// 0.0 means no PII was detected.
    pub privacy_score: f64,
    pub memorizacion: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_validity: Option<f64>,
}

impl QualityMetrics {
    /// Tool-call validity with the "no tool calls" default applied.
    pub fn tool_call_validity(&self) -> f64 {
        self.tool_call_validity.unwrap_or(DEFAULT_TOOL_CALL_VALIDITY)
    }

    pub fn value(&self, metric: MetricKey) -> f64 {
        match metric {
            MetricKey::RougeL => self.rouge_l,
            MetricKey::FidelidadFactual => self.fidelidad_factual,
            MetricKey::DiversidadLexica => self.diversidad_lexica,
            MetricKey::CoherenciaDialogica => self.coherencia_dialogica,
            MetricKey::PrivacyScore => self.privacy_score,
            MetricKey::Memorizacion => self.memorizacion,
            MetricKey::ToolCallValidity => self.tool_call_validity(),
        }
    }

    /// Reject non-finite or out-of-range values. The first offending metric
    /// in reporting order is reported.
    pub fn validate(&self) -> Result<(), MetricsError> {
        for metric in MetricKey::ALL {
            if metric == MetricKey::ToolCallValidity && self.tool_call_validity.is_none() {
                continue;
            }
            let value = self.value(metric);
            if !value.is_finite() {
                return Err(MetricsError::NonFinite { metric });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(MetricsError::OutOfRange { metric, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScoreOutcome / QualityReport
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub composite_score: f64,
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Result of scoring one conversation. Later evaluations of the same
/// conversation replace the stored report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub conversation_id: ConversationId,
    pub seed_id: SeedId,
    pub metrics: QualityMetrics,
    pub composite_score: f64,
    pub passed: bool,
    pub failures: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
