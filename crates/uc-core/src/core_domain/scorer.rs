use chrono::{DateTime, Utc};

use crate::core::{
    round3, ConversationId, MetricKey, MetricsError, QualityMetrics, QualityReport, ScoreOutcome,
    SeedId, ThresholdSet,
};

// ---------------------------------------------------------------------------
// Composite scorer — pure, deterministic
// ---------------------------------------------------------------------------

/// Score one metrics record against `thresholds`.
///
/// The composite score is 0.0 when the compliance gate trips (PII or
/// memorised content), otherwise the weakest graded metric rounded to three
/// decimals. The failure list is built separately from the score: every
/// metric is checked in reporting order, `tool_call_validity` only when the
/// record carries it.
pub fn score(
    metrics: &QualityMetrics,
    thresholds: &ThresholdSet,
) -> Result<ScoreOutcome, MetricsError> {
    metrics.validate()?;

    let composite_score = composite_score(metrics, thresholds);
    let failures = collect_failures(metrics, thresholds);

    Ok(ScoreOutcome {
        composite_score,
        passed: failures.is_empty(),
        failures,
    })
}

/// Score `metrics` and wrap the outcome into a report stamped `evaluated_at`.
pub fn evaluate(
    conversation_id: ConversationId,
    seed_id: SeedId,
    metrics: QualityMetrics,
    thresholds: &ThresholdSet,
    evaluated_at: DateTime<Utc>,
) -> Result<QualityReport, MetricsError> {
    let outcome = score(&metrics, thresholds)?;
    Ok(QualityReport {
        conversation_id,
        seed_id,
        metrics,
        composite_score: outcome.composite_score,
        passed: outcome.passed,
        failures: outcome.failures,
        evaluated_at,
    })
}

fn composite_score(metrics: &QualityMetrics, thresholds: &ThresholdSet) -> f64 {
    if thresholds.compliance_gate_tripped(metrics) {
        return 0.0;
    }

    let weakest = MetricKey::GRADED
        .iter()
        .map(|&metric| metrics.value(metric))
        .fold(f64::INFINITY, f64::min);
    round3(weakest)
}

fn collect_failures(metrics: &QualityMetrics, thresholds: &ThresholdSet) -> Vec<String> {
    MetricKey::ALL
        .iter()
        .filter(|&&metric| {
            metric != MetricKey::ToolCallValidity || metrics.tool_call_validity.is_some()
        })
        .filter(|&&metric| !thresholds.check(metric, metrics.value(metric)))
        .map(|&metric| thresholds.failure_reason(metric))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
