use serde::{Deserialize, Serialize};

use crate::core::{
    evaluate, CancellationSignal, Clock, ConversationId, EvaluationTarget, MetricsSource,
    QualityReport, ReportSink, StoreError, ThresholdSet,
};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The source had no metrics for this conversation.
    NoMetrics,
    SourceFailed(String),
    InvalidMetrics(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedConversation {
    pub conversation_id: ConversationId,
    pub reason: SkipReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub reports: Vec<QualityReport>,
    pub skipped: Vec<SkippedConversation>,
    pub cancelled: bool,
}

impl EvaluationOutcome {
    pub fn skipped_ids(&self) -> Vec<ConversationId> {
        self.skipped
            .iter()
            .map(|s| s.conversation_id.clone())
            .collect()
    }
}

/// Collaborators for one evaluation run.
pub struct EvaluationContext<'a> {
    pub source: &'a dyn MetricsSource,
    pub thresholds: &'a ThresholdSet,
    pub store: &'a dyn ReportSink,
    pub clock: &'a dyn Clock,
    pub cancel: &'a dyn CancellationSignal,
}

// ---------------------------------------------------------------------------
// run_evaluation — sequential fetch → score → upsert loop
// ---------------------------------------------------------------------------

/// Evaluate `targets` one at a time, merging each report into the store as
/// soon as it is produced.
///
/// Cancellation is checked before every item; reports already merged are
/// kept. Per-item problems (no metrics, source failure, invalid metrics)
/// are collected as skips. Only a store failure aborts the run.
pub async fn run_evaluation(
    targets: &[EvaluationTarget],
    ctx: &EvaluationContext<'_>,
    progress: &(dyn Fn(EvaluationProgress) + Send + Sync),
) -> Result<EvaluationOutcome, StoreError> {
    let total = targets.len();
    let mut outcome = EvaluationOutcome::default();

    for (i, target) in targets.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        match ctx.source.fetch(target).await {
            Ok(Some(metrics)) => {
                match evaluate(
                    target.conversation_id.clone(),
                    target.seed_id.clone(),
                    metrics,
                    ctx.thresholds,
                    ctx.clock.now(),
                ) {
                    Ok(report) => {
                        ctx.store.merge(&report).await?;
                        outcome.reports.push(report);
                    }
                    Err(err) => outcome.skipped.push(SkippedConversation {
                        conversation_id: target.conversation_id.clone(),
                        reason: SkipReason::InvalidMetrics(err.to_string()),
                    }),
                }
            }
            Ok(None) => outcome.skipped.push(SkippedConversation {
                conversation_id: target.conversation_id.clone(),
                reason: SkipReason::NoMetrics,
            }),
            Err(err) => outcome.skipped.push(SkippedConversation {
                conversation_id: target.conversation_id.clone(),
                reason: SkipReason::SourceFailed(err.to_string()),
            }),
        }

        progress(EvaluationProgress {
            processed: i + 1,
            total,
        });
    }

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
