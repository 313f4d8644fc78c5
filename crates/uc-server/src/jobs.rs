use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use uc_core::core::{
    run_evaluation, EvaluationContext, EvaluationOutcome, EvaluationProgress, EvaluationTarget,
    QualityReport, ReportSink, ReportStore, SinkFuture, SkippedConversation, StoreError,
};

use crate::handler::AppState;

// ---------------------------------------------------------------------------
// Job records
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Point-in-time view of an evaluation job.
#[derive(Clone, Debug, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub evaluated: usize,
    pub skipped: Vec<SkippedConversation>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    snapshot: JobSnapshot,
    processed: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
}

impl JobEntry {
    fn view(&self) -> JobSnapshot {
        let mut snapshot = self.snapshot.clone();
        if !snapshot.status.is_finished() {
            snapshot.processed = self.processed.load(Ordering::Acquire);
        }
        snapshot
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("evaluation job {0} not found")]
    NotFound(Uuid),
    #[error("evaluation job {0} already finished")]
    AlreadyFinished(Uuid),
}

// ---------------------------------------------------------------------------
// JobRegistry — tracks background evaluation runs
// ---------------------------------------------------------------------------

/// Finished jobs kept for inspection when no limit is configured.
pub const DEFAULT_RETAINED_JOBS: usize = 100;

pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
    retain_finished: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain_finished` finished jobs; the oldest finished
    /// are dropped first. Running jobs are never dropped.
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retain_finished,
        }
    }

    async fn register(
        &self,
        total: usize,
        started_at: DateTime<Utc>,
    ) -> (Uuid, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let job_id = Uuid::new_v4();
        let processed = Arc::new(AtomicUsize::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let entry = JobEntry {
            snapshot: JobSnapshot {
                job_id,
                status: JobStatus::Running,
                total,
                processed: 0,
                evaluated: 0,
                skipped: Vec::new(),
                error: None,
                started_at,
                finished_at: None,
            },
            processed: Arc::clone(&processed),
            cancel: Arc::clone(&cancel),
        };
        self.jobs.write().await.insert(job_id, entry);

        (job_id, processed, cancel)
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.read().await.get(&job_id).map(JobEntry::view)
    }

    /// All jobs, most recently started first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let mut snapshots: Vec<JobSnapshot> = jobs.values().map(JobEntry::view).collect();
        snapshots.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        snapshots
    }

    /// Request cancellation. The run stops before its next conversation;
    /// reports already merged are kept.
    pub async fn cancel(&self, job_id: Uuid) -> Result<JobSnapshot, JobError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or(JobError::NotFound(job_id))?;
        if entry.snapshot.status.is_finished() {
            return Err(JobError::AlreadyFinished(job_id));
        }
        entry.cancel.store(true, Ordering::Release);
        Ok(entry.view())
    }

    async fn finish(
        &self,
        job_id: Uuid,
        result: Result<EvaluationOutcome, String>,
        finished_at: DateTime<Utc>,
    ) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            return;
        };

        let snapshot = &mut entry.snapshot;
        snapshot.processed = entry.processed.load(Ordering::Acquire);
        snapshot.finished_at = Some(finished_at);
        match result {
            Ok(outcome) => {
                snapshot.status = if outcome.cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                snapshot.evaluated = outcome.reports.len();
                snapshot.skipped = outcome.skipped;
            }
            Err(err) => {
                snapshot.status = JobStatus::Failed;
                snapshot.error = Some(err);
            }
        }

        prune_finished(&mut jobs, self.retain_finished);
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, JobEntry>, keep: usize) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .values()
        .filter_map(|e| e.snapshot.finished_at.map(|at| (at, e.snapshot.job_id)))
        .collect();
    if finished.len() <= keep {
        return;
    }

    finished.sort_unstable();
    let excess = finished.len() - keep;
    for (_, job_id) in finished.into_iter().take(excess) {
        jobs.remove(&job_id);
    }
    tracing::debug!(evicted = excess, "pruned finished evaluation jobs");
}

// ---------------------------------------------------------------------------
// BlockingSink — merges reports on the blocking pool
// ---------------------------------------------------------------------------

struct BlockingSink(Arc<dyn ReportStore>);

impl ReportSink for BlockingSink {
    fn merge<'a>(&'a self, report: &'a QualityReport) -> SinkFuture<'a> {
        let store = Arc::clone(&self.0);
        let report = report.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || store.upsert(&report))
                .await
                .map_err(|e| StoreError::Backend(format!("report merge task failed: {e}")))?
        })
    }
}

// ---------------------------------------------------------------------------
// start_evaluation_job — spawn a background run over `targets`
// ---------------------------------------------------------------------------

pub async fn start_evaluation_job(state: &Arc<AppState>, targets: Vec<EvaluationTarget>) -> Uuid {
    let started_at = state.clock.now();
    let (job_id, processed, cancel) = state.jobs.register(targets.len(), started_at).await;

    tracing::info!(
        %job_id,
        total = targets.len(),
        source = state.source.name(),
        "evaluation job started"
    );

    let run = tokio::spawn({
        let state = Arc::clone(state);
        async move {
            let sink = BlockingSink(Arc::clone(&state.store));
            let ctx = EvaluationContext {
                source: state.source.as_ref(),
                thresholds: state.thresholds.as_ref(),
                store: &sink,
                clock: state.clock.as_ref(),
                cancel: cancel.as_ref(),
            };
            let on_progress =
                |p: EvaluationProgress| processed.store(p.processed, Ordering::Release);

            run_evaluation(&targets, &ctx, &on_progress).await
        }
    });

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let result = match run.await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(err) if err.is_panic() => Err("evaluation task panicked".to_owned()),
            Err(err) => Err(format!("evaluation task aborted: {err}")),
        };

        match &result {
            Ok(outcome) => {
                if !outcome.skipped.is_empty() {
                    let skipped: Vec<&str> = outcome
                        .skipped
                        .iter()
                        .map(|s| s.conversation_id.as_str())
                        .collect();
                    tracing::warn!(
                        %job_id,
                        count = skipped.len(),
                        skipped = ?skipped,
                        "conversations skipped during evaluation"
                    );
                }
                tracing::info!(
                    %job_id,
                    evaluated = outcome.reports.len(),
                    skipped = outcome.skipped.len(),
                    cancelled = outcome.cancelled,
                    "evaluation job finished"
                );
            }
            Err(err) => {
                tracing::error!(%job_id, error = %err, "evaluation job failed");
            }
        }

        state.jobs.finish(job_id, result, state.clock.now()).await;
    });

    job_id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
