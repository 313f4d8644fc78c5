use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::core::{
    ConversationId, EvaluationTarget, MetricsSourceError, QualityMetrics, QualityReport,
    StoreError,
};

// ---------------------------------------------------------------------------
// ReportStore — persisted report collection, keyed by conversation
// ---------------------------------------------------------------------------

pub trait ReportStore: Send + Sync {
    /// All reports in first-insertion order.
    fn list(&self) -> Result<Vec<QualityReport>, StoreError>;

    fn get(&self, conversation_id: &ConversationId) -> Result<Option<QualityReport>, StoreError>;

    /// Replace the report for `report.conversation_id` if one exists,
    /// otherwise append it.
    fn upsert(&self, report: &QualityReport) -> Result<(), StoreError>;

    /// Returns whether a report was removed.
    fn remove(&self, conversation_id: &ConversationId) -> Result<bool, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// ReportSink — where an evaluation run merges its reports (object-safe async)
// ---------------------------------------------------------------------------

pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

pub trait ReportSink: Send + Sync {
    fn merge<'a>(&'a self, report: &'a QualityReport) -> SinkFuture<'a>;
}

/// Stores merge inline on the calling task.
impl<T: ReportStore + ?Sized> ReportSink for T {
    fn merge<'a>(&'a self, report: &'a QualityReport) -> SinkFuture<'a> {
        Box::pin(std::future::ready(self.upsert(report)))
    }
}

// ---------------------------------------------------------------------------
// MetricsSource — supplies raw metrics per conversation (object-safe async)
// ---------------------------------------------------------------------------

pub type MetricsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<QualityMetrics>, MetricsSourceError>> + Send + 'a>>;

pub trait MetricsSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the conversation has nothing to evaluate.
    fn fetch<'a>(&'a self, target: &'a EvaluationTarget) -> MetricsFuture<'a>;
}

// ---------------------------------------------------------------------------
// Clock — injectable time source for deterministic testing
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// CancellationSignal — checked between evaluation items
// ---------------------------------------------------------------------------

pub trait CancellationSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl CancellationSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// A signal that never fires, for callers without cancellation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}
