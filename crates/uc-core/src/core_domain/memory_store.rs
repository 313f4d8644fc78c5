use std::sync::Mutex;

use crate::core::{ConversationId, QualityReport, ReportStore, StoreError};

// ---------------------------------------------------------------------------
// InMemoryReportStore — Vec-backed store for demo mode and tests
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<QualityReport>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports(reports: Vec<QualityReport>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.lock();
            for report in reports {
                upsert_into(&mut guard, report);
            }
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<QualityReport>> {
        self.reports.lock().expect("report store mutex poisoned")
    }
}

fn upsert_into(reports: &mut Vec<QualityReport>, report: QualityReport) {
    match reports
        .iter_mut()
        .find(|existing| existing.conversation_id == report.conversation_id)
    {
        Some(existing) => *existing = report,
        None => reports.push(report),
    }
}

impl ReportStore for InMemoryReportStore {
    fn list(&self) -> Result<Vec<QualityReport>, StoreError> {
        Ok(self.lock().clone())
    }

    fn get(&self, conversation_id: &ConversationId) -> Result<Option<QualityReport>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .find(|r| &r.conversation_id == conversation_id)
            .cloned())
    }

    fn upsert(&self, report: &QualityReport) -> Result<(), StoreError> {
        upsert_into(&mut self.lock(), report.clone());
        Ok(())
    }

    fn remove(&self, conversation_id: &ConversationId) -> Result<bool, StoreError> {
        let mut reports = self.lock();
        let before = reports.len();
        reports.retain(|r| &r.conversation_id != conversation_id);
        Ok(reports.len() != before)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
