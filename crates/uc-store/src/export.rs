use chrono::{DateTime, Utc};
use serde::Deserialize;
use uc_core::core::{QualityReport, ReportStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Jsonl,
}

#[derive(Debug, Clone, Default)]
pub struct ReportExportFilter {
    pub seed_id: Option<String>,
    pub passed: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReportExportFilter {
    pub fn matches(&self, report: &QualityReport) -> bool {
        if let Some(seed_id) = self.seed_id.as_deref() {
            if report.seed_id.as_str() != seed_id {
                return false;
            }
        }

        if let Some(passed) = self.passed {
            if report.passed != passed {
                return false;
            }
        }

        if let Some(since) = self.since {
            if report.evaluated_at < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if report.evaluated_at > until {
                return false;
            }
        }

        true
    }
}

/// Reports from `store` that pass `filter`, in store order.
pub fn select_reports(
    store: &dyn ReportStore,
    filter: &ReportExportFilter,
) -> Result<Vec<QualityReport>, StoreError> {
    let reports = store.list()?;
    Ok(reports.into_iter().filter(|r| filter.matches(r)).collect())
}

pub fn export_to_json(reports: &[QualityReport]) -> Result<String, StoreError> {
    let json = serde_json::to_string_pretty(reports)?;
    Ok(json)
}

/// One compact JSON object per line, newline-terminated.
pub fn export_to_jsonl(reports: &[QualityReport]) -> Result<String, StoreError> {
    let mut out = String::new();
    for report in reports {
        out.push_str(&serde_json::to_string(report)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn export_reports(
    reports: &[QualityReport],
    format: ExportFormat,
) -> Result<String, StoreError> {
    match format {
        ExportFormat::Json => export_to_json(reports),
        ExportFormat::Jsonl => export_to_jsonl(reports),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uc_core::core::{ConversationId, QualityMetrics, QualityReport, ReportStore, SeedId};

    use super::{export_reports, export_to_jsonl, select_reports, ExportFormat, ReportExportFilter};
    use crate::sqlite::SqliteReportStore;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn setup_store() -> SqliteReportStore {
        let store = SqliteReportStore::new_in_memory().expect("in-memory store");
        store.init().expect("init schema");
        store
    }

    fn insert_report(store: &SqliteReportStore, id: &str, seed: &str, passed: bool, at: &str) {
        let report = QualityReport {
            conversation_id: ConversationId::new(id),
            seed_id: SeedId::new(seed),
            metrics: QualityMetrics {
                rouge_l: 0.72,
                fidelidad_factual: 0.93,
                diversidad_lexica: 0.68,
                coherencia_dialogica: 0.81,
                privacy_score: if passed { 0.0 } else { 0.03 },
                memorizacion: 0.001,
                tool_call_validity: None,
            },
            composite_score: if passed { 0.68 } else { 0.0 },
            passed,
            failures: if passed {
                Vec::new()
            } else {
                vec!["PII detected (privacy score must be 0.0)".to_string()]
            },
            evaluated_at: ts(at),
        };
        store.upsert(&report).expect("upsert report");
    }

    #[test]
    fn test_export_empty_store() {
        let store = setup_store();

        let reports =
            select_reports(&store, &ReportExportFilter::default()).expect("select reports");
        assert!(reports.is_empty());

        assert_eq!(
            export_reports(&reports, ExportFormat::Json).expect("export json"),
            "[]"
        );
        assert_eq!(
            export_reports(&reports, ExportFormat::Jsonl).expect("export jsonl"),
            ""
        );
    }

    #[test]
    fn test_filter_by_seed_and_outcome() {
        let store = setup_store();
        insert_report(&store, "c1", "seed-a", true, "2026-01-01T10:00:00Z");
        insert_report(&store, "c2", "seed-a", false, "2026-01-01T11:00:00Z");
        insert_report(&store, "c3", "seed-b", true, "2026-01-01T12:00:00Z");

        let filter = ReportExportFilter {
            seed_id: Some("seed-a".to_string()),
            passed: Some(true),
            ..ReportExportFilter::default()
        };
        let reports = select_reports(&store, &filter).expect("select reports");

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].conversation_id.as_str(), "c1");
    }

    #[test]
    fn test_filter_by_time_window() {
        let store = setup_store();
        insert_report(&store, "c1", "seed-a", true, "2026-01-01T10:00:00Z");
        insert_report(&store, "c2", "seed-a", true, "2026-01-02T10:00:00Z");
        insert_report(&store, "c3", "seed-a", true, "2026-01-03T10:00:00Z");

        let filter = ReportExportFilter {
            since: Some(ts("2026-01-02T00:00:00Z")),
            until: Some(ts("2026-01-02T23:59:59Z")),
            ..ReportExportFilter::default()
        };
        let reports = select_reports(&store, &filter).expect("select reports");

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].conversation_id.as_str(), "c2");
    }

    #[test]
    fn test_jsonl_one_report_per_line() {
        let store = setup_store();
        insert_report(&store, "c1", "seed-a", true, "2026-01-01T10:00:00Z");
        insert_report(&store, "c2", "seed-a", false, "2026-01-01T11:00:00Z");

        let reports =
            select_reports(&store, &ReportExportFilter::default()).expect("select reports");
        let jsonl = export_to_jsonl(&reports).expect("export jsonl");
        let lines: Vec<&str> = jsonl.lines().collect();

        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("valid JSON line");
        assert_eq!(second["conversation_id"], "c2");
        assert_eq!(second["passed"], false);
        assert_eq!(
            second["failures"][0],
            "PII detected (privacy score must be 0.0)"
        );
    }
}
