use std::io::{Error as IoError, ErrorKind};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uc_core::core::{
    ConversationId, QualityMetrics, QualityReport, ReportStore, SeedId, StoreError,
};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS quality_reports (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL UNIQUE,
    seed_id TEXT NOT NULL,
    metrics TEXT NOT NULL,
    composite_score REAL NOT NULL,
    passed INTEGER NOT NULL,
    failures TEXT NOT NULL,
    evaluated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_seed ON quality_reports(seed_id);
"#;

const SELECT_COLUMNS: &str =
    "conversation_id, seed_id, metrics, composite_score, passed, failures, evaluated_at";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PersistError> for StoreError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Database(e) => StoreError::Backend(e.to_string()),
            PersistError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}

/// SQLite-backed report store. One row per conversation; re-evaluations
/// update the row in place so listing order follows first evaluation.
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    pub fn new(path: &Path) -> Result<Self, PersistError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn new_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn init(&self) -> Result<(), PersistError> {
        let conn = self.lock_conn();
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        conn.execute_batch(SCHEMA_SQL)?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite mutex poisoned")
    }

    fn list_reports(&self) -> Result<Vec<QualityReport>, PersistError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM quality_reports ORDER BY seq ASC"
        ))?;

        let rows = stmt.query_map([], read_report)?;
        let reports = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    fn get_report(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<QualityReport>, PersistError> {
        let conn = self.lock_conn();
        let report = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM quality_reports WHERE conversation_id = ?1"),
                params![conversation_id.as_str()],
                read_report,
            )
            .optional()?;
        Ok(report)
    }

    fn upsert_report(&self, report: &QualityReport) -> Result<(), PersistError> {
        let metrics = serde_json::to_string(&report.metrics)?;
        let failures = serde_json::to_string(&report.failures)?;

        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO quality_reports
             (conversation_id, seed_id, metrics, composite_score, passed, failures, evaluated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 seed_id = excluded.seed_id,
                 metrics = excluded.metrics,
                 composite_score = excluded.composite_score,
                 passed = excluded.passed,
                 failures = excluded.failures,
                 evaluated_at = excluded.evaluated_at",
            params![
                report.conversation_id.as_str(),
                report.seed_id.as_str(),
                metrics,
                report.composite_score,
                report.passed,
                failures,
                report.evaluated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove_report(&self, conversation_id: &ConversationId) -> Result<bool, PersistError> {
        let conn = self.lock_conn();
        let deleted = conn.execute(
            "DELETE FROM quality_reports WHERE conversation_id = ?1",
            params![conversation_id.as_str()],
        )?;
        Ok(deleted > 0)
    }

    fn clear_reports(&self) -> Result<(), PersistError> {
        let conn = self.lock_conn();
        conn.execute("DELETE FROM quality_reports", [])?;
        Ok(())
    }
}

impl ReportStore for SqliteReportStore {
    fn list(&self) -> Result<Vec<QualityReport>, StoreError> {
        Ok(self.list_reports()?)
    }

    fn get(&self, conversation_id: &ConversationId) -> Result<Option<QualityReport>, StoreError> {
        Ok(self.get_report(conversation_id)?)
    }

    fn upsert(&self, report: &QualityReport) -> Result<(), StoreError> {
        Ok(self.upsert_report(report)?)
    }

    fn remove(&self, conversation_id: &ConversationId) -> Result<bool, StoreError> {
        Ok(self.remove_report(conversation_id)?)
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(self.clear_reports()?)
    }
}

fn read_report(row: &Row<'_>) -> rusqlite::Result<QualityReport> {
    let conversation_id: String = row.get(0)?;
    let seed_id: String = row.get(1)?;
    let metrics: String = row.get(2)?;
    let composite_score: f64 = row.get(3)?;
    let passed: bool = row.get(4)?;
    let failures: String = row.get(5)?;
    let evaluated_at: String = row.get(6)?;

    Ok(QualityReport {
        conversation_id: ConversationId::new(conversation_id),
        seed_id: SeedId::new(seed_id),
        metrics: parse_metrics(2, &metrics)?,
        composite_score,
        passed,
        failures: parse_failures(5, &failures)?,
        evaluated_at: parse_datetime_utc(6, &evaluated_at)?,
    })
}

fn parse_metrics(column: usize, value: &str) -> rusqlite::Result<QualityMetrics> {
    serde_json::from_str(value).map_err(|_| sql_text_parse_error(column, "metrics", value))
}

fn parse_failures(column: usize, value: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(value).map_err(|_| sql_text_parse_error(column, "failures", value))
}

fn parse_datetime_utc(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| sql_text_parse_error(column, "datetime", value))
}

fn sql_text_parse_error(column: usize, field: &'static str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid {field}: {value}"),
        )),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uc_core::core::{
        ConversationId, QualityMetrics, QualityReport, ReportStore, SeedId, StoreError,
    };

    use super::SqliteReportStore;

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

    fn report(id: &str, composite: f64, failures: &[&str], at: &str) -> QualityReport {
        QualityReport {
            conversation_id: ConversationId::new(id),
            seed_id: SeedId::new("seed-legal-01"),
            metrics: QualityMetrics {
                rouge_l: 0.80,
                fidelidad_factual: 0.95,
                diversidad_lexica: 0.70,
                coherencia_dialogica: 0.85,
                privacy_score: 0.0,
                memorizacion: 0.003,
                tool_call_validity: Some(0.9),
            },
            composite_score: composite,
            passed: failures.is_empty(),
            failures: failures.iter().map(|f| (*f).to_owned()).collect(),
            evaluated_at: ts(at),
        }
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let store = setup_store();
        let original = report("conv-1", 0.7, &[], "2026-01-01T00:00:00Z");

        store.upsert(&original).expect("upsert report");

        let loaded = store
            .get(&ConversationId::new("conv-1"))
            .expect("get report")
            .expect("report present");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_upsert_replaces_by_conversation_id() {
        let store = setup_store();

        store
            .upsert(&report("conv-1", 0.7, &[], "2026-01-01T00:00:00Z"))
            .expect("upsert conv-1");
        store
            .upsert(&report("conv-2", 0.8, &[], "2026-01-01T00:01:00Z"))
            .expect("upsert conv-2");
        store
            .upsert(&report(
                "conv-1",
                0.0,
                &["PII detected (privacy score must be 0.0)"],
                "2026-01-02T00:00:00Z",
            ))
            .expect("re-upsert conv-1");

        let reports = store.list().expect("list reports");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].conversation_id.as_str(), "conv-1");
        assert_eq!(reports[0].composite_score, 0.0);
        assert!(!reports[0].passed);
        assert_eq!(reports[0].evaluated_at, ts("2026-01-02T00:00:00Z"));
        assert_eq!(reports[1].conversation_id.as_str(), "conv-2");
    }

    #[test]
    fn test_metrics_reload_bit_exact() {
        let store = setup_store();
        let mut original = report("conv-1", 0.7, &[], "2026-01-01T00:00:00Z");
        original.metrics.rouge_l = 0.9856906946328695;
        original.metrics.fidelidad_factual = 0.21291890726713458;
        store.upsert(&original).expect("upsert report");

        let loaded = store
            .get(&ConversationId::new("conv-1"))
            .expect("get report")
            .expect("report present");
        assert_eq!(loaded.metrics.rouge_l.to_bits(), 0.9856906946328695f64.to_bits());
        assert_eq!(
            loaded.metrics.fidelidad_factual.to_bits(),
            0.21291890726713458f64.to_bits()
        );
    }

    #[test]
    fn test_many_metric_values_reload_exactly() {
        let store = setup_store();
        let mut written = Vec::new();
        for k in 1..=500u32 {
            let mut r = report(&format!("conv-{k}"), 0.7, &[], "2026-01-01T00:00:00Z");
            let v = (f64::from(k) * 0.618_033_988_749_894_9).fract();
            r.metrics.rouge_l = v;
            r.metrics.diversidad_lexica = 1.0 - v;
            r.metrics.memorizacion = v / 97.0;
            r.composite_score = v * 0.9;
            store.upsert(&r).expect("upsert report");
            written.push(r);
        }

        let loaded = store.list().expect("list reports");
        assert_eq!(loaded, written);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = setup_store();
        let missing = store
            .get(&ConversationId::new("nope"))
            .expect("get report");
        assert!(missing.is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let store = setup_store();
        store
            .upsert(&report("conv-1", 0.7, &[], "2026-01-01T00:00:00Z"))
            .expect("upsert conv-1");
        store
            .upsert(&report("conv-2", 0.7, &[], "2026-01-01T00:00:00Z"))
            .expect("upsert conv-2");

        assert!(store.remove(&ConversationId::new("conv-1")).expect("remove"));
        assert!(!store.remove(&ConversationId::new("conv-1")).expect("remove again"));
        assert_eq!(store.list().expect("list").len(), 1);

        store.clear().expect("clear");
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let store = setup_store();
        store
            .upsert(&report("conv-1", 0.7, &[], "2026-01-01T00:00:00Z"))
            .expect("upsert");
        store.init().expect("second init");
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn test_corrupt_row_surfaces_backend_error() {
        let store = setup_store();
        {
            let conn = store.lock_conn();
            conn.execute(
                "INSERT INTO quality_reports
                 (conversation_id, seed_id, metrics, composite_score, passed, failures, evaluated_at)
                 VALUES ('bad', 's', 'not json', 0.0, 0, '[]', '2026-01-01T00:00:00Z')",
                [],
            )
            .expect("insert raw row");
        }

        let err = store.list().expect_err("corrupt metrics should fail");
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
