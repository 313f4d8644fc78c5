use crate::core::MetricKey;

// ---------------------------------------------------------------------------
// Sub-error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("metric {metric} is not a finite number")]
    NonFinite { metric: MetricKey },
    #[error("metric {metric} out of range [0, 1]: {value}")]
    OutOfRange { metric: MetricKey, value: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold for {metric} is not a finite number")]
    NonFinite { metric: MetricKey },
    #[error("threshold for {metric} out of range [0, 1]: {value}")]
    OutOfRange { metric: MetricKey, value: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsSourceError {
    #[error("metrics source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("metrics source connection failed: {0}")]
    Connection(String),
    #[error("metrics source timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("failed to decode metrics: {0}")]
    Decode(String),
    #[error("target cannot be addressed at the metrics source: {0}")]
    InvalidTarget(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("report store error: {0}")]
    Backend(String),
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Display formatting --

    #[test]
    fn test_display_out_of_range() {
        let err = MetricsError::OutOfRange {
            metric: MetricKey::PrivacyScore,
            value: 1.5,
        };
        assert_eq!(err.to_string(), "metric privacy_score out of range [0, 1]: 1.5");
    }

    #[test]
    fn test_display_non_finite_threshold() {
        let err = ThresholdError::NonFinite {
            metric: MetricKey::Memorizacion,
        };
        assert_eq!(
            err.to_string(),
            "threshold for memorizacion is not a finite number"
        );
    }

    #[test]
    fn test_display_source_timeout() {
        let err = MetricsSourceError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "metrics source timed out after 5000ms");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(err.to_string().starts_with("report serialization error:"));
    }
}
