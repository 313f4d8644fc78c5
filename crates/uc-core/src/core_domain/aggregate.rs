use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::{round3, MetricKey, QualityReport};

pub const HISTOGRAM_BUCKETS: usize = 10;

// ---------------------------------------------------------------------------
// QualitySummary — dashboard view over a report snapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureCount {
    pub reason: String,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total: u32,
    pub passed_count: u32,
    pub failed_count: u32,
    /// Whole-number percentage.
    pub pass_rate: u32,
    pub avg_composite_score: f64,
    pub metric_averages: BTreeMap<MetricKey, f64>,
    pub histogram: [u32; HISTOGRAM_BUCKETS],
    pub failure_frequency: Vec<FailureCount>,
}

/// Histogram bucket for a composite score: `[0.0, 0.1)` is bucket 0 and so
/// on, with the top bucket closed so 1.0 lands in bucket 9.
pub fn bucket_index(score: f64) -> usize {
    if score.is_nan() || score <= 0.0 {
        return 0;
    }
    ((score * HISTOGRAM_BUCKETS as f64).floor() as usize).min(HISTOGRAM_BUCKETS - 1)
}

/// Display labels for the histogram buckets, `"0.0-0.1"` through `"0.9-1.0"`.
pub fn histogram_labels() -> [String; HISTOGRAM_BUCKETS] {
    std::array::from_fn(|i| format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0))
}

pub fn aggregate(reports: &[QualityReport]) -> QualitySummary {
    let total = reports.len() as u32;
    let passed_count = reports.iter().filter(|r| r.passed).count() as u32;

    let pass_rate = if total == 0 {
        0
    } else {
        (f64::from(passed_count) / f64::from(total) * 100.0).round() as u32
    };

    let mut histogram = [0u32; HISTOGRAM_BUCKETS];
    for report in reports {
        histogram[bucket_index(report.composite_score)] += 1;
    }

    let avg_composite_score = mean(reports.iter().map(|r| r.composite_score), reports.len());

    let metric_averages = MetricKey::ALL
        .iter()
        .map(|&metric| {
            let avg = mean(reports.iter().map(|r| r.metrics.value(metric)), reports.len());
            (metric, avg)
        })
        .collect();

    QualitySummary {
        total,
        passed_count,
        failed_count: total - passed_count,
        pass_rate,
        avg_composite_score,
        metric_averages,
        histogram,
        failure_frequency: failure_frequency(reports),
    }
}

fn mean(values: impl Iterator<Item = f64>, len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    round3(values.sum::<f64>() / len as f64)
}

/// Count failure reasons, most frequent first. Ties keep first-seen order.
fn failure_frequency(reports: &[QualityReport]) -> Vec<FailureCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<FailureCount> = Vec::new();

    for reason in reports.iter().flat_map(|r| r.failures.iter()) {
        match index.get(reason.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(reason.as_str(), counts.len());
                counts.push(FailureCount {
                    reason: reason.clone(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::core::{ConversationId, QualityMetrics, SeedId};

    fn report(id: &str, composite: f64, failures: &[&str]) -> QualityReport {
        QualityReport {
            conversation_id: ConversationId::new(id),
            seed_id: SeedId::new("seed-1"),
            metrics: QualityMetrics {
                rouge_l: 0.8,
                fidelidad_factual: 0.9,
                diversidad_lexica: 0.7,
                coherencia_dialogica: 0.8,
                privacy_score: 0.0,
                memorizacion: 0.0,
                tool_call_validity: None,
            },
            composite_score: composite,
            passed: failures.is_empty(),
            failures: failures.iter().map(|f| (*f).to_owned()).collect(),
            evaluated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_empty_aggregate_is_all_zero() {
        let summary = aggregate(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.passed_count, 0);
        assert_eq!(summary.pass_rate, 0);
        assert_eq!(summary.avg_composite_score, 0.0);
        assert_eq!(summary.histogram, [0; 10]);
        assert!(summary.failure_frequency.is_empty());
        assert_eq!(summary.metric_averages.len(), MetricKey::ALL.len());
        assert!(summary.metric_averages.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bucket_index_edges() {
        assert_eq!(bucket_index(0.0), 0);
        assert_eq!(bucket_index(0.3), 3);
        assert_eq!(bucket_index(0.95), 9);
        assert_eq!(bucket_index(1.0), 9);
        assert_eq!(bucket_index(0.099), 0);
        assert_eq!(bucket_index(0.1), 1);
    }

    #[test]
    fn test_histogram_always_has_ten_buckets() {
        let reports = vec![report("a", 1.0, &[]), report("b", 0.0, &["x"])];
        let summary = aggregate(&reports);
        assert_eq!(summary.histogram.len(), 10);
        assert_eq!(summary.histogram[0], 1);
        assert_eq!(summary.histogram[9], 1);
        assert_eq!(summary.histogram.iter().sum::<u32>(), 2);
    }

    #[test]
    fn test_pass_rate_rounds_to_whole_percent() {
        let reports = vec![
            report("a", 0.8, &[]),
            report("b", 0.7, &[]),
            report("c", 0.0, &["PII detected (privacy score must be 0.0)"]),
        ];
        let summary = aggregate(&reports);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed_count, 2);
        assert_eq!(summary.failed_count, 1);
        // 2/3 = 66.67%
        assert_eq!(summary.pass_rate, 67);
        assert_eq!(summary.avg_composite_score, 0.5);
    }

    #[test]
    fn test_metric_averages_default_tool_calls() {
        let mut with_tools = report("a", 0.7, &[]);
        with_tools.metrics.tool_call_validity = Some(0.5);
        let without_tools = report("b", 0.7, &[]);

        let summary = aggregate(&[with_tools, without_tools]);
        assert_eq!(summary.metric_averages[&MetricKey::ToolCallValidity], 0.75);
        assert_eq!(summary.metric_averages[&MetricKey::RougeL], 0.8);
    }

    #[test]
    fn test_failure_frequency_sorted_with_stable_ties() {
        let reports = vec![
            report("a", 0.5, &["beta", "alpha"]),
            report("b", 0.5, &["gamma"]),
            report("c", 0.5, &["gamma", "alpha"]),
        ];
        let summary = aggregate(&reports);
        let order: Vec<(&str, u32)> = summary
            .failure_frequency
            .iter()
            .map(|f| (f.reason.as_str(), f.count))
            .collect();
        assert_eq!(order, vec![("alpha", 2), ("gamma", 2), ("beta", 1)]);
    }

    #[test]
    fn test_histogram_labels() {
        let labels = histogram_labels();
        assert_eq!(labels[0], "0.0-0.1");
        assert_eq!(labels[9], "0.9-1.0");
    }

    #[test]
    fn test_summary_serializes_metric_keys_as_strings() {
        let summary = aggregate(&[report("a", 0.7, &[])]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["metric_averages"]["diversidad_lexica"], 0.7);
        assert_eq!(value["histogram"][7], 1);
    }
}
