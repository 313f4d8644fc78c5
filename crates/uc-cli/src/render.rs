use colored::Colorize;
use serde::Deserialize;
use uc_core::core::{histogram_labels, QualityReport, QualitySummary, ScoreOutcome};

const BAR_WIDTH: usize = 40;
const TOP_FAILURES: usize = 5;

/// Job view as returned by `/api/v1/evaluations/{job_id}`.
#[derive(Debug, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub status: String,
    pub total: usize,
    pub processed: usize,
    pub evaluated: usize,
    #[serde(default)]
    pub skipped: Vec<SkippedView>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkippedView {
    pub conversation_id: String,
}

pub fn verdict(passed: bool) -> String {
    if passed {
        "PASS".bright_green().to_string()
    } else {
        "FAIL".red().to_string()
    }
}

pub fn print_score(outcome: &ScoreOutcome) {
    println!(
        "{} composite {:.3}",
        verdict(outcome.passed),
        outcome.composite_score
    );
    for failure in &outcome.failures {
        println!("  - {}", failure.yellow());
    }
}

pub fn print_job(job: &JobView) {
    let status = match job.status.as_str() {
        "completed" => job.status.bright_green(),
        "running" => job.status.bright_cyan(),
        _ => job.status.red(),
    };
    println!(
        "job {} [{status}] {}/{} processed, {} evaluated, {} skipped",
        job.job_id,
        job.processed,
        job.total,
        job.evaluated,
        job.skipped.len()
    );
    if !job.skipped.is_empty() {
        let ids: Vec<&str> = job
            .skipped
            .iter()
            .map(|s| s.conversation_id.as_str())
            .collect();
        println!("  skipped: {}", ids.join(", ").yellow());
    }
    if let Some(error) = &job.error {
        println!("  error: {}", error.red());
    }
}

pub fn print_reports(reports: &[QualityReport]) {
    if reports.is_empty() {
        println!("No reports.");
        return;
    }
    for report in reports {
        println!(
            "{} {:<24} seed {:<16} composite {:.3}",
            verdict(report.passed),
            report.conversation_id,
            report.seed_id,
            report.composite_score
        );
        for failure in &report.failures {
            println!("    - {}", failure.yellow());
        }
    }
}

pub fn print_summary(summary: &QualitySummary) {
    println!(
        "{} reports: {} passed, {} failed ({}% pass rate)",
        summary.total,
        summary.passed_count.to_string().bright_green(),
        summary.failed_count.to_string().red(),
        summary.pass_rate
    );
    println!("average composite: {:.3}", summary.avg_composite_score);

    println!();
    println!("metric averages:");
    for (metric, avg) in &summary.metric_averages {
        println!("  {:<22} {avg:.3}", metric.as_str());
    }

    println!();
    println!("composite score distribution:");
    for line in histogram_lines(&summary.histogram) {
        println!("  {line}");
    }

    if !summary.failure_frequency.is_empty() {
        println!();
        println!("top failure reasons:");
        for failure in summary.failure_frequency.iter().take(TOP_FAILURES) {
            println!("  {:>4}  {}", failure.count, failure.reason.yellow());
        }
    }
}

/// One line per bucket, bars scaled to the fullest bucket.
pub fn histogram_lines(histogram: &[u32]) -> Vec<String> {
    let labels = histogram_labels();
    let max = histogram.iter().copied().max().unwrap_or(0);

    labels
        .iter()
        .zip(histogram)
        .map(|(label, &count)| {
            let width = if max == 0 {
                0
            } else {
                (count as usize * BAR_WIDTH).div_ceil(max as usize)
            };
            format!("{label} | {:<BAR_WIDTH$} {count}", "#".repeat(width))
        })
        .collect()
}
