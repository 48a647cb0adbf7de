//! Human-readable run report.

use std::fmt::Write;

use crate::batch::{JobOutcome, RunSummary, TranscodeResult};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Renders a byte count as megabytes with two decimals, e.g. `12.34MB`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / BYTES_PER_MB)
}

/// Renders a savings ratio as a percentage, e.g. `50.00%`. Growth shows as negative.
pub fn format_savings(savings: Option<f64>) -> String {
    match savings {
        Some(ratio) => format!("{:.2}%", ratio * 100.0),
        None => "n/a".to_string(),
    }
}

/// The per-file completion line.
pub fn completion_line(result: &TranscodeResult) -> String {
    format!(
        "Original size: {} -> Compressed size: {} ({} savings)",
        format_megabytes(result.input_size),
        format_megabytes(result.output_size),
        format_savings(result.savings)
    )
}

/// The end-of-run summary block.
pub fn summary_text(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Processed {} of {} video(s): {} succeeded, {} failed, {} skipped",
        summary.attempted,
        summary.records.len(),
        summary.succeeded,
        summary.failed,
        summary.skipped
    );

    if summary.succeeded > 0 {
        let _ = writeln!(
            out,
            "Total: {} -> {} ({} savings)",
            format_megabytes(summary.total_input_bytes),
            format_megabytes(summary.total_output_bytes),
            format_savings(summary.total_savings())
        );
    }

    if summary.has_failures() {
        let _ = writeln!(out, "Failed:");
        for (record, reason) in summary.failures() {
            let _ = writeln!(out, "  {}: {}", record.file_name, reason);
        }
    }

    let skipped: Vec<&str> = summary
        .records
        .iter()
        .filter(|r| matches!(r.outcome, JobOutcome::Skipped))
        .map(|r| r.file_name.as_str())
        .collect();
    if !skipped.is_empty() {
        let _ = writeln!(out, "Skipped: {}", skipped.join(", "));
    }

    let _ = write!(
        out,
        "Optimized videos are saved in: {}",
        summary.output_dir.display()
    );
    out
}
