//! Plain-text deletion reports.
//!
//! Pure transforms of already-computed results; nothing here touches the
//! filesystem or re-derives an outcome.

use std::fmt::Write;

use crate::engine::{BatchResult, WipeResult, WipeState};
use crate::format::format_duration;

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn status_tag(result: &WipeResult) -> &'static str {
    match result.state {
        WipeState::Done => "SUCCESS",
        WipeState::Cancelled => "SKIPPED",
        _ => "FAILED",
    }
}

/// Full report for a report file: every error and every file is listed
pub fn render_batch_report(batch: &BatchResult) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "SECURE DELETION REPORT");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Report ID: {}", batch.id);
    if let Some(source) = &batch.source {
        let _ = writeln!(out, "Target: {}", source.display());
    }
    let _ = writeln!(out, "Operation: {}", batch.method.as_str().to_uppercase());
    let _ = writeln!(out, "Start Time: {}", batch.start_time.to_rfc3339());
    let _ = writeln!(out, "End Time: {}", batch.end_time.to_rfc3339());
    let _ = writeln!(out, "Duration: {:.2} seconds", batch.duration_secs);
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY:");
    let _ = writeln!(out, "  Total Files: {}", batch.total_files);
    let _ = writeln!(out, "  Successful: {}", batch.successful);
    let _ = writeln!(out, "  Failed: {}", batch.failed);
    let _ = writeln!(out, "  Skipped: {}", batch.skipped);
    let _ = writeln!(out, "  Verified Deleted: {}", batch.verified_count());
    let _ = writeln!(out);

    if !batch.errors.is_empty() {
        let _ = writeln!(out, "ERRORS:");
        for error in &batch.errors {
            let _ = writeln!(out, "  {}: {}", error.path.display(), error.message);
        }
        let _ = writeln!(out);
    }

    if !batch.files.is_empty() || !batch.skipped_paths.is_empty() {
        let _ = writeln!(out, "FILE DETAILS:");
        for file in &batch.files {
            let _ = writeln!(out, "  [{}] {}", status_tag(file), file.path.display());
            if file.state == WipeState::Failed {
                let _ = writeln!(
                    out,
                    "          Error: {}",
                    file.error.as_deref().unwrap_or("Unknown")
                );
            }
        }
        // Never attempted; files cancelled mid-wipe are already listed above
        for path in batch
            .skipped_paths
            .iter()
            .filter(|p| !batch.files.iter().any(|f| &f.path == *p))
        {
            let _ = writeln!(out, "  [SKIPPED] {}", path.display());
        }
    }

    let _ = write!(out, "{}", rule());
    out
}

/// Report for a single-file wipe
pub fn render_file_report(result: &WipeResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "SECURE DELETION REPORT");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "File: {}", result.path.display());
    let _ = writeln!(out, "Operation: {}", result.method.as_str().to_uppercase());
    let _ = writeln!(out, "Strategy: {}", result.strategy);
    let _ = writeln!(out, "Start Time: {}", result.start_time.to_rfc3339());
    let _ = writeln!(out, "End Time: {}", result.end_time.to_rfc3339());
    let _ = writeln!(out, "Duration: {:.2} seconds", result.duration_secs);
    let _ = writeln!(out);
    let _ = writeln!(out, "Status: {}", status_tag(result));
    let _ = writeln!(out, "Passes Completed: {}", result.passes_completed);
    let _ = writeln!(out, "Bytes Written: {}", result.bytes_written);
    let _ = writeln!(
        out,
        "Verified Deleted: {}",
        if result.verified { "yes" } else { "no" }
    );
    if let Some(sample_check) = result.sample_check {
        let _ = writeln!(
            out,
            "Sample Check: {}",
            if sample_check { "passed" } else { "FAILED" }
        );
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {}", error);
    }

    let _ = write!(out, "{}", rule());
    out
}

/// Short interactive summary; at most `error_limit` errors are listed
pub fn render_summary(batch: &BatchResult, error_limit: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "OPERATION COMPLETE");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Total Files: {}", batch.total_files);
    let _ = writeln!(out, "Successful: {} ✓", batch.successful);
    let _ = writeln!(out, "Failed: {} ✗", batch.failed);
    if batch.skipped > 0 {
        let _ = writeln!(out, "Skipped: {}", batch.skipped);
    }
    let _ = writeln!(out, "Duration: {}", format_duration(batch.duration_secs));
    let _ = write!(out, "{}", rule());

    if !batch.errors.is_empty() {
        let _ = write!(out, "\n\nERRORS:");
        for error in batch.errors.iter().take(error_limit) {
            let _ = write!(out, "\n  {}: {}", error.path.display(), error.message);
        }
        if batch.errors.len() > error_limit {
            let _ = write!(
                out,
                "\n  ... and {} more errors",
                batch.errors.len() - error_limit
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationFlag;
    use crate::config::WipeConfig;
    use crate::engine::WipeEngine;
    use crate::sanitize::WipeMethod;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn batch_with_failures(failures: usize) -> (TempDir, BatchResult) {
        let temp_dir = TempDir::new().unwrap();
        let ok = temp_dir.path().join("ok.txt");
        std::fs::write(&ok, b"data").unwrap();

        let mut paths = vec![ok];
        for i in 0..failures {
            paths.push(temp_dir.path().join(format!("missing_{}.txt", i)));
        }

        let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());
        let batch = engine.wipe_selection(&paths, WipeMethod::Clear);
        (temp_dir, batch)
    }

    #[test]
    fn test_batch_report_layout() {
        let (_temp_dir, batch) = batch_with_failures(2);
        let report = render_batch_report(&batch);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "=".repeat(60));
        assert_eq!(lines[1], "SECURE DELETION REPORT");
        assert!(report.contains("Operation: CLEAR"));
        assert!(report.contains("  Total Files: 3"));
        assert!(report.contains("  Successful: 1"));
        assert!(report.contains("  Failed: 2"));
        assert!(report.contains("  Skipped: 0"));
        assert!(report.contains("ERRORS:"));
        assert_eq!(report.matches("[FAILED]").count(), 2);
        assert_eq!(report.matches("[SUCCESS]").count(), 1);
        assert!(report.contains("          Error: File does not exist"));
        assert_eq!(*lines.last().unwrap(), "=".repeat(60));
    }

    #[test]
    fn test_report_is_pure() {
        let (_temp_dir, batch) = batch_with_failures(1);
        assert_eq!(render_batch_report(&batch), render_batch_report(&batch));
    }

    #[test]
    fn test_summary_caps_errors() {
        let (_temp_dir, batch) = batch_with_failures(8);
        let summary = render_summary(&batch, 5);

        assert!(summary.contains("Failed: 8 ✗"));
        assert_eq!(summary.matches("File does not exist").count(), 5);
        assert!(summary.contains("... and 3 more errors"));

        // The file report is never capped
        let full = render_batch_report(&batch);
        assert_eq!(full.matches("[FAILED]").count(), 8);
        assert!(!full.contains("more errors"));
    }

    #[test]
    fn test_skipped_files_are_listed() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..2)
            .map(|i| {
                let p = temp_dir.path().join(format!("{}.txt", i));
                std::fs::write(&p, b"x").unwrap();
                p
            })
            .collect();

        let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());
        engine.emergency_stop();
        let batch = engine.wipe_selection(&paths, WipeMethod::Clear);

        let report = render_batch_report(&batch);
        assert_eq!(report.matches("[SKIPPED]").count(), 2);
        assert!(render_summary(&batch, 5).contains("Skipped: 2"));
    }

    #[test]
    fn test_file_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("one.txt");
        std::fs::write(&path, vec![7u8; 2048]).unwrap();

        let engine = WipeEngine::new(WipeConfig::default(), CancellationFlag::new());
        let result = engine.wipe_file(&path, WipeMethod::Purge);
        let report = render_file_report(&result);

        assert!(report.contains("Status: SUCCESS"));
        assert!(report.contains("Passes Completed: 7"));
        assert!(report.contains("Verified Deleted: yes"));
        assert!(report.contains("Sample Check: passed"));
    }
}
