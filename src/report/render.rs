// src/report/render.rs
// =============================================================================
// Prints the report either as a human-readable summary or as JSON.
//
// The text layout: summary statistics, breakdown by type, a bounded list of
// failed resources grouped by type, then the key-file checklist.
// =============================================================================

use anyhow::Result;
use std::fmt::Write;

use super::{KeyFileCheck, Report};

// Prints the report to stdout
pub fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

// Builds the text report. Writing into a String never fails, so the
// fmt::Result values are ignored.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "📊 RESOURCE ACCESSIBILITY REPORT");
    let _ = writeln!(out, "{}", rule);

    let _ = writeln!(out, "\n📈 SUMMARY STATISTICS:");
    let _ = writeln!(out, "   Documents: {}", report.documents);
    let _ = writeln!(out, "   Total Resources: {}", report.total);
    let _ = writeln!(out, "   ✅ Passed: {}", report.passed);
    let _ = writeln!(out, "   ❌ Failed: {}", report.failed);
    match report.success_rate() {
        Some(rate) => {
            let _ = writeln!(out, "   📊 Success Rate: {:.1}%", rate);
        }
        None => {
            let _ = writeln!(out, "   📊 Success Rate: N/A (no resources found)");
        }
    }
    let _ = writeln!(out, "   🌐 Requests Sent: {}", report.requests);
    if report.interrupted {
        let _ = writeln!(
            out,
            "   ⏹️  Interrupted: {} reference(s) not checked",
            report.cancelled
        );
    }

    let _ = writeln!(out, "\n📋 BREAKDOWN BY FILE TYPE:");
    for (resource_type, stats) in &report.by_type {
        let percentage = if stats.total() > 0 {
            stats.passed as f64 / stats.total() as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "   {}: {}/{} passed ({:.1}%)",
            resource_type,
            stats.passed,
            stats.total(),
            percentage
        );
    }

    if !report.samples.is_empty() {
        let _ = writeln!(
            out,
            "\n❌ FAILED RESOURCES (first {} of {}):",
            report.samples.len(),
            report.failed
        );
        let mut current = None;
        for sample in &report.samples {
            if current != Some(sample.resource_type) {
                let _ = writeln!(out, "\n   {} files:", sample.resource_type);
                current = Some(sample.resource_type);
            }
            let _ = writeln!(
                out,
                "     • {} ({}) - {}",
                sample.resource,
                sample.document.display(),
                sample.reason_text()
            );
        }
    }

    if !report.key_files.is_empty() {
        let _ = writeln!(out, "\n🔑 KEY FILE ACCESSIBILITY:");
        for key in &report.key_files {
            let _ = writeln!(out, "   {}", key_file_line(key));
        }
    }

    if let Some(path) = &report.log_file {
        let _ = writeln!(out, "\n📄 Failure log: {}", path.display());
    }

    let _ = writeln!(out, "\n{}", rule);
    out
}

fn key_file_line(key: &KeyFileCheck) -> String {
    let local = if key.local { "✅" } else { "❌" };
    let web = match key.web {
        Some(true) => "✅",
        Some(false) => "❌",
        None => "⏭️",
    };
    format!("{}: Local {} | Web {}", key.path, local, web)
}
