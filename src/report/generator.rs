//! Attack report files.
//!
//! Renders an attack report as Markdown or JSON for the `--output` flag.

use crate::cli::OutputFormat;
use crate::metrics::{failed_nodes, rank_by_throughput};
use crate::models::{AttackMetadata, AttackReport, FleetBenchmarkSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AttackReport) -> String {
    let mut output = String::new();

    output.push_str("# Gophers Attack Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_nodes_section(report));
    output.push_str(&generate_errors_section(report));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &AttackMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Target:** {}\n", metadata.url));
    section.push_str(&format!(
        "- **Attack Date:** {}\n",
        metadata.attack_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Command:** `{}`\n", metadata.command));
    section.push_str(&format!(
        "- **Requests per Gopher:** {}\n",
        metadata.requests_per_node
    ));
    section.push_str(&format!("- **Concurrency:** {}\n", metadata.concurrency));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &FleetBenchmarkSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Gophers | With Errors | Completed | Failed | Requests/sec (sum) | Time/request (ms) |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {:.2} | {:.3} |\n\n",
        summary.nodes,
        summary.nodes_with_errors,
        summary.completed,
        summary.failed,
        summary.requests_per_second,
        summary.time_per_request
    ));

    section
}

fn generate_nodes_section(report: &AttackReport) -> String {
    let mut section = String::new();

    section.push_str("## Gophers\n\n");
    if report.results.is_empty() {
        section.push_str("No gophers took part in this attack.\n\n");
        return section;
    }

    section.push_str("| Host | Completed | Failed | Requests/sec | Time/request (ms) | Status |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for result in rank_by_throughput(&report.results) {
        let status = if result.errors.is_empty() { "ok" } else { "error" };
        section.push_str(&format!(
            "| `{}` | {} | {} | {:.2} | {:.3} | {} |\n",
            result.host,
            result.completed,
            result.failed,
            result.requests_per_second,
            result.time_per_request,
            status
        ));
    }
    section.push('\n');

    section
}

fn generate_errors_section(report: &AttackReport) -> String {
    let failed = failed_nodes(&report.results);
    if failed.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Errors\n\n");
    for result in failed {
        section.push_str(&format!("### {}\n\n", result.host));
        for error in &result.errors {
            section.push_str(&format!("- {}\n", error));
        }
        section.push('\n');
    }

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by gophers v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AttackReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render `report` in `format` and write it to `path`.
pub fn write_report(report: &AttackReport, path: &Path, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
