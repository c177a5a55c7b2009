//! Fleet-wide aggregation of per-node benchmark results.
//!
//! All merges are commutative so results can be folded in whatever order
//! the nodes finish.

use crate::metrics::parser;
use crate::models::{BenchmarkResult, FleetBenchmarkSummary, NodeOutcome};

/// Turn one node's raw outcome into a benchmark result.
///
/// Whatever the output contains is parsed even when the node reported
/// errors, so a failed command still contributes the figures it printed.
pub fn benchmark_from_outcome(outcome: NodeOutcome) -> BenchmarkResult {
    let mut result = parser::parse(&outcome.output);
    result.host = outcome.host;
    result.errors = outcome.errors;
    result
}

/// Merge per-node results into a fleet summary.
///
/// Counts and throughput sum. Time per request is weighted by each node's
/// request volume: sum(time_i * volume_i) / sum(volume_i).
pub fn summarize(results: &[BenchmarkResult]) -> FleetBenchmarkSummary {
    let mut summary = FleetBenchmarkSummary {
        nodes: results.len(),
        ..Default::default()
    };
    let mut weighted_time = 0.0;

    for result in results {
        if !result.errors.is_empty() {
            summary.nodes_with_errors += 1;
        }
        // Node output is untrusted; absurd counts saturate instead of overflowing.
        summary.completed = summary.completed.saturating_add(result.completed);
        summary.failed = summary.failed.saturating_add(result.failed);
        summary.requests_per_second += result.requests_per_second;
        weighted_time += result.time_per_request * result.volume() as f64;
    }

    let volume = summary.volume();
    summary.time_per_request = if volume > 0 {
        weighted_time / volume as f64
    } else {
        0.0
    };

    summary
}

/// Results that carried at least one error, for per-host reporting.
pub fn failed_nodes(results: &[BenchmarkResult]) -> Vec<&BenchmarkResult> {
    results.iter().filter(|r| !r.errors.is_empty()).collect()
}

/// Results sorted by throughput (highest first).
pub fn rank_by_throughput(results: &[BenchmarkResult]) -> Vec<&BenchmarkResult> {
    let mut ranked: Vec<_> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.requests_per_second
            .partial_cmp(&a.requests_per_second)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
