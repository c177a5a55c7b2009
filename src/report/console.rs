//! Operator-facing console summaries.

use crate::metrics::failed_nodes;
use crate::models::{BenchmarkResult, FleetBenchmarkSummary, Node, SetupResult};

/// Fleet-wide attack figures followed by one block per failing host.
pub fn attack_summary(summary: &FleetBenchmarkSummary, results: &[BenchmarkResult]) -> String {
    let mut out = String::new();

    let failed = failed_nodes(results);
    if !failed.is_empty() {
        out.push_str("Looks like the gophers started a civil war.\n");
        for result in failed {
            for error in &result.errors {
                out.push_str(&format!("Error: ({}) {}\n", result.host, error));
            }
        }
        out.push('\n');
    }

    out.push_str(&format!("Completed requests: {}\n", summary.completed));
    out.push_str(&format!("Failed requests: {}\n", summary.failed));
    out.push_str(&format!(
        "Requests per second: {:.2} [#/sec] (mean)\n",
        summary.requests_per_second
    ));
    out.push_str(&format!(
        "Time per request: {:.3} [ms] (mean)\n",
        summary.time_per_request
    ));

    out
}

/// Per-host setup failures, then the size of the ready army.
pub fn setup_summary(outcomes: &[SetupResult], ready: usize) -> String {
    let mut out = String::new();

    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        out.push_str("Looks like the gophers were inbred, check your account to make sure things haven't gone awry.\n");
        out.push_str(&format!("Message: ({}) {}\n", outcome.host, outcome.output.trim()));
        out.push_str(&format!(
            "Error: ({}) {}\n",
            outcome.host,
            outcome.errors.join("; ")
        ));
    }

    out.push_str(&format!("\n{} gophers are ready to invade!\n", ready));
    out
}

/// `Name (DNS Name) - State` per node, or a notice for an empty fleet.
pub fn fleet_status(nodes: &[Node]) -> String {
    if nodes.is_empty() {
        return "Your army has gone AWOL.  Better recruit some more!\n".to_string();
    }

    let mut out = String::from("Name (DNS Name) - State\n");
    for node in nodes {
        out.push_str(&format!("{} ({}) - {}\n", node.name(), node.address, node.state));
    }
    out
}
