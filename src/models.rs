//! Data models for the fleet controller.
//!
//! This module contains the core data structures shared by the poller,
//! dispatcher, aggregator and reporter: nodes and their lifecycle states,
//! per-node results, and the fleet-wide benchmark summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag key the inventory uses for a node's display name.
pub const NAME_TAG: &str = "Name";

/// Lifecycle state of a node, as reported by the inventory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    /// A state code this tool does not know about.
    Unknown(u16),
}

impl NodeState {
    /// Numeric state code used by the inventory service.
    pub fn code(&self) -> u16 {
        match self {
            NodeState::Pending => 0,
            NodeState::Running => 16,
            NodeState::ShuttingDown => 32,
            NodeState::Terminated => 48,
            NodeState::Stopping => 64,
            NodeState::Stopped => 80,
            NodeState::Unknown(code) => *code,
        }
    }

    /// Map a numeric state code back to a state.
    ///
    /// Only the low byte is significant; the high byte is reserved for
    /// internal use by the inventory service.
    pub fn from_code(code: u16) -> Self {
        match code & 0xff {
            0 => NodeState::Pending,
            16 => NodeState::Running,
            32 => NodeState::ShuttingDown,
            48 => NodeState::Terminated,
            64 => NodeState::Stopping,
            80 => NodeState::Stopped,
            other => NodeState::Unknown(other),
        }
    }

    /// Whether a node in this state can accept remote sessions.
    pub fn is_ready(&self) -> bool {
        matches!(self, NodeState::Running)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Running => write!(f, "running"),
            NodeState::ShuttingDown => write!(f, "shutting-down"),
            NodeState::Terminated => write!(f, "terminated"),
            NodeState::Stopping => write!(f, "stopping"),
            NodeState::Stopped => write!(f, "stopped"),
            NodeState::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// State filter for inventory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    /// Every marker-tagged node regardless of state.
    #[default]
    Any,
    /// Only nodes in the given state.
    State(NodeState),
}

impl StateFilter {
    /// Nodes that are reachable over the remote-execution channel.
    pub fn ready() -> Self {
        StateFilter::State(NodeState::Running)
    }

    /// Nodes still booting.
    pub fn pending() -> Self {
        StateFilter::State(NodeState::Pending)
    }

    /// Whether a node in `state` passes this filter.
    pub fn matches(&self, state: NodeState) -> bool {
        match self {
            StateFilter::Any => true,
            StateFilter::State(wanted) => wanted.code() == state.code(),
        }
    }
}

/// A single inventory tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A compute node known to the inventory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque identity assigned by the inventory.
    pub id: String,
    /// DNS name or IP address; empty until the node has one.
    pub address: String,
    /// Current lifecycle state.
    pub state: NodeState,
    /// Tags keyed by tag key.
    pub tags: BTreeMap<String, String>,
}

impl Node {
    /// Value of the `Name` tag, or an empty string.
    pub fn name(&self) -> &str {
        self.tags.get(NAME_TAG).map(String::as_str).unwrap_or("")
    }

    /// Whether this node carries `tag` with a matching value.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.get(&tag.key) == Some(&tag.value)
    }
}

/// The node set returned by one poll. Never cached across commands.
pub type FleetSnapshot = Vec<Node>;

/// What a single remote invocation produced on one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    /// Address the command ran against.
    pub host: String,
    /// Everything captured from the command's standard output.
    pub output: String,
    /// Errors hit while connecting or running the command.
    pub errors: Vec<String>,
}

impl NodeOutcome {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of running the setup command on one node.
pub type SetupResult = NodeOutcome;

/// Benchmark figures scraped from one node's load-generator output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Host the benchmark ran on (empty when produced by the parser alone).
    #[serde(default)]
    pub host: String,
    /// Requests that completed.
    pub completed: u64,
    /// Requests that failed.
    pub failed: u64,
    /// Mean throughput in requests per second.
    pub requests_per_second: f64,
    /// Mean time per request in milliseconds.
    pub time_per_request: f64,
    /// Transport or command errors for this node.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl BenchmarkResult {
    /// Total request volume (completed + failed), saturating at `u64::MAX`.
    pub fn volume(&self) -> u64 {
        self.completed.saturating_add(self.failed)
    }
}

/// Fleet-wide merge of every node's benchmark result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetBenchmarkSummary {
    /// Number of nodes that reported (successfully or not).
    pub nodes: usize,
    /// Nodes whose result carried at least one error.
    pub nodes_with_errors: usize,
    /// Sum of completed requests.
    pub completed: u64,
    /// Sum of failed requests.
    pub failed: u64,
    /// Sum of per-node throughput.
    pub requests_per_second: f64,
    /// Volume-weighted mean time per request in milliseconds.
    pub time_per_request: f64,
}

impl FleetBenchmarkSummary {
    pub fn volume(&self) -> u64 {
        self.completed.saturating_add(self.failed)
    }
}

/// Context recorded alongside an attack report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackMetadata {
    /// Target url.
    pub url: String,
    /// When the attack finished.
    pub attack_date: DateTime<Utc>,
    /// Command each node ran.
    pub command: String,
    /// Requests issued per node.
    pub requests_per_node: u32,
    /// Concurrency per node.
    pub concurrency: u32,
    /// Wall-clock time of the whole attack, in seconds.
    pub duration_seconds: f64,
}

/// Everything written to an attack report file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackReport {
    pub metadata: AttackMetadata,
    pub summary: FleetBenchmarkSummary,
    /// Per-node results, including nodes that failed.
    pub results: Vec<BenchmarkResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(state: NodeState) -> Node {
        Node {
            id: "i-123".to_string(),
            address: "ec2-1-2-3-4.compute.amazonaws.com".to_string(),
            state,
            tags: [
                ("Name".to_string(), "i-123".to_string()),
                ("gopher".to_string(), "true".to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_state_codes_round_trip_known_states() {
        for state in [
            NodeState::Pending,
            NodeState::Running,
            NodeState::ShuttingDown,
            NodeState::Terminated,
            NodeState::Stopping,
            NodeState::Stopped,
        ] {
            assert_eq!(NodeState::from_code(state.code()), state);
        }
    }

    #[test]
    fn test_state_code_ignores_high_byte() {
        assert_eq!(NodeState::from_code(0x0110), NodeState::Running);
        assert_eq!(NodeState::from_code(7), NodeState::Unknown(7));
    }

    #[test]
    fn test_readiness_predicate() {
        assert!(NodeState::Running.is_ready());
        assert!(!NodeState::Pending.is_ready());
        assert_eq!(StateFilter::ready(), StateFilter::State(NodeState::Running));
    }

    #[test]
    fn test_state_filter_matches() {
        assert!(StateFilter::Any.matches(NodeState::Terminated));
        assert!(StateFilter::pending().matches(NodeState::Pending));
        assert!(!StateFilter::pending().matches(NodeState::Running));
    }

    #[test]
    fn test_node_tags() {
        let n = node(NodeState::Running);
        assert_eq!(n.name(), "i-123");
        assert!(n.has_tag(&Tag::new("gopher", "true")));
        assert!(!n.has_tag(&Tag::new("gopher", "false")));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(NodeState::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(NodeState::Unknown(99).to_string(), "unknown(99)");
    }

    #[test]
    fn test_benchmark_volume() {
        let result = BenchmarkResult {
            completed: 97,
            failed: 3,
            ..Default::default()
        };
        assert_eq!(result.volume(), 100);
    }
}
