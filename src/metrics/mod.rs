//! Benchmark metrics: scraping tool output and merging it fleet-wide.

pub mod aggregate;
pub mod parser;

pub use aggregate::{benchmark_from_outcome, failed_nodes, rank_by_throughput, summarize};
