//! Console summaries and attack report files.

pub mod console;
pub mod generator;

pub use generator::write_report;
