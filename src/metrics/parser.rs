//! Scraping benchmark figures out of load-generator output.
//!
//! The load generator prints a human-readable report. Each figure we care
//! about sits on its own labelled line, e.g.
//!
//! ```text
//! Complete requests:      1000
//! Failed requests:        3
//! Requests per second:    245.67 [#/sec] (mean)
//! Time per request:       40.739 [ms] (mean)
//! Time per request:       4.074 [ms] (mean, across all concurrent requests)
//! ```
//!
//! Any tool that prints these labels can be parsed here.

use crate::models::BenchmarkResult;
use regex::Regex;
use std::sync::OnceLock;

/// Which field a rule writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Completed,
    Failed,
    RequestsPerSecond,
    TimePerRequest,
}

/// One label -> value extraction rule.
struct Rule {
    /// Substring a line must contain for the rule to apply.
    label: &'static str,
    /// Lines containing this are skipped even if they carry the label.
    exclude: Option<&'static str>,
    /// Captures the value in group 1.
    pattern: Regex,
    field: Field,
}

static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

fn rules() -> &'static [Rule] {
    RULES.get_or_init(|| {
        vec![
            Rule {
                label: "Complete requests:",
                exclude: None,
                pattern: Regex::new(r"Complete requests:\s*(\d+)")
                    .expect("Invalid complete requests regex"),
                field: Field::Completed,
            },
            Rule {
                label: "Failed requests:",
                exclude: None,
                pattern: Regex::new(r"Failed requests:\s*(\d+)")
                    .expect("Invalid failed requests regex"),
                field: Field::Failed,
            },
            Rule {
                label: "Requests per second:",
                exclude: None,
                pattern: Regex::new(r"Requests per second:\s*(\d+(?:\.\d+)?)")
                    .expect("Invalid requests per second regex"),
                field: Field::RequestsPerSecond,
            },
            Rule {
                label: "Time per request:",
                // Same label, but the figure is divided by concurrency.
                exclude: Some("across all concurrent requests"),
                pattern: Regex::new(r"Time per request:\s*(\d+(?:\.\d+)?)\s*\[ms\]\s*\(mean\)")
                    .expect("Invalid time per request regex"),
                field: Field::TimePerRequest,
            },
        ]
    })
}

/// Parse one block of tool output into a benchmark record.
///
/// Never fails: lines that match no rule are ignored, and a figure whose
/// line is missing or malformed stays at zero. `host` and `errors` are left
/// empty for the caller to fill in.
pub fn parse(output: &str) -> BenchmarkResult {
    let mut result = BenchmarkResult::default();

    for line in output.lines() {
        for rule in rules() {
            if !line.contains(rule.label) {
                continue;
            }
            if rule.exclude.is_some_and(|phrase| line.contains(phrase)) {
                continue;
            }
            let Some(value) = rule
                .pattern
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
            else {
                continue;
            };
            apply(&mut result, rule.field, value);
        }
    }

    result
}

fn apply(result: &mut BenchmarkResult, field: Field, value: &str) {
    match field {
        Field::Completed => result.completed = value.parse().unwrap_or(0),
        Field::Failed => result.failed = value.parse().unwrap_or(0),
        Field::RequestsPerSecond => result.requests_per_second = value.parse().unwrap_or(0.0),
        Field::TimePerRequest => result.time_per_request = value.parse().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AB_OUTPUT: &str = "\
This is ApacheBench, Version 2.3 <$Revision: 1430300 $>
Benchmarking example.com (be patient).....done

Server Software:        nginx
Concurrency Level:      10
Time taken for tests:   4.070 seconds
Complete requests:      1000
Failed requests:        3
   (Connect: 0, Receive: 0, Length: 3, Exceptions: 0)
Requests per second:    245.67 [#/sec] (mean)
Time per request:       40.739 [ms] (mean)
Time per request:       4.074 [ms] (mean, across all concurrent requests)
Transfer rate:          120.51 [Kbytes/sec] received
";

    #[test]
    fn test_parse_ab_output() {
        let result = parse(AB_OUTPUT);
        assert_eq!(result.completed, 1000);
        assert_eq!(result.failed, 3);
        assert!((result.requests_per_second - 245.67).abs() < 1e-9);
        assert!((result.time_per_request - 40.739).abs() < 1e-9);
        assert!(result.errors.is_empty());
        assert!(result.host.is_empty());
    }

    #[test]
    fn test_across_all_concurrent_line_does_not_overwrite() {
        // Reversed order: the per-request mean must still win.
        let output = "Time per request: 40.739 [ms] (mean)\n\
                      Time per request: 4.074 [ms] (mean, across all concurrent requests)\n";
        let result = parse(output);
        assert!((result.time_per_request - 40.739).abs() < 1e-9);

        let only_across = "Time per request: 4.074 [ms] (mean, across all concurrent requests)";
        assert_eq!(parse(only_across).time_per_request, 0.0);
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse(AB_OUTPUT), parse(AB_OUTPUT));
    }

    #[test]
    fn test_empty_and_garbage_output_degrade_to_zero() {
        assert_eq!(parse(""), BenchmarkResult::default());
        assert_eq!(
            parse("ssh: connect to host 10.0.0.1 port 22: Connection refused"),
            BenchmarkResult::default()
        );
    }

    #[test]
    fn test_malformed_value_keeps_zero() {
        let output = "Complete requests: lots\nFailed requests: 2\n";
        let result = parse(output);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed, 2);
    }

    #[test]
    fn test_last_match_wins() {
        let output = "Complete requests: 10\nComplete requests: 20\n";
        assert_eq!(parse(output).completed, 20);
    }

    #[test]
    fn test_integer_throughput() {
        let result = parse("Requests per second:    300 [#/sec] (mean)");
        assert_eq!(result.requests_per_second, 300.0);
    }
}
