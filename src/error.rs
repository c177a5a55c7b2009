//! Error types for fleet operations.
//!
//! Fatal errors (preconditions, inventory failures) abort the enclosing
//! command. Everything else is attached to the node it happened on and
//! reported after the fleet-wide operation completes.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the fleet command-and-control core.
#[derive(Error, Debug)]
pub enum FleetError {
    /// A required input is missing or invalid (key file, count, url).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The inventory service rejected or failed a request.
    #[error("inventory error: {0}")]
    Inventory(String),

    /// The remote session could not be established.
    #[error("could not connect to {host} after {attempts} attempt(s): {reason}")]
    Connect {
        host: String,
        attempts: u32,
        reason: String,
    },

    /// A single attempt to open a session was turned away.
    #[error("{host} refused the session: {reason}")]
    Handshake { host: String, reason: String },

    /// The remote command failed or exited non-zero.
    #[error("command failed on {host}: {reason}")]
    Command { host: String, reason: String },

    /// An operation ran past its allotted time.
    #[error("{what} timed out after {}", human_duration(.after))]
    Timeout { what: String, after: Duration },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whole seconds as `30s`, anything finer as `300ms`.
fn human_duration(duration: &Duration) -> String {
    if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

impl FleetError {
    /// Whether this error should stop the current command outright.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FleetError::Precondition(_) | FleetError::Inventory(_) | FleetError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(FleetError::Precondition("no key".into()).is_fatal());
        assert!(FleetError::Inventory("boom".into()).is_fatal());
        assert!(!FleetError::Command {
            host: "h".into(),
            reason: "exit 1".into()
        }
        .is_fatal());
        assert!(!FleetError::Timeout {
            what: "attack".into(),
            after: Duration::from_secs(5)
        }
        .is_fatal());
    }

    #[test]
    fn test_connect_message_names_attempts() {
        let err = FleetError::Connect {
            host: "10.0.0.1".into(),
            attempts: 10,
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.1"));
        assert!(msg.contains("10 attempt(s)"));
    }

    #[test]
    fn test_handshake_message_inside_connect() {
        let attempt = FleetError::Handshake {
            host: "10.0.0.1".into(),
            reason: "Permission denied (publickey)".into(),
        };
        assert!(!attempt.is_fatal());

        let err = FleetError::Connect {
            host: "10.0.0.1".into(),
            attempts: 3,
            reason: attempt.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not connect to 10.0.0.1 after 3 attempt(s): \
             10.0.0.1 refused the session: Permission denied (publickey)"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = FleetError::Timeout {
            what: "fleet dispatch".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "fleet dispatch timed out after 30s");
    }

    #[test]
    fn test_timeout_message_below_one_second() {
        let err = FleetError::Timeout {
            what: "dispatch to h".into(),
            after: Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "dispatch to h timed out after 300ms");

        let err = FleetError::Timeout {
            what: "command on h".into(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "command on h timed out after 1500ms");
    }
}
