//! Bounded-retry connection and single-command execution.
//!
//! Freshly booted nodes take a while before their remote-execution service
//! answers, so connecting is retried with a fixed delay. The loop is driven
//! by the attempt counter alone: it stops after `max_attempts` no matter
//! what the transport reports.

use super::{Session, Transport};
use crate::config::RemoteConfig;
use crate::error::FleetError;
use crate::models::NodeOutcome;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently to retry connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connection attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&RemoteConfig> for RetryPolicy {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            max_attempts: config.connect_attempts,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Runs one command on one host at a time. Cheap to clone; every fan-out
/// task gets its own copy.
#[derive(Clone)]
pub struct RemoteExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    command_timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy, command_timeout: Duration) -> Self {
        Self {
            transport,
            retry,
            command_timeout,
        }
    }

    /// Build an executor from the `[remote]` config section.
    pub fn from_config(transport: Arc<dyn Transport>, config: &RemoteConfig) -> Self {
        Self::new(
            transport,
            RetryPolicy::from(config),
            Duration::from_secs(config.command_timeout_secs),
        )
    }

    /// Connect to `host`, trying at most `max_attempts` times.
    pub async fn connect(&self, host: &str) -> Result<Box<dyn Session>, FleetError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay).await;
            }
            debug!("Connecting to {} (attempt {}/{})", host, attempt, attempts);

            match self.transport.connect(host).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    debug!("Attempt {} to reach {} failed: {}", attempt, host, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(FleetError::Connect {
            host: host.to_string(),
            attempts,
            reason: last_error,
        })
    }

    /// Run `command` on `host` and capture what it printed.
    ///
    /// Never fails outright: connection, command and timeout problems are
    /// recorded in the outcome's error list next to whatever output was
    /// captured. The session is closed on every path.
    pub async fn run(&self, host: &str, command: &str) -> NodeOutcome {
        let mut outcome = NodeOutcome::new(host);

        let mut session = match self.connect(host).await {
            Ok(session) => session,
            Err(e) => {
                warn!("{}", e);
                outcome.errors.push(e.to_string());
                return outcome;
            }
        };

        debug!("Running on {}: {}", host, command);
        match tokio::time::timeout(self.command_timeout, session.exec(command)).await {
            Ok(Ok(output)) => {
                if !output.success() {
                    let status = output
                        .status
                        .map(|code| format!("exit status {}", code))
                        .unwrap_or_else(|| "terminated by signal".to_string());
                    let stderr = output.stderr.trim();
                    let reason = if stderr.is_empty() {
                        status
                    } else {
                        format!("{}: {}", status, stderr)
                    };
                    outcome.errors.push(
                        FleetError::Command {
                            host: host.to_string(),
                            reason,
                        }
                        .to_string(),
                    );
                }
                outcome.output = output.stdout;
            }
            Ok(Err(e)) => outcome.errors.push(e.to_string()),
            Err(_) => outcome.errors.push(
                FleetError::Timeout {
                    what: format!("command on {}", host),
                    after: self.command_timeout,
                }
                .to_string(),
            ),
        }

        if let Err(e) = session.close().await {
            warn!("Failed to close session to {}: {}", host, e);
        }

        outcome
    }
}
