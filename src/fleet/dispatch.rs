//! Fan-out of one command across every node of a fleet.
//!
//! Each node gets its own task. Tasks report through a channel and the
//! dispatcher waits for exactly one record per node, so a failing node
//! shows up as a record with errors instead of shrinking the result set.

use crate::error::FleetError;
use crate::models::{Node, NodeOutcome};
use crate::remote::RemoteExecutor;
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runs a per-node command on every node concurrently.
pub struct Dispatcher {
    executor: RemoteExecutor,
    deadline: Duration,
    progress: ProgressBar,
}

impl Dispatcher {
    /// `deadline` bounds the whole fan-out; nodes still running when it
    /// passes are abandoned and reported as timed out.
    pub fn new(executor: RemoteExecutor, deadline: Duration) -> Self {
        Self {
            executor,
            deadline,
            progress: ProgressBar::hidden(),
        }
    }

    /// Tick `progress` once per node that reports back.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run `command_for(node)` on every node and return one outcome per
    /// node, in the order of `nodes`.
    pub async fn run_across_fleet<F>(&self, nodes: &[Node], command_for: F) -> Vec<NodeOutcome>
    where
        F: Fn(&Node) -> String,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, NodeOutcome)>();
        let mut handles = Vec::with_capacity(nodes.len());

        self.progress.set_length(nodes.len() as u64);
        self.progress.set_position(0);
        info!("Dispatching to {} node(s)", nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            let tx = tx.clone();

            if node.address.is_empty() {
                let mut outcome = NodeOutcome::new(&node.id);
                outcome
                    .errors
                    .push(format!("node {} has no address yet", node.id));
                let _ = tx.send((index, outcome));
                continue;
            }

            let executor = self.executor.clone();
            let host = node.address.clone();
            let command = command_for(node);
            handles.push(tokio::spawn(async move {
                let outcome = executor.run(&host, &command).await;
                // The receiver is gone only after the deadline passed.
                let _ = tx.send((index, outcome));
            }));
        }
        drop(tx);

        let mut slots: Vec<Option<NodeOutcome>> = vec![None; nodes.len()];
        let mut received = 0;
        let mut timed_out = false;
        let deadline = tokio::time::Instant::now() + self.deadline;

        while received < nodes.len() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((index, outcome))) => {
                    debug!(
                        "{} reported ({} error(s))",
                        outcome.host,
                        outcome.errors.len()
                    );
                    slots[index] = Some(outcome);
                    received += 1;
                    self.progress.inc(1);
                }
                // Every sender dropped: the remaining tasks panicked.
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Fleet deadline passed with {} node(s) outstanding",
                        nodes.len() - received
                    );
                    timed_out = true;
                    break;
                }
            }
        }
        self.progress.finish();

        for handle in &handles {
            handle.abort();
        }
        // Wait for aborted tasks so their sessions are released before returning.
        futures::future::join_all(handles).await;

        slots
            .into_iter()
            .zip(nodes)
            .map(|(slot, node)| {
                slot.unwrap_or_else(|| {
                    let mut outcome = NodeOutcome::new(&node.address);
                    let reason = if timed_out {
                        FleetError::Timeout {
                            what: format!("dispatch to {}", node.address),
                            after: self.deadline,
                        }
                        .to_string()
                    } else {
                        format!("task for {} ended without reporting", node.address)
                    };
                    outcome.errors.push(reason);
                    outcome
                })
            })
            .collect()
    }
}
