//! Remote command execution on fleet nodes.
//!
//! The transport is abstracted behind [`Transport`] and [`Session`] so the
//! retry and capture logic in [`executor`] does not depend on how sessions
//! are actually opened.

pub mod executor;
pub mod keys;
pub mod ssh;
#[cfg(test)]
pub mod testing;

use crate::error::FleetError;
use async_trait::async_trait;

pub use executor::RemoteExecutor;
pub use keys::KeyFile;
pub use ssh::SshTransport;

/// What a finished remote command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the command wrote to standard output.
    pub stdout: String,
    /// Standard error, kept for error messages only.
    pub stderr: String,
    /// Exit status; `None` when the command was killed by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Opens authenticated sessions to hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Make a single connection attempt. Retrying is the caller's job.
    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, FleetError>;
}

/// An open session to one host.
#[async_trait]
pub trait Session: Send {
    /// Run one command to completion and capture its output.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, FleetError>;

    /// Release the session. Must be safe to call more than once.
    async fn close(&mut self) -> Result<(), FleetError>;
}
