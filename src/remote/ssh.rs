//! Remote sessions over the OpenSSH client.
//!
//! `connect` starts a background ControlMaster connection whose socket
//! lives in a private temporary directory. Commands are multiplexed over
//! that master, and `close` tells it to exit. Exit status 255 from `ssh`
//! means the client itself failed (unreachable host, rejected key).

use super::{CommandOutput, KeyFile, Session, Transport};
use crate::config::{FleetConfig, RemoteConfig};
use crate::error::FleetError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status `ssh` uses for its own failures.
const SSH_CLIENT_ERROR: i32 = 255;

/// Opens sessions with the system `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshTransport {
    program: String,
    login: String,
    key: KeyFile,
    port: u16,
    connect_timeout_secs: u64,
}

impl SshTransport {
    pub fn new(login: impl Into<String>, key: KeyFile, port: u16, connect_timeout_secs: u64) -> Self {
        Self {
            program: "ssh".to_string(),
            login: login.into(),
            key,
            port,
            connect_timeout_secs,
        }
    }

    pub fn from_config(fleet: &FleetConfig, remote: &RemoteConfig, key: KeyFile) -> Self {
        Self::new(&fleet.login, key, remote.port, remote.connect_timeout_secs)
    }

    /// Use a different client binary instead of `ssh` from `PATH`.
    #[allow(dead_code)] // Used by tests and wrappers
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Options shared by every invocation.
    fn base_args(&self) -> Vec<String> {
        vec![
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".into(),
            "ServerAliveInterval=30".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
            "-i".into(),
            self.key.path().to_string_lossy().into(),
            "-p".into(),
            self.port.to_string(),
        ]
    }

    fn destination(&self, host: &str) -> String {
        format!("{}@{}", self.login, host)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, FleetError> {
        let control_dir = tempfile::Builder::new().prefix("gophers-ssh").tempdir()?;
        let control_path = control_dir.path().join("ctl");
        let log_path = control_dir.path().join("connect.log");
        // The backgrounded master keeps its stderr open, so it goes to a
        // file instead of a pipe we would wait on forever.
        let log = std::fs::File::create(&log_path)?;

        let destination = self.destination(host);
        // An aborted connect must not leave a half-started master behind
        // whose control socket directory is already gone.
        let status = Command::new(&self.program)
            .args(self.base_args())
            .arg("-o")
            .arg("ControlMaster=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-f")
            .arg("-N")
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            let reason = std::fs::read_to_string(&log_path).unwrap_or_default();
            let reason = reason.trim();
            return Err(FleetError::Handshake {
                host: host.to_string(),
                reason: if reason.is_empty() {
                    format!("ssh exited with {}", status)
                } else {
                    reason.to_string()
                },
            });
        }

        debug!("Opened ssh master to {}", destination);
        Ok(Box::new(SshSession {
            program: self.program.clone(),
            host: host.to_string(),
            destination,
            control_path,
            control_dir: Some(control_dir),
            closed: false,
        }))
    }
}

/// One ControlMaster connection to a host.
struct SshSession {
    program: String,
    host: String,
    destination: String,
    control_path: PathBuf,
    /// Dropped after the master exits so the socket outlives it.
    control_dir: Option<TempDir>,
    closed: bool,
}

impl SshSession {
    fn control_args(&self) -> [String; 2] {
        ["-o".into(), format!("ControlPath={}", self.control_path.display())]
    }
}

#[async_trait]
impl Session for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, FleetError> {
        if self.closed {
            return Err(FleetError::Command {
                host: self.host.clone(),
                reason: "session already closed".to_string(),
            });
        }

        let output = Command::new(&self.program)
            .args(self.control_args())
            .args(["-o", "ControlMaster=no", "-o", "BatchMode=yes"])
            .arg(&self.destination)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.code() == Some(SSH_CLIENT_ERROR) && stdout.is_empty() {
            return Err(FleetError::Command {
                host: self.host.clone(),
                reason: format!("ssh session failed: {}", stderr.trim()),
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            status: output.status.code(),
        })
    }

    async fn close(&mut self) -> Result<(), FleetError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let status = Command::new(&self.program)
            .args(self.control_args())
            .args(["-O", "exit"])
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        drop(self.control_dir.take());

        if !status.success() {
            return Err(FleetError::Command {
                host: self.host.clone(),
                reason: format!("ssh master did not exit cleanly ({})", status),
            });
        }
        debug!("Closed ssh master to {}", self.destination);
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Reached when the owning task was aborted mid-command.
        let result = std::process::Command::new(&self.program)
            .args(self.control_args())
            .args(["-O", "exit"])
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = result {
            warn!("Could not stop ssh master for {}: {}", self.host, e);
        }
    }
}
