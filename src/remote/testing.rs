//! Scripted transports for tests.

use super::{CommandOutput, Session, Transport};
use crate::error::FleetError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted host behaves.
#[derive(Debug, Clone)]
pub enum HostScript {
    /// Refuse this many connection attempts, then behave like `then`.
    Refuse(u32, Box<HostScript>),
    /// Never accept a connection.
    Unreachable,
    /// Accept, then return this output after an optional delay.
    Reply {
        output: CommandOutput,
        delay: Duration,
    },
    /// Accept, then fail the exec call itself.
    Broken(String),
}

impl HostScript {
    pub fn ok(stdout: &str) -> Self {
        HostScript::Reply {
            output: CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status: Some(0),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn exit(stdout: &str, status: i32, stderr: &str) -> Self {
        HostScript::Reply {
            output: CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                status: Some(status),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn slow(stdout: &str, delay: Duration) -> Self {
        HostScript::Reply {
            output: CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status: Some(0),
            },
            delay,
        }
    }
}

/// A transport whose hosts follow fixed scripts.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, HostScript>,
    attempts: Mutex<HashMap<String, u32>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub commands: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str, script: HostScript) -> Self {
        self.scripts.insert(host.to_string(), script);
        self
    }

    /// Connection attempts made against `host` so far.
    pub fn attempts(&self, host: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, FleetError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(host.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let mut script = self
            .scripts
            .get(host)
            .cloned()
            .unwrap_or(HostScript::Unreachable);
        let mut refused_so_far = 0;
        while let HostScript::Refuse(n, then) = script {
            if attempt <= refused_so_far + n {
                return Err(FleetError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            refused_so_far += n;
            script = *then;
        }
        if let HostScript::Unreachable = script {
            return Err(FleetError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no route to host",
            )));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            host: host.to_string(),
            script,
            closed: self.closed.clone(),
            closes: AtomicU32::new(0),
            commands: self.commands.clone(),
        }))
    }
}

struct ScriptedSession {
    host: String,
    script: HostScript,
    closed: Arc<AtomicUsize>,
    closes: AtomicU32,
    commands: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, FleetError> {
        self.commands
            .lock()
            .unwrap()
            .push((self.host.clone(), command.to_string()));
        match &self.script {
            HostScript::Reply { output, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(output.clone())
            }
            HostScript::Broken(reason) => Err(FleetError::Command {
                host: self.host.clone(),
                reason: reason.clone(),
            }),
            HostScript::Refuse(..) | HostScript::Unreachable => unreachable!(),
        }
    }

    async fn close(&mut self) -> Result<(), FleetError> {
        if self.closes.fetch_add(1, Ordering::SeqCst) == 0 {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        // Sessions dropped without close (task aborted) still count as released.
        if self.closes.load(Ordering::SeqCst) == 0 {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
