//! Configuration file handling.
//!
//! This module handles loading `.gophers.toml` files and merging them with
//! command-line arguments. The resulting `Config` is built once per command
//! and handed to each component explicitly.

use crate::cli::{Args, Command};
use crate::error::FleetError;
use crate::models::Tag;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".gophers.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fleet provisioning settings.
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Readiness polling settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Remote execution settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Load generation settings.
    #[serde(default)]
    pub attack: AttackConfig,

    /// Fan-out settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Where and how nodes are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Machine image every node boots from.
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    /// Login user for remote sessions.
    #[serde(default = "default_login")]
    pub login: String,

    /// Key pair name; the private key is read from `~/.ssh/<key_name>.pem`.
    #[serde(default = "default_key_name")]
    pub key_name: String,

    /// Marker tag that identifies managed nodes.
    #[serde(default = "default_marker_key")]
    pub marker_key: String,

    #[serde(default = "default_marker_value")]
    pub marker_value: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            image: default_image(),
            instance_type: default_instance_type(),
            login: default_login(),
            key_name: default_key_name(),
            marker_key: default_marker_key(),
            marker_value: default_marker_value(),
        }
    }
}

impl FleetConfig {
    /// The tag every managed node carries.
    pub fn marker_tag(&self) -> Tag {
        Tag::new(&self.marker_key, &self.marker_value)
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_image() -> String {
    "ami-2bc99d42".to_string()
}

fn default_instance_type() -> String {
    "t1.micro".to_string()
}

fn default_login() -> String {
    "ubuntu".to_string()
}

fn default_key_name() -> String {
    "gophers".to_string()
}

fn default_marker_key() -> String {
    "gopher".to_string()
}

fn default_marker_value() -> String {
    "true".to_string()
}

/// How readiness polling behaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between inventory polls.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Give up waiting for pending nodes after this many seconds.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

fn default_poll_interval() -> u64 {
    3
}

fn default_max_wait() -> u64 {
    600
}

/// Remote session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection attempts per node before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Seconds to wait between connection attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Per-attempt handshake timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a single remote command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Command run on every node after provisioning.
    #[serde(default = "default_setup_command")]
    pub setup_command: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_attempts: default_connect_attempts(),
            retry_delay_secs: default_retry_delay(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            setup_command: default_setup_command(),
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    900
}

fn default_setup_command() -> String {
    "sudo apt-get install apache2-utils -y".to_string()
}

/// Load generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfig {
    /// Load generator binary on the nodes.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Requests per node.
    #[serde(default = "default_requests")]
    pub requests: u32,

    /// Concurrent requests per node.
    #[serde(default = "default_concurrent")]
    pub concurrent: u32,

    /// Extra flags passed through to the load generator.
    #[serde(default)]
    pub options: String,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            requests: default_requests(),
            concurrent: default_concurrent(),
            options: String::new(),
        }
    }
}

impl AttackConfig {
    /// Check the effective settings, after file values and flags are merged.
    /// `ab` refuses a concurrency above the request count.
    pub fn validate(&self) -> std::result::Result<(), FleetError> {
        if self.requests == 0 {
            return Err(FleetError::Precondition(
                "Requests must be at least 1".to_string(),
            ));
        }
        if self.concurrent == 0 {
            return Err(FleetError::Precondition(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrent > self.requests {
            return Err(FleetError::Precondition(format!(
                "Concurrency ({}) cannot be greater than the number of requests ({})",
                self.concurrent, self.requests
            )));
        }
        Ok(())
    }

    /// Build the command line each node runs against `url`.
    pub fn command_for(&self, url: &str) -> String {
        let mut parts = vec![
            self.tool.clone(),
            "-r".to_string(),
            format!("-n {}", self.requests),
            format!("-c {}", self.concurrent),
        ];
        if !self.options.trim().is_empty() {
            parts.push(self.options.trim().to_string());
        }
        parts.push(format!("\"{}\"", url));
        parts.join(" ")
    }
}

fn default_tool() -> String {
    "ab".to_string()
}

fn default_requests() -> u32 {
    5
}

fn default_concurrent() -> u32 {
    1
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for a whole fleet-wide operation, in seconds.
    #[serde(default = "default_fleet_deadline")]
    pub fleet_deadline_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fleet_deadline_secs: default_fleet_deadline(),
        }
    }
}

impl DispatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.fleet_deadline_secs)
    }
}

fn default_fleet_deadline() -> u64 {
    1800
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `.gophers.toml` from `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(DEFAULT_CONFIG_FILE);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref region) = args.region {
            self.fleet.region = region.clone();
        }
        if let Some(ref key) = args.key {
            self.fleet.key_name = key.clone();
        }
        if let Some(ref login) = args.login {
            self.fleet.login = login.clone();
        }

        match &args.command {
            Command::Up(up) => {
                if let Some(ref image) = up.image {
                    self.fleet.image = image.clone();
                }
                if let Some(ref instance_type) = up.instance_type {
                    self.fleet.instance_type = instance_type.clone();
                }
            }
            Command::Attack(attack) => {
                if let Some(requests) = attack.requests {
                    self.attack.requests = requests;
                }
                if let Some(concurrent) = attack.concurrent {
                    self.attack.concurrent = concurrent;
                }
                if let Some(ref options) = attack.options {
                    self.attack.options = options.clone();
                }
            }
            Command::Down | Command::Report | Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
