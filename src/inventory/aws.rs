//! Inventory backed by the `aws` command-line client.
//!
//! Each operation shells out to `aws ec2 ...` with JSON output and decodes
//! the reply with serde. Credentials and profiles are whatever the `aws`
//! client resolves from the environment.

use super::{Inventory, LaunchSpec};
use crate::error::FleetError;
use crate::models::{FleetSnapshot, Node, NodeState, StateFilter, Tag};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// EC2 inventory driven through the `aws` binary.
#[derive(Debug, Clone)]
pub struct AwsCliInventory {
    program: String,
    region: String,
}

impl AwsCliInventory {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
        }
    }

    /// Use a different client binary (e.g. a wrapper that injects credentials).
    #[allow(dead_code)] // Used by tests and wrappers
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run one `aws` invocation and return its standard output.
    async fn aws(&self, args: &[String]) -> Result<String, FleetError> {
        debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .arg("--region")
            .arg(&self.region)
            .arg("--output")
            .arg("json")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FleetError::Inventory(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FleetError::Inventory(format!(
                "{} {}: {}",
                self.program,
                args.get(1).map(String::as_str).unwrap_or(""),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Arguments for `describe-instances` restricted to the marker tag.
pub fn describe_args(marker: &Tag, filter: StateFilter) -> Vec<String> {
    let mut args = vec![
        "ec2".to_string(),
        "describe-instances".to_string(),
        "--filters".to_string(),
        format!("Name=tag:{},Values={}", marker.key, marker.value),
    ];
    if let StateFilter::State(state) = filter {
        args.push(format!("Name=instance-state-code,Values={}", state.code()));
    }
    args
}

/// Arguments for `create-tags`.
pub fn tag_args(ids: &[String], tags: &[Tag]) -> Vec<String> {
    let mut args = vec![
        "ec2".to_string(),
        "create-tags".to_string(),
        "--resources".to_string(),
    ];
    args.extend(ids.iter().cloned());
    args.push("--tags".to_string());
    args.extend(
        tags.iter()
            .map(|tag| format!("Key={},Value={}", tag.key, tag.value)),
    );
    args
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<AwsInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    #[serde(default)]
    instances: Vec<AwsInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsInstance {
    instance_id: String,
    #[serde(default)]
    public_dns_name: Option<String>,
    #[serde(default)]
    public_ip_address: Option<String>,
    state: AwsState,
    #[serde(default)]
    tags: Vec<AwsTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsState {
    code: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsTag {
    key: String,
    value: String,
}

impl From<AwsInstance> for Node {
    fn from(instance: AwsInstance) -> Self {
        let address = instance
            .public_dns_name
            .filter(|name| !name.is_empty())
            .or(instance.public_ip_address)
            .unwrap_or_default();

        Node {
            id: instance.instance_id,
            address,
            state: NodeState::from_code(instance.state.code),
            tags: instance
                .tags
                .into_iter()
                .map(|tag| (tag.key, tag.value))
                .collect(),
        }
    }
}

/// Decode `describe-instances` JSON into a snapshot.
pub fn parse_describe(json: &str) -> Result<FleetSnapshot, FleetError> {
    let output: DescribeInstancesOutput = serde_json::from_str(json)
        .map_err(|e| FleetError::Inventory(format!("unexpected describe-instances reply: {}", e)))?;

    Ok(output
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(Node::from)
        .collect())
}

/// Drop nodes the server-side filters should already have excluded.
pub fn retain_matching(
    mut nodes: FleetSnapshot,
    marker: &Tag,
    filter: StateFilter,
) -> FleetSnapshot {
    nodes.retain(|node| node.has_tag(marker) && filter.matches(node.state));
    nodes
}

/// Decode `run-instances` JSON into the new instance ids.
pub fn parse_run(json: &str) -> Result<Vec<String>, FleetError> {
    let output: RunInstancesOutput = serde_json::from_str(json)
        .map_err(|e| FleetError::Inventory(format!("unexpected run-instances reply: {}", e)))?;

    Ok(output
        .instances
        .into_iter()
        .map(|instance| instance.instance_id)
        .collect())
}

#[async_trait]
impl Inventory for AwsCliInventory {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, FleetError> {
        let args = vec![
            "ec2".to_string(),
            "run-instances".to_string(),
            "--image-id".to_string(),
            spec.image.clone(),
            "--instance-type".to_string(),
            spec.instance_type.clone(),
            "--key-name".to_string(),
            spec.key_name.clone(),
            "--count".to_string(),
            format!("{}:{}", spec.count, spec.count),
        ];
        let ids = parse_run(&self.aws(&args).await?)?;
        if ids.len() != spec.count {
            return Err(FleetError::Inventory(format!(
                "asked for {} instance(s) but {} were created",
                spec.count,
                ids.len()
            )));
        }
        Ok(ids)
    }

    async fn list(&self, marker: &Tag, filter: StateFilter) -> Result<FleetSnapshot, FleetError> {
        let nodes = parse_describe(&self.aws(&describe_args(marker, filter)).await?)?;
        Ok(retain_matching(nodes, marker, filter))
    }

    async fn tag(&self, ids: &[String], tags: &[Tag]) -> Result<(), FleetError> {
        if ids.is_empty() || tags.is_empty() {
            return Ok(());
        }
        self.aws(&tag_args(ids, tags)).await?;
        Ok(())
    }

    async fn terminate(&self, ids: &[String]) -> Result<(), FleetError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut args = vec![
            "ec2".to_string(),
            "terminate-instances".to_string(),
            "--instance-ids".to_string(),
        ];
        args.extend(ids.iter().cloned());
        self.aws(&args).await?;
        Ok(())
    }
}
