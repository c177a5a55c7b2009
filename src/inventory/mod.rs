//! Cloud inventory: creating, listing, tagging and terminating nodes.
//!
//! The inventory service is the only source of truth for which nodes
//! exist. Every call is a network round trip that may fail; failures are
//! returned to the caller and never retried here.

pub mod aws;
#[cfg(test)]
pub mod memory;

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::models::{FleetSnapshot, StateFilter, Tag};
use async_trait::async_trait;

pub use aws::AwsCliInventory;

/// Parameters for creating a batch of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub count: usize,
    pub image: String,
    pub instance_type: String,
    pub key_name: String,
}

impl LaunchSpec {
    pub fn from_config(fleet: &FleetConfig, count: usize) -> Self {
        Self {
            count,
            image: fleet.image.clone(),
            instance_type: fleet.instance_type.clone(),
            key_name: fleet.key_name.clone(),
        }
    }
}

/// Operations consumed from the cloud inventory service.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Create `spec.count` nodes and return their ids.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, FleetError>;

    /// All nodes carrying `marker` whose state passes `filter`.
    async fn list(&self, marker: &Tag, filter: StateFilter) -> Result<FleetSnapshot, FleetError>;

    /// Attach `tags` to every node in `ids`.
    async fn tag(&self, ids: &[String], tags: &[Tag]) -> Result<(), FleetError>;

    /// Terminate every node in `ids`.
    async fn terminate(&self, ids: &[String]) -> Result<(), FleetError>;
}
