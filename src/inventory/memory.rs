//! In-memory inventory for tests.
//!
//! Launched nodes start pending and switch to running after a configurable
//! number of `list` calls, which is enough to drive the poller.

use super::{Inventory, LaunchSpec};
use crate::error::FleetError;
use crate::models::{FleetSnapshot, Node, NodeState, StateFilter, Tag};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

struct Entry {
    node: Node,
    /// Remaining list calls before a pending node boots.
    boots_in: usize,
}

#[derive(Default)]
pub struct MemoryInventory {
    entries: Mutex<Vec<Entry>>,
    /// Boot delays handed to launched nodes, in launch order. Missing
    /// entries boot immediately.
    boot_delays: Mutex<Vec<usize>>,
    pub fail_lists: AtomicBool,
    pub list_calls: Mutex<Vec<StateFilter>>,
    pub terminated: Mutex<Vec<String>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes launched from now on boot after the given numbers of polls.
    pub fn with_boot_delays(self, delays: Vec<usize>) -> Self {
        *self.boot_delays.lock().unwrap() = delays;
        self
    }

    /// Insert an existing node directly.
    pub fn insert(&self, node: Node) {
        self.entries.lock().unwrap().push(Entry { node, boots_in: 0 });
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.node.id == id)
            .map(|e| e.node.clone())
    }

    fn advance(entries: &mut [Entry]) {
        for entry in entries.iter_mut() {
            if entry.node.state == NodeState::Pending {
                if entry.boots_in == 0 {
                    entry.node.state = NodeState::Running;
                } else {
                    entry.boots_in -= 1;
                }
            }
        }
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<String>, FleetError> {
        let mut entries = self.entries.lock().unwrap();
        let mut delays = self.boot_delays.lock().unwrap();
        let mut ids = Vec::with_capacity(spec.count);

        for _ in 0..spec.count {
            let n = entries.len() + 1;
            let id = format!("i-{:04}", n);
            let boots_in = if delays.is_empty() { 0 } else { delays.remove(0) };
            entries.push(Entry {
                node: Node {
                    id: id.clone(),
                    address: format!("node-{}.test", n),
                    state: NodeState::Pending,
                    tags: BTreeMap::new(),
                },
                boots_in,
            });
            ids.push(id);
        }

        Ok(ids)
    }

    async fn list(&self, marker: &Tag, filter: StateFilter) -> Result<FleetSnapshot, FleetError> {
        self.list_calls.lock().unwrap().push(filter);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(FleetError::Inventory("describe-instances: throttled".into()));
        }

        let mut entries = self.entries.lock().unwrap();
        let snapshot = entries
            .iter()
            .map(|e| &e.node)
            .filter(|n| n.has_tag(marker) && filter.matches(n.state))
            .cloned()
            .collect();
        Self::advance(&mut entries);
        Ok(snapshot)
    }

    async fn tag(&self, ids: &[String], tags: &[Tag]) -> Result<(), FleetError> {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut().filter(|e| ids.contains(&e.node.id)) {
            for tag in tags {
                entry.node.tags.insert(tag.key.clone(), tag.value.clone());
            }
        }
        Ok(())
    }

    async fn terminate(&self, ids: &[String]) -> Result<(), FleetError> {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut().filter(|e| ids.contains(&e.node.id)) {
            entry.node.state = NodeState::Terminated;
        }
        self.terminated.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(count: usize) -> LaunchSpec {
        LaunchSpec {
            count,
            image: "ami-test".into(),
            instance_type: "t1.micro".into(),
            key_name: "gophers".into(),
        }
    }

    #[tokio::test]
    async fn test_tag_filter_round_trip() {
        let inventory = MemoryInventory::new();
        let marker = Tag::new("gopher", "true");

        let ids = inventory.launch(&spec(1)).await.unwrap();
        assert!(inventory.list(&marker, StateFilter::Any).await.unwrap().is_empty());

        inventory.tag(&ids, &[marker.clone()]).await.unwrap();
        let listed = inventory.list(&marker, StateFilter::Any).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, ids[0]);

        inventory.terminate(&ids).await.unwrap();
        let running = inventory.list(&marker, StateFilter::ready()).await.unwrap();
        assert!(running.is_empty());
    }

    #[tokio::test]
    async fn test_nodes_boot_after_delay() {
        let inventory = MemoryInventory::new().with_boot_delays(vec![1]);
        let marker = Tag::new("gopher", "true");
        let ids = inventory.launch(&spec(1)).await.unwrap();
        inventory.tag(&ids, &[marker.clone()]).await.unwrap();

        // First two polls see it pending, the third sees it running.
        for _ in 0..2 {
            let pending = inventory.list(&marker, StateFilter::pending()).await.unwrap();
            assert_eq!(pending.len(), 1);
        }
        let pending = inventory.list(&marker, StateFilter::pending()).await.unwrap();
        assert!(pending.is_empty());
    }
}
