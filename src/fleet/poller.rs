//! Polling the inventory until a freshly launched fleet is ready.

use crate::error::FleetError;
use crate::inventory::Inventory;
use crate::models::{FleetSnapshot, StateFilter, Tag};
use indicatif::ProgressBar;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Queries the inventory for marker-tagged nodes.
pub struct FleetPoller<'a> {
    inventory: &'a dyn Inventory,
    marker: Tag,
    progress: ProgressBar,
}

impl<'a> FleetPoller<'a> {
    pub fn new(inventory: &'a dyn Inventory, marker: Tag) -> Self {
        Self {
            inventory,
            marker,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report boot progress on `progress`; one tick per node that leaves
    /// the pending state.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// One inventory query for marker-tagged nodes passing `filter`.
    pub async fn poll(&self, filter: StateFilter) -> Result<FleetSnapshot, FleetError> {
        let nodes = self.inventory.list(&self.marker, filter).await?;
        debug!("Poll {:?} returned {} node(s)", filter, nodes.len());
        Ok(nodes)
    }

    /// Wait until no marker-tagged node is pending, then return the ready set.
    ///
    /// Polls every `interval`. Gives up with a timeout error once `max_wait`
    /// has passed with nodes still pending.
    pub async fn await_convergence(
        &self,
        interval: Duration,
        max_wait: Duration,
    ) -> Result<FleetSnapshot, FleetError> {
        let started = Instant::now();
        let mut pending = self.poll(StateFilter::pending()).await?.len();
        info!("Waiting for {} pending node(s) to boot", pending);

        self.progress.set_length(pending as u64);
        self.progress.set_position(0);

        while pending > 0 {
            if started.elapsed() >= max_wait {
                self.progress.abandon();
                return Err(FleetError::Timeout {
                    what: format!("waiting for {} pending node(s)", pending),
                    after: max_wait,
                });
            }

            tokio::time::sleep(interval).await;

            let still_pending = self.poll(StateFilter::pending()).await?.len();
            let booted = pending.saturating_sub(still_pending);
            if booted > 0 {
                debug!("{} node(s) left the pending state", booted);
                self.progress.inc(booted as u64);
            }
            pending = still_pending;
        }

        self.progress.finish();
        let mut ready = self.poll(StateFilter::ready()).await?;
        ready.retain(|node| node.state.is_ready());
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::memory::MemoryInventory;
    use crate::inventory::LaunchSpec;
    use std::sync::atomic::Ordering;

    const TICK: Duration = Duration::from_millis(1);

    async fn launched(delays: Vec<usize>) -> (MemoryInventory, Tag) {
        let marker = Tag::new("gopher", "true");
        let count = delays.len();
        let inventory = MemoryInventory::new().with_boot_delays(delays);
        let ids = inventory
            .launch(&LaunchSpec {
                count,
                image: "ami-test".into(),
                instance_type: "t1.micro".into(),
                key_name: "gophers".into(),
            })
            .await
            .unwrap();
        inventory.tag(&ids, &[marker.clone()]).await.unwrap();
        (inventory, marker)
    }

    #[tokio::test]
    async fn test_convergence_returns_ready_nodes() {
        let (inventory, marker) = launched(vec![0, 2, 4]).await;
        let progress = ProgressBar::hidden();
        let poller = FleetPoller::new(&inventory, marker).with_progress(progress.clone());

        let ready = poller
            .await_convergence(TICK, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(ready.len(), 3);
        assert!(ready.iter().all(|n| n.state.is_ready()));
        // One tick per node that left the pending set.
        assert_eq!(progress.position(), 3);
        assert_eq!(
            inventory.list_calls.lock().unwrap().last(),
            Some(&StateFilter::ready())
        );
    }

    #[tokio::test]
    async fn test_empty_fleet_converges_immediately() {
        let inventory = MemoryInventory::new();
        let poller = FleetPoller::new(&inventory, Tag::new("gopher", "true"));

        let ready = poller
            .await_convergence(Duration::from_secs(60), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(ready.is_empty());
        assert_eq!(inventory.list_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_convergence_gives_up_after_max_wait() {
        let (inventory, marker) = launched(vec![usize::MAX]).await;
        let poller = FleetPoller::new(&inventory, marker);

        let err = poller
            .await_convergence(TICK, Duration::from_millis(20))
            .await
            .unwrap_err();

        match err {
            FleetError::Timeout { what, .. } => assert!(what.contains("1 pending")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_inventory_failure_is_fatal() {
        let (inventory, marker) = launched(vec![0]).await;
        inventory.fail_lists.store(true, Ordering::SeqCst);
        let poller = FleetPoller::new(&inventory, marker);

        let err = poller.poll(StateFilter::Any).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_poll_only_sees_marked_nodes() {
        let (inventory, marker) = launched(vec![0]).await;
        inventory
            .launch(&LaunchSpec {
                count: 1,
                image: "ami-other".into(),
                instance_type: "t1.micro".into(),
                key_name: "other".into(),
            })
            .await
            .unwrap();
        let poller = FleetPoller::new(&inventory, marker);

        assert_eq!(poller.poll(StateFilter::Any).await.unwrap().len(), 1);
    }
}
