use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::time::Instant;
use tracing::{info, warn};

use common::schemas::RegisterRequest;
use common::time_utils::utc_now_ms;

use crate::core::node::{NodeRecord, NodeStatus};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Registered,
    Refreshed,
    /// The node was `Unreachable` and came back through registration.
    Revived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Accepted,
    /// The heartbeat cancelled a suspicion.
    Revived,
    /// The node is `Unreachable`; nothing was updated.
    ReRegisterRequired,
}

/// The controller's membership table.
///
/// Every operation takes the table lock once, so mutations on a node are linearizable and
/// `snapshot` sees a consistent cut. The lock is never held across an await point. A poisoned
/// lock is recovered: records only hold plain counters and are never left half-updated.
#[derive(Clone, Default)]
pub struct Registry {
    nodes: Arc<RwLock<HashMap<String, NodeRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, NodeRecord>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, NodeRecord>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upsert(&self, req: &RegisterRequest, at: Instant) -> UpsertOutcome {
        let mut nodes = self.write();
        let fresh = NodeRecord::from_registration(req, at, utc_now_ms());

        let Some(existing) = nodes.get_mut(&req.node_id) else {
            info!(node_id = %req.node_id, storage_gb = req.storage_gb, "node registered");
            nodes.insert(req.node_id.clone(), fresh);
            return UpsertOutcome::Registered;
        };

        let previous = existing.status;
        let reserved = existing
            .reserved_storage_bytes
            .min(fresh.declared_storage_bytes());
        *existing = NodeRecord {
            reserved_storage_bytes: reserved,
            ..fresh
        };

        if previous == NodeStatus::Unreachable {
            info!(node_id = %req.node_id, "unreachable node re-registered, now ACTIVE");
            UpsertOutcome::Revived
        } else {
            info!(node_id = %req.node_id, %previous, "node re-registered");
            UpsertOutcome::Refreshed
        }
    }

    pub fn record_heartbeat(
        &self,
        node_id: &str,
        observed_reserved_gb: f64,
        cpu_load: Option<f64>,
        at: Instant,
    ) -> Result<HeartbeatOutcome, RegistryError> {
        let mut nodes = self.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_string()))?;

        if node.status == NodeStatus::Unreachable {
            return Ok(HeartbeatOutcome::ReRegisterRequired);
        }

        node.last_heartbeat_at = node.last_heartbeat_at.max(at);
        node.reported_reserved_gb = Some(observed_reserved_gb);
        node.reported_cpu_load = cpu_load;

        if node.status == NodeStatus::Suspect {
            node.status = NodeStatus::Active;
            info!(node_id, "heartbeat arrived, SUSPECT -> ACTIVE");
            return Ok(HeartbeatOutcome::Revived);
        }

        Ok(HeartbeatOutcome::Accepted)
    }

    /// Applies a status edge if it is legal from the node's current status.
    /// Returns whether the status changed.
    pub fn mark_status(&self, node_id: &str, status: NodeStatus) -> Result<bool, RegistryError> {
        let mut nodes = self.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_string()))?;

        Ok(apply_edge(node, status))
    }

    /// Like `mark_status`, but only if no heartbeat was accepted after `since`.
    /// Guards downgrades decided on a view that a concurrent heartbeat has made stale.
    pub fn mark_status_if_silent(
        &self,
        node_id: &str,
        status: NodeStatus,
        since: Instant,
    ) -> Result<bool, RegistryError> {
        let mut nodes = self.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::UnknownNode(node_id.to_string()))?;

        if node.last_heartbeat_at > since {
            return Ok(false);
        }

        Ok(apply_edge(node, status))
    }

    /// Reserves `bytes` on a node. Fails without any change if the node is unknown or lacks
    /// the available capacity.
    pub fn reserve(&self, node_id: &str, bytes: u64) -> bool {
        let mut nodes = self.write();
        let Some(node) = nodes.get_mut(node_id) else {
            return false;
        };

        if node.available_storage_bytes() < bytes {
            return false;
        }

        node.reserved_storage_bytes += bytes;
        true
    }

    /// Releases up to `bytes`, floored at zero. Returns how much was actually released.
    pub fn release(&self, node_id: &str, bytes: u64) -> u64 {
        let mut nodes = self.write();
        let Some(node) = nodes.get_mut(node_id) else {
            return 0;
        };

        let released = bytes.min(node.reserved_storage_bytes);
        node.reserved_storage_bytes -= released;
        released
    }

    pub fn available_bytes(&self, node_id: &str) -> Option<u64> {
        self.read()
            .get(node_id)
            .map(NodeRecord::available_storage_bytes)
    }

    pub fn get(&self, node_id: &str) -> Option<NodeRecord> {
        self.read().get(node_id).cloned()
    }

    /// Point-in-time copy of every record, ordered by node id.
    pub fn snapshot(&self) -> Vec<NodeRecord> {
        let mut records: Vec<NodeRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        records
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn apply_edge(node: &mut NodeRecord, status: NodeStatus) -> bool {
    if !node.status.can_transition_to(status) {
        return false;
    }

    let previous = node.status;
    node.status = status;
    match status {
        NodeStatus::Unreachable => warn!(node_id = %node.node_id, "{previous} -> {status}"),
        _ => info!(node_id = %node.node_id, "{previous} -> {status}"),
    }
    true
}
