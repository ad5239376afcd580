use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::schemas::NetworkStats;

use crate::core::node::{NodeRecord, NodeStatus};

/// Counters the registry does not track.
#[derive(Clone, Debug, Default)]
pub struct ControllerStats {
    connections: Arc<AtomicU64>,
    bytes_placed: Arc<AtomicU64>,
}

impl ControllerStats {
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_placed(&self, bytes: u64) {
        self.bytes_placed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_released(&self, bytes: u64) {
        let _ = self
            .bytes_placed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |placed| {
                Some(placed.saturating_sub(bytes))
            });
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn bytes_placed(&self) -> u64 {
        self.bytes_placed.load(Ordering::Relaxed)
    }

    pub fn network_stats(&self, snapshot: &[NodeRecord]) -> NetworkStats {
        let count = |status: NodeStatus| snapshot.iter().filter(|n| n.status == status).count();

        NetworkStats {
            total_nodes: snapshot.len(),
            active_nodes: count(NodeStatus::Active),
            suspect_nodes: count(NodeStatus::Suspect),
            unreachable_nodes: count(NodeStatus::Unreachable),
            total_connections: self.connections(),
            total_bytes_placed: self.bytes_placed(),
            total_storage_capacity_gb: snapshot.iter().map(|n| n.declared_storage_gb).sum(),
            available_storage_gb: snapshot.iter().map(NodeRecord::available_storage_gb).sum(),
            total_bandwidth_mbps: snapshot.iter().map(|n| n.declared_bandwidth_mbps).sum(),
        }
    }
}
