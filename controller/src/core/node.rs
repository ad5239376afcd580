use tokio::time::Instant;

use common::constants::GB;
use common::schemas::{NodeView, RegisterRequest};

pub use common::schemas::NodeStatus;

#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub node_id: String,
    pub host: String,
    pub heartbeat_port: u16,
    pub probe_port: u16,

    // Declared at registration, replaced on re-registration.
    pub declared_cpu: u32,
    pub declared_memory_gb: u64,
    pub declared_storage_gb: u64,
    pub declared_bandwidth_mbps: u64,

    /// Bytes held by placements. Never exceeds `declared_storage_bytes()`.
    pub reserved_storage_bytes: u64,

    // Last self-reported figures from heartbeats; informational only.
    pub reported_reserved_gb: Option<f64>,
    pub reported_cpu_load: Option<f64>,

    pub last_heartbeat_at: Instant,
    pub status: NodeStatus,
    pub registered_at: Instant,
    pub registered_at_ms: i64,
}

impl NodeRecord {
    pub fn from_registration(req: &RegisterRequest, at: Instant, at_ms: i64) -> Self {
        NodeRecord {
            node_id: req.node_id.clone(),
            host: req.host.clone(),
            heartbeat_port: req.heartbeat_port,
            probe_port: req.probe_port,
            declared_cpu: req.cpu,
            declared_memory_gb: req.memory_gb,
            declared_storage_gb: req.storage_gb,
            declared_bandwidth_mbps: req.bandwidth_mbps,
            reserved_storage_bytes: 0,
            reported_reserved_gb: None,
            reported_cpu_load: None,
            last_heartbeat_at: at,
            status: NodeStatus::Active,
            registered_at: at,
            registered_at_ms: at_ms,
        }
    }

    pub fn declared_storage_bytes(&self) -> u64 {
        self.declared_storage_gb.saturating_mul(GB)
    }

    pub fn available_storage_bytes(&self) -> u64 {
        self.declared_storage_bytes()
            .saturating_sub(self.reserved_storage_bytes)
    }

    pub fn available_storage_gb(&self) -> f64 {
        self.available_storage_bytes() as f64 / GB as f64
    }

    pub fn reserved_storage_gb(&self) -> f64 {
        self.reserved_storage_bytes as f64 / GB as f64
    }

    /// Only `Active` nodes take new placements; `Suspect` nodes keep what they hold.
    pub fn is_eligible(&self) -> bool {
        self.status == NodeStatus::Active
    }

    pub fn view(&self, now: Instant) -> NodeView {
        NodeView {
            node_id: self.node_id.clone(),
            host: self.host.clone(),
            heartbeat_port: self.heartbeat_port,
            probe_port: self.probe_port,
            status: self.status,
            cpu: self.declared_cpu,
            memory_gb: self.declared_memory_gb,
            declared_storage_gb: self.declared_storage_gb,
            declared_bandwidth_mbps: self.declared_bandwidth_mbps,
            reserved_storage_gb: self.reserved_storage_gb(),
            available_storage_gb: self.available_storage_gb(),
            last_heartbeat_age_ms: now
                .saturating_duration_since(self.last_heartbeat_at)
                .as_millis() as u64,
            registered_at_ms: self.registered_at_ms,
            reported_reserved_gb: self.reported_reserved_gb,
            reported_cpu_load: self.reported_cpu_load,
        }
    }
}
