use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::schemas::RegisterRequest;

use crate::fault_injection::FaultInjector;

#[derive(Clone)]
pub struct NodeState {
    pub node_id: String,
    /// Address advertised to the controller for probes.
    pub host: String,
    /// Controller node-protocol address, `host:port`.
    pub controller_addr: String,
    pub controller_port: u16,
    /// Actual bound UDP port of the probe responder.
    pub probe_port: u16,

    pub cpu: u32,
    pub memory_gb: u64,
    pub storage_gb: u64,
    pub bandwidth_mbps: u64,

    pub request_timeout: Duration,
    /// Reservation last acknowledged by the controller, in GB (as f64 bits). Echoed back in
    /// the next heartbeat.
    pub reserved_storage_gb: Arc<AtomicU64>,
    pub fault_injector: Arc<FaultInjector>,
}

impl NodeState {
    pub fn registration(&self) -> RegisterRequest {
        RegisterRequest {
            node_id: self.node_id.clone(),
            host: self.host.clone(),
            heartbeat_port: self.controller_port,
            probe_port: self.probe_port,
            cpu: self.cpu,
            memory_gb: self.memory_gb,
            storage_gb: self.storage_gb,
            bandwidth_mbps: self.bandwidth_mbps,
        }
    }

    pub fn reserved_storage_gb(&self) -> f64 {
        f64::from_bits(self.reserved_storage_gb.load(Ordering::Relaxed))
    }

    pub fn set_reserved_storage_gb(&self, gb: f64) {
        self.reserved_storage_gb
            .store(gb.max(0.0).to_bits(), Ordering::Relaxed);
    }
}
