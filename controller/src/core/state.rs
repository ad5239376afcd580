use tokio::time::Instant;

use common::schemas::{NetworkStats, NodeView};

use crate::core::jobs::JobLog;
use crate::core::listener::ListenerConfig;
use crate::core::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::core::registry::Registry;
use crate::core::stats::ControllerStats;

#[derive(Clone)]
pub struct ControllerState {
    pub registry: Registry,
    pub orchestrator: Orchestrator,
    pub jobs: JobLog,
    pub stats: ControllerStats,
    pub listener: ListenerConfig,
}

impl ControllerState {
    pub fn new(orchestrator: OrchestratorConfig, listener: ListenerConfig) -> Self {
        let registry = Registry::new();
        let stats = ControllerStats::default();

        ControllerState {
            orchestrator: Orchestrator::new(registry.clone(), stats.clone(), orchestrator),
            registry,
            jobs: JobLog::default(),
            stats,
            listener,
        }
    }

    pub fn node_views(&self) -> Vec<NodeView> {
        let now = Instant::now();
        self.registry
            .snapshot()
            .iter()
            .map(|n| n.view(now))
            .collect()
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.stats.network_stats(&self.registry.snapshot())
    }
}
