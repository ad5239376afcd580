use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Fault injection state for testing. Lets a live node look dead on one channel or both.
#[derive(Debug, Default)]
pub struct FaultInjector {
    // Heartbeats
    pub drop_heartbeats: AtomicBool,
    /// Probability in [0, 1] of silently skipping a heartbeat, stored as f64 bits.
    heartbeat_drop_prob: AtomicU64,

    // Probes
    pub mute_probes: AtomicBool,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_heartbeat_drop_prob(&self, prob: f64) {
        self.heartbeat_drop_prob
            .store(prob.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn heartbeat_drop_prob(&self) -> f64 {
        f64::from_bits(self.heartbeat_drop_prob.load(Ordering::Relaxed))
    }

    /// Check if the next heartbeat should be dropped
    pub fn should_drop_heartbeat(&self) -> bool {
        if self.drop_heartbeats.load(Ordering::Relaxed) {
            return true;
        }

        let prob = self.heartbeat_drop_prob();
        prob > 0.0 && rand::random::<f64>() < prob
    }

    /// Check if probe replies are muted
    pub fn should_mute_probe(&self) -> bool {
        self.mute_probes.load(Ordering::Relaxed)
    }

    /// Reset all fault injection flags
    pub fn reset(&self) {
        self.drop_heartbeats.store(false, Ordering::Relaxed);
        self.heartbeat_drop_prob.store(0, Ordering::Relaxed);
        self.mute_probes.store(false, Ordering::Relaxed);
    }
}
