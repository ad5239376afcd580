use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::liveness::{LivenessConfig, LivenessVerifier, ProbeOutcome};
use crate::core::node::{NodeRecord, NodeStatus};
use crate::core::registry::Registry;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Expected heartbeat period. Silence beyond it raises suspicion; beyond twice it, a
    /// failed probe makes the node unreachable.
    pub heartbeat_interval: Duration,
    pub sweep_interval: Duration,
    /// How long an unanswered probe may stay in flight before it counts as failed.
    pub probe_grace: Duration,
}

impl MonitorConfig {
    pub fn new(heartbeat_interval: Duration, liveness: &LivenessConfig) -> Self {
        let sweep_interval = heartbeat_interval.min(Duration::from_secs(1));
        MonitorConfig {
            heartbeat_interval,
            sweep_interval,
            probe_grace: liveness.timeout * liveness.retries.max(1) as u32 + sweep_interval,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig::new(Duration::from_secs(5), &LivenessConfig::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeRecord {
    pub started_at: Instant,
    pub finished: Option<(ProbeOutcome, Instant)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// `Suspect` back to `Active`.
    Revive,
    /// `Active` to `Suspect`, then probe.
    Suspect,
    Probe,
    Unreachable,
}

/// Decides what a sweep at `now` should do with one node.
///
/// Only a probe started at or after the node's last heartbeat says anything about the node's
/// current silence; older probes are disregarded.
pub fn assess(
    record: &NodeRecord,
    probe: Option<&ProbeRecord>,
    now: Instant,
    config: &MonitorConfig,
) -> Verdict {
    let interval = config.heartbeat_interval;
    let silence = now.saturating_duration_since(record.last_heartbeat_at);
    let probe = probe.filter(|p| p.started_at >= record.last_heartbeat_at);

    // A successful probe vouches for the node for one heartbeat interval.
    let vouched = matches!(
        probe.and_then(|p| p.finished),
        Some((ProbeOutcome::Alive, at)) if now.saturating_duration_since(at) <= interval
    );

    match record.status {
        NodeStatus::Unreachable => Verdict::Keep,
        NodeStatus::Active => {
            if silence <= interval || vouched {
                Verdict::Keep
            } else {
                Verdict::Suspect
            }
        }
        NodeStatus::Suspect => {
            if silence <= interval || vouched {
                return Verdict::Revive;
            }
            let overdue = silence > interval * 2;

            match probe {
                None => Verdict::Probe,
                Some(ProbeRecord {
                    finished: Some((ProbeOutcome::Alive, _)),
                    ..
                }) => Verdict::Probe,
                Some(ProbeRecord {
                    finished: Some((ProbeOutcome::Unreachable, _)),
                    ..
                }) => {
                    if overdue {
                        Verdict::Unreachable
                    } else {
                        Verdict::Keep
                    }
                }
                Some(ProbeRecord {
                    started_at,
                    finished: None,
                }) => {
                    if overdue && now.saturating_duration_since(*started_at) > config.probe_grace {
                        Verdict::Unreachable
                    } else {
                        Verdict::Keep
                    }
                }
            }
        }
    }
}

/// Background sweep over the registry that drives `ACTIVE <-> SUSPECT -> UNREACHABLE`.
#[derive(Clone)]
pub struct MembershipMonitor {
    registry: Registry,
    verifier: Arc<LivenessVerifier>,
    config: MonitorConfig,
    probes: Arc<Mutex<HashMap<String, ProbeRecord>>>,
}

impl MembershipMonitor {
    pub fn new(registry: Registry, verifier: LivenessVerifier, config: MonitorConfig) -> Self {
        MembershipMonitor {
            registry,
            verifier: Arc::new(verifier),
            config,
            probes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn probe_record(&self, node_id: &str) -> Option<ProbeRecord> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_id)
            .copied()
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        if self.config.sweep_interval.is_zero() || self.config.heartbeat_interval.is_zero() {
            anyhow::bail!("membership monitor intervals must be positive");
        }
        let mut tick = tokio::time::interval(self.config.sweep_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() { break; }
                }
            }

            self.sweep(Instant::now());
        }

        info!("membership monitor stopped");

        Ok(())
    }

    /// One pass over a registry snapshot. Probes are spawned, never awaited here.
    pub fn sweep(&self, now: Instant) {
        for record in self.registry.snapshot() {
            let probe = self.probe_record(&record.node_id);
            let verdict = assess(&record, probe.as_ref(), now, &self.config);
            if verdict != Verdict::Keep {
                debug!(node_id = %record.node_id, ?verdict, "sweep verdict");
            }

            let applied = match verdict {
                Verdict::Keep => Ok(false),
                Verdict::Revive => self.registry.mark_status(&record.node_id, NodeStatus::Active),
                Verdict::Suspect => match now.checked_sub(self.config.heartbeat_interval) {
                    Some(cutoff) => self
                        .registry
                        .mark_status_if_silent(&record.node_id, NodeStatus::Suspect, cutoff)
                        .inspect(|suspected| {
                            if *suspected {
                                self.launch_probe(&record);
                            }
                        }),
                    None => Ok(false),
                },
                Verdict::Probe => {
                    self.launch_probe(&record);
                    Ok(false)
                }
                Verdict::Unreachable => match probe {
                    Some(p) => self.registry.mark_status_if_silent(
                        &record.node_id,
                        NodeStatus::Unreachable,
                        p.started_at,
                    ),
                    None => Ok(false),
                },
            };

            if let Err(e) = applied {
                warn!(node_id = %record.node_id, "sweep could not apply {verdict:?}: {e}");
            }
        }
    }

    /// Starts a probe unless one that covers the node's current silence is still running.
    fn launch_probe(&self, record: &NodeRecord) {
        let started_at = Instant::now();
        {
            let mut probes = self.probes.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(current) = probes.get(&record.node_id)
                && current.finished.is_none()
                && current.started_at >= record.last_heartbeat_at
            {
                return;
            }
            probes.insert(
                record.node_id.clone(),
                ProbeRecord {
                    started_at,
                    finished: None,
                },
            );
        }

        let this = self.clone();
        let node_id = record.node_id.clone();
        let host = record.host.clone();
        let port = record.probe_port;

        tokio::spawn(async move {
            let outcome = this.verifier.probe(&node_id, &host, port).await;
            let finished_at = Instant::now();
            debug!(node_id = %node_id, ?outcome, "probe finished");

            {
                let mut probes = this.probes.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(current) = probes.get_mut(&node_id)
                    && current.started_at == started_at
                {
                    current.finished = Some((outcome, finished_at));
                }
            }

            // First of heartbeat or probe to arrive revives the node.
            if outcome == ProbeOutcome::Alive
                && let Ok(true) = this.registry.mark_status(&node_id, NodeStatus::Active)
            {
                debug!(node_id = %node_id, "revived by probe");
            }
        });
    }
}
