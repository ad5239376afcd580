use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use common::schemas::{ErrorCode, HeartbeatRequest, NodeRequest, NodeResponse};
use common::time_utils::utc_now_ms;

use crate::client::{register, send_request};
use crate::state::NodeState;

pub async fn heartbeat_loop(
    state: NodeState,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    if interval.is_zero() {
        anyhow::bail!("heartbeat interval must be greater than zero");
    }
    let mut tick = tokio::time::interval(interval);
    let mut backoff = interval;

    loop {
        tokio::select! {
            _ = tick.tick() => {},
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { break; }
            }
        }

        if state.fault_injector.should_drop_heartbeat() {
            debug!(node_id = %state.node_id, "heartbeat dropped");
            continue;
        }

        let hb = NodeRequest::Heartbeat(HeartbeatRequest {
            node_id: state.node_id.clone(),
            reserved_storage_gb: state.reserved_storage_gb(),
            cpu_load: Some(simulated_cpu_load()),
            timestamp: utc_now_ms() as f64,
        });

        match send_request(&state.controller_addr, &hb, state.request_timeout).await {
            Ok(NodeResponse::Ok {
                reserved_storage_gb,
                ..
            }) => {
                if let Some(gb) = reserved_storage_gb {
                    state.set_reserved_storage_gb(gb);
                }
                backoff = interval; // reset backoff on success
            }
            Ok(NodeResponse::Error {
                code: Some(ErrorCode::ReRegister | ErrorCode::UnknownNode),
                reason,
            }) => {
                warn!(node_id = %state.node_id, "heartbeat refused ({reason}), re-registering");
                match register(&state).await {
                    Ok(()) => backoff = interval,
                    Err(e) => warn!("re-registration failed: {e:#}"),
                }
            }
            Ok(NodeResponse::Error { reason, .. }) => {
                warn!("heartbeat rejected: {reason}");
            }
            Err(e) => {
                warn!("heartbeat error: {e:#}");
                backoff = (backoff.mul_f32(1.5)).min(Duration::from_secs(30));
            }
        }

        // simple backoff on repeated failures (cap at 30s)
        if backoff > interval {
            tokio::select! {
                _ = tokio::time::sleep(backoff - interval) => {},
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() { break; }
                }
            }
        }
    }

    info!("heartbeat loop stopped");

    Ok(())
}

/// Load figure reported alongside heartbeats. Informational only.
fn simulated_cpu_load() -> f64 {
    rand::random::<f64>()
}
