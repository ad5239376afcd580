use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use common::codec::{decode_request, encode};
use common::constants::MAX_MESSAGE_LEN;
use common::error::ProtocolError;
use common::schemas::{ErrorCode, NodeRequest, NodeResponse};

use crate::core::registry::{HeartbeatOutcome, RegistryError};
use crate::core::state::ControllerState;

#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// A node connection with no complete line for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            idle_timeout: Duration::from_secs(5),
        }
    }
}

/// Accepts node connections until shutdown. Each connection runs on its own task.
pub async fn serve_node_protocol(
    listener: TcpListener,
    state: ControllerState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("node protocol listening on {}", listener.local_addr()?);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { break; }
                continue;
            }
        };

        match accepted {
            Ok((stream, peer)) => {
                state.stats.record_connection();
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, state).await {
                        debug!(%peer, "node connection closed: {e:#}");
                    }
                });
            }
            Err(e) => {
                error!("accept error: {e}");
            }
        }
    }

    info!("node protocol listener stopped");

    Ok(())
}

/// One JSON object per line in, one per line out, until EOF or the idle timeout.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: ControllerState,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    let limit = MAX_MESSAGE_LEN as u64 + 1;

    loop {
        buf.clear();
        let read = timeout(
            state.listener.idle_timeout,
            (&mut reader).take(limit).read_until(b'\n', &mut buf),
        )
        .await;

        let n = match read {
            Err(_) => {
                debug!(%peer, "idle connection closed");
                return Ok(());
            }
            Ok(res) => res?,
        };
        if n == 0 {
            return Ok(());
        }

        // An unterminated line at the limit cannot be resynchronised; answer and hang up.
        let oversized = buf.last() != Some(&b'\n') && buf.len() > MAX_MESSAGE_LEN;
        let response = if oversized {
            NodeResponse::error(
                ErrorCode::Protocol,
                ProtocolError::TooLarge(MAX_MESSAGE_LEN).to_string(),
            )
        } else {
            match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => dispatch(&state, line),
                Err(e) => {
                    warn!(%peer, "rejected node message: not utf-8");
                    NodeResponse::error(
                        ErrorCode::Protocol,
                        ProtocolError::Malformed(format!("invalid utf-8: {e}")).to_string(),
                    )
                }
            }
        };

        let mut out = encode(&response)?;
        out.push('\n');
        write_half.write_all(out.as_bytes()).await?;

        if oversized {
            return Ok(());
        }
    }
}

/// Decodes one line and applies it to the registry. Never fails: every problem becomes an
/// `ERROR` response and the registry is left untouched.
pub fn dispatch(state: &ControllerState, line: &str) -> NodeResponse {
    let request = match decode_request(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("rejected node message: {e}");
            return NodeResponse::error(ErrorCode::Protocol, e.to_string());
        }
    };

    match request {
        NodeRequest::Register(req) => {
            debug!(node_id = %req.node_id, "register");
            state.registry.upsert(&req, Instant::now());
            NodeResponse::ack()
        }
        NodeRequest::Heartbeat(hb) => {
            debug!(node_id = %hb.node_id, "heartbeat");
            match state.registry.record_heartbeat(
                &hb.node_id,
                hb.reserved_storage_gb,
                hb.cpu_load,
                Instant::now(),
            ) {
                Ok(HeartbeatOutcome::Accepted | HeartbeatOutcome::Revived) => {
                    let reserved = state
                        .registry
                        .get(&hb.node_id)
                        .map(|node| node.reserved_storage_gb())
                        .unwrap_or(0.0);
                    NodeResponse::heartbeat_ack(reserved)
                }
                Ok(HeartbeatOutcome::ReRegisterRequired) => NodeResponse::error(
                    ErrorCode::ReRegister,
                    format!("node {} is unreachable; re-register", hb.node_id),
                ),
                Err(e @ RegistryError::UnknownNode(_)) => {
                    warn!(node_id = %hb.node_id, "heartbeat from unregistered node");
                    NodeResponse::error(ErrorCode::UnknownNode, e.to_string())
                }
            }
        }
        NodeRequest::ListNodes {} => NodeResponse::Ok {
            nodes: Some(state.node_views()),
            stats: None,
            reserved_storage_gb: None,
        },
        NodeRequest::Stats {} => NodeResponse::Ok {
            nodes: None,
            stats: Some(state.network_stats()),
            reserved_storage_gb: None,
        },
    }
}
