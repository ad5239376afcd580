use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info};

use common::codec::{decode_probe, encode_probe};
use common::constants::MAX_DATAGRAM_LEN;
use common::schemas::ProbeMessage;

use crate::state::NodeState;

/// Answers `PING` for this node with `PONG`. Pings addressed to another node id, and anything
/// that does not decode, are dropped.
pub async fn probe_responder(
    socket: UdpSocket,
    state: NodeState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let pong = encode_probe(&ProbeMessage::Pong {
        node_id: state.node_id.clone(),
    })?;
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    loop {
        let (len, from) = tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    debug!("probe socket error: {e}");
                    continue;
                }
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() { break; }
                continue;
            }
        };

        match decode_probe(&buf[..len]) {
            Ok(ProbeMessage::Ping { node_id }) if node_id == state.node_id => {}
            Ok(other) => {
                debug!(%from, "ignoring probe message {other:?}");
                continue;
            }
            Err(e) => {
                debug!(%from, "undecodable probe: {e}");
                continue;
            }
        }

        if state.fault_injector.should_mute_probe() {
            debug!(%from, "probe reply muted");
            continue;
        }

        if let Err(e) = socket.send_to(&pong, from).await {
            debug!(%from, "failed to answer probe: {e}");
        }
    }

    info!("probe responder stopped");

    Ok(())
}
