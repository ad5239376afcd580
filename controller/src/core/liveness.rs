use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::anyhow;
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use common::codec::{decode_probe, encode_probe};
use common::constants::MAX_DATAGRAM_LEN;
use common::schemas::ProbeMessage;

#[derive(Clone, Debug)]
pub struct LivenessConfig {
    /// How long each attempt waits for a reply.
    pub timeout: Duration,
    /// Total attempts before the node is declared unreachable.
    pub retries: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        LivenessConfig {
            timeout: Duration::from_secs(1),
            retries: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive,
    Unreachable,
}

/// Checks a node over UDP, independently of its heartbeats.
#[derive(Clone, Debug, Default)]
pub struct LivenessVerifier {
    config: LivenessConfig,
}

impl LivenessVerifier {
    pub fn new(config: LivenessConfig) -> Self {
        LivenessVerifier { config }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Upper bound on how long `probe` can take, resolution aside.
    pub fn max_probe_time(&self) -> Duration {
        self.config.timeout * self.config.retries.max(1) as u32
    }

    /// Sends `PING` and waits for a `PONG` carrying the same node id. Anything else on the
    /// socket is ignored. Local failures (resolution, bind, send) count as unreachable.
    pub async fn probe(&self, node_id: &str, host: &str, port: u16) -> ProbeOutcome {
        match self.try_probe(node_id, host, port).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(node_id, host, port, "probe failed: {e:#}");
                ProbeOutcome::Unreachable
            }
        }
    }

    async fn try_probe(&self, node_id: &str, host: &str, port: u16) -> anyhow::Result<ProbeOutcome> {
        let target = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| anyhow!("no address for {host}:{port}"))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;

        let ping = encode_probe(&ProbeMessage::Ping {
            node_id: node_id.to_string(),
        })?;
        let mut buf = [0u8; MAX_DATAGRAM_LEN];

        for attempt in 1..=self.config.retries.max(1) {
            socket.send_to(&ping, target).await?;
            let deadline = Instant::now() + self.config.timeout;

            loop {
                let (len, _from) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                    Err(_elapsed) => break,
                    Ok(Err(e)) => {
                        debug!(node_id, attempt, "probe recv error: {e}");
                        break;
                    }
                    Ok(Ok(received)) => received,
                };

                match decode_probe(&buf[..len]) {
                    Ok(ProbeMessage::Pong { node_id: id }) if id == node_id => {
                        return Ok(ProbeOutcome::Alive);
                    }
                    _ => continue,
                }
            }

            debug!(node_id, attempt, "probe attempt got no reply");
        }

        Ok(ProbeOutcome::Unreachable)
    }
}
