use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

use common::codec::{decode_response, encode};
use common::schemas::{NodeRequest, NodeResponse};

use crate::state::NodeState;

/// One request per connection: write a line, read the answer line.
pub async fn send_request(
    addr: &str,
    request: &NodeRequest,
    request_timeout: Duration,
) -> anyhow::Result<NodeResponse> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect to controller at {addr}"))?;

        let mut line = encode(request)?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut answer = String::new();
        if reader.read_line(&mut answer).await? == 0 {
            anyhow::bail!("controller closed the connection without answering");
        }

        Ok::<_, anyhow::Error>(decode_response(&answer)?)
    };

    timeout(request_timeout, exchange)
        .await
        .with_context(|| format!("controller at {addr} did not answer in {request_timeout:?}"))?
}

pub async fn register(state: &NodeState) -> anyhow::Result<()> {
    let request = NodeRequest::Register(state.registration());
    match send_request(&state.controller_addr, &request, state.request_timeout).await? {
        NodeResponse::Ok { .. } => {
            info!(
                node_id = %state.node_id,
                probe_port = state.probe_port,
                "registered with controller at {}",
                state.controller_addr
            );
            Ok(())
        }
        NodeResponse::Error { reason, .. } => anyhow::bail!("registration rejected: {reason}"),
    }
}
