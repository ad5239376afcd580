use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::UdpSocket;
use tracing::info;

use common::telemetry::init_telemetry;

use storage_node::client::register;
use storage_node::fault_injection::FaultInjector;
use storage_node::heartbeat::heartbeat_loop;
use storage_node::probe::probe_responder;
use storage_node::state::NodeState;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[arg(long)]
    node_id: String,
    /// Controller node-protocol address
    #[arg(long, default_value = "127.0.0.1:8080")]
    controller: String,
    /// Address the controller should probe
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// UDP probe port (0 picks a free one)
    #[arg(long, default_value_t = 0)]
    probe_port: u16,
    #[arg(long, default_value_t = 4)]
    cpu: u32,
    /// Memory in GB
    #[arg(long, default_value_t = 8)]
    memory: u64,
    /// Storage in GB
    #[arg(long, default_value_t = 100)]
    storage: u64,
    /// Bandwidth in Mbps
    #[arg(long, default_value_t = 1000)]
    bandwidth: u64,
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    heartbeat_interval: Duration,
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,
    /// Probability of silently dropping each heartbeat (simulates a lossy network)
    #[arg(long, default_value_t = 0.0)]
    heartbeat_drop_prob: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("node");

    let args = Args::parse();
    if args.heartbeat_interval.is_zero() || args.request_timeout.is_zero() {
        anyhow::bail!("--heartbeat-interval and --request-timeout must be greater than zero");
    }

    let controller_port = args
        .controller
        .parse::<SocketAddr>()
        .map(|addr| addr.port())
        .or_else(|_| {
            args.controller
                .rsplit_once(':')
                .and_then(|(_, port)| port.parse::<u16>().ok())
                .context("--controller must be host:port")
        })?;

    let socket = UdpSocket::bind(("0.0.0.0", args.probe_port)).await?;
    let probe_port = socket.local_addr()?.port();

    let fault_injector = Arc::new(FaultInjector::new());
    fault_injector.set_heartbeat_drop_prob(args.heartbeat_drop_prob);

    let state = NodeState {
        node_id: args.node_id,
        host: args.host,
        controller_addr: args.controller,
        controller_port,
        probe_port,
        cpu: args.cpu,
        memory_gb: args.memory,
        storage_gb: args.storage,
        bandwidth_mbps: args.bandwidth,
        request_timeout: args.request_timeout,
        reserved_storage_gb: Arc::new(AtomicU64::new(0)),
        fault_injector,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel::<bool>(false);

    // Answer probes before announcing ourselves
    let probe_handle = tokio::spawn(probe_responder(socket, state.clone(), shutdown_rx.clone()));

    register(&state).await?;

    // Spawn heartbeat loop with shutdown signal
    let hb_handle = tokio::spawn(heartbeat_loop(
        state.clone(),
        args.heartbeat_interval,
        shutdown_rx,
    ));

    info!(node_id = %state.node_id, probe_port, "node running");

    // Graceful shutdown: ctrl+c
    tokio::signal::ctrl_c().await?;

    let _ = shutdown_tx.send(true);
    let _ = hb_handle.await;
    let _ = probe_handle.await;

    Ok(())
}
