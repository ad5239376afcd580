#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use ::common::schemas::{NetworkStats, NodeStatus, NodeView, TransferRequest};
use controller::core::listener::{ListenerConfig, serve_node_protocol};
use controller::core::liveness::{LivenessConfig, LivenessVerifier};
use controller::core::monitor::{MembershipMonitor, MonitorConfig};
use controller::core::orchestrator::{OrchestratorConfig, TransferSummary};
use controller::core::routes::admin_router;
use controller::core::state::ControllerState;
use storage_node::client::register;
use storage_node::fault_injection::FaultInjector;
use storage_node::heartbeat::heartbeat_loop;
use storage_node::probe::probe_responder;
use storage_node::state::NodeState;

pub struct TestController {
    pub state: ControllerState,
    pub monitor: MembershipMonitor,
    pub node_addr: SocketAddr,
    pub admin_url: String,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<Result<()>>>,
}

impl TestController {
    /// Long heartbeat interval: nodes stay `Active` for the length of a test without beating.
    pub async fn new() -> Result<Self> {
        Self::with_config(30_000, 100, 150, 2).await
    }

    pub async fn with_config(
        heartbeat_interval_ms: u64,
        sweep_ms: u64,
        probe_timeout_ms: u64,
        probe_retries: usize,
    ) -> Result<Self> {
        let state = ControllerState::new(OrchestratorConfig::default(), ListenerConfig::default());

        let liveness = LivenessConfig {
            timeout: Duration::from_millis(probe_timeout_ms),
            retries: probe_retries,
        };
        let mut monitor_config =
            MonitorConfig::new(Duration::from_millis(heartbeat_interval_ms), &liveness);
        monitor_config.sweep_interval = Duration::from_millis(sweep_ms);
        monitor_config.probe_grace =
            liveness.timeout * probe_retries as u32 + monitor_config.sweep_interval;

        let monitor = MembershipMonitor::new(
            state.registry.clone(),
            LivenessVerifier::new(liveness),
            monitor_config,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        handles.push(tokio::spawn(monitor.clone().run(shutdown_rx.clone())));

        let node_listener = TcpListener::bind("127.0.0.1:0").await?;
        let node_addr = node_listener.local_addr()?;
        handles.push(tokio::spawn(serve_node_protocol(
            node_listener,
            state.clone(),
            shutdown_rx.clone(),
        )));

        let admin_listener = TcpListener::bind("127.0.0.1:0").await?;
        let admin_url = format!("http://{}", admin_listener.local_addr()?);
        let app = admin_router(state.clone());
        let mut server_shutdown = shutdown_rx;
        handles.push(tokio::spawn(async move {
            axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.wait_for(|stop| *stop).await;
                })
                .await
                .map_err(anyhow::Error::from)
        }));

        Ok(TestController {
            state,
            monitor,
            node_addr,
            admin_url,
            shutdown_tx,
            handles,
        })
    }

    pub fn node_addr(&self) -> String {
        self.node_addr.to_string()
    }

    pub fn url(&self) -> &str {
        &self.admin_url
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            handle.abort();
            let _ = handle.await;
        }
        Ok(())
    }
}

pub struct TestNode {
    pub state: NodeState,
    probe_handle: JoinHandle<Result<()>>,
    probe_shutdown: watch::Sender<bool>,
    heartbeat: Option<(watch::Sender<bool>, JoinHandle<Result<()>>)>,
}

impl TestNode {
    pub async fn new(
        controller: &TestController,
        node_id: &str,
        storage_gb: u64,
        bandwidth_mbps: u64,
    ) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let probe_port = socket.local_addr()?.port();

        let state = NodeState {
            node_id: node_id.to_string(),
            host: "127.0.0.1".to_string(),
            controller_addr: controller.node_addr(),
            controller_port: controller.node_addr.port(),
            probe_port,
            cpu: 4,
            memory_gb: 8,
            storage_gb,
            bandwidth_mbps,
            request_timeout: Duration::from_secs(2),
            reserved_storage_gb: Arc::new(AtomicU64::new(0)),
            fault_injector: Arc::new(FaultInjector::new()),
        };

        let (probe_shutdown, shutdown_rx) = watch::channel(false);
        let probe_handle = tokio::spawn(probe_responder(socket, state.clone(), shutdown_rx));

        Ok(TestNode {
            state,
            probe_handle,
            probe_shutdown,
            heartbeat: None,
        })
    }

    pub async fn register(&self) -> Result<()> {
        register(&self.state).await
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.state.fault_injector
    }

    pub fn start_heartbeat(&mut self, interval_ms: u64) {
        self.stop_heartbeat();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(heartbeat_loop(
            self.state.clone(),
            Duration::from_millis(interval_ms),
            rx,
        ));
        self.heartbeat = Some((tx, handle));
    }

    pub fn stop_heartbeat(&mut self) {
        if let Some((tx, handle)) = self.heartbeat.take() {
            let _ = tx.send(true);
            handle.abort();
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.stop_heartbeat();
        let _ = self.probe_shutdown.send(true);
        self.probe_handle.abort();
        let _ = self.probe_handle.await;
        Ok(())
    }
}

/// Registers `node_id` and returns the running node (no heartbeats yet).
pub async fn spawn_node(
    controller: &TestController,
    node_id: &str,
    storage_gb: u64,
    bandwidth_mbps: u64,
) -> Result<TestNode> {
    let node = TestNode::new(controller, node_id, storage_gb, bandwidth_mbps).await?;
    node.register().await?;
    Ok(node)
}

// Raw node-protocol exchange: one line out, one line back.
pub async fn send_line(addr: SocketAddr, line: &str) -> Result<serde_json::Value> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut reader = BufReader::new(stream);
    let mut answer = String::new();
    reader.read_line(&mut answer).await?;
    Ok(serde_json::from_str(&answer)?)
}

// HTTP client utilities
pub async fn list_nodes(client: &Client, admin_url: &str) -> Result<Vec<NodeView>> {
    let resp = client.get(format!("{}/admin/nodes", admin_url)).send().await?;
    if !resp.status().is_success() {
        anyhow::bail!("list_nodes failed: {}", resp.status());
    }
    Ok(resp.json().await?)
}

pub async fn node_status(client: &Client, admin_url: &str, node_id: &str) -> Result<NodeStatus> {
    list_nodes(client, admin_url)
        .await?
        .into_iter()
        .find(|n| n.node_id == node_id)
        .map(|n| n.status)
        .ok_or_else(|| anyhow::anyhow!("node {} not listed", node_id))
}

pub async fn get_stats(client: &Client, admin_url: &str) -> Result<NetworkStats> {
    let resp = client.get(format!("{}/admin/stats", admin_url)).send().await?;
    Ok(resp.error_for_status()?.json().await?)
}

pub async fn create_transfer(
    client: &Client,
    admin_url: &str,
    file_name: &str,
    size_mb: f64,
    replication_factor: usize,
) -> Result<(StatusCode, Option<TransferSummary>)> {
    let req = TransferRequest {
        file_name: file_name.to_string(),
        size_mb,
        replication_factor,
    };
    let resp = client
        .post(format!("{}/transfers", admin_url))
        .json(&req)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Ok((status, None));
    }
    Ok((status, Some(resp.json().await?)))
}

// Utility functions
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check_fn: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout_duration = Duration::from_millis(timeout_ms);

    loop {
        if check_fn().await? {
            return Ok(());
        }

        if start.elapsed() > timeout_duration {
            anyhow::bail!("wait_until timed out after {}ms", timeout_ms);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
