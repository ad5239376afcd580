use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::core::listener::{ListenerConfig, serve_node_protocol};
use crate::core::liveness::{LivenessConfig, LivenessVerifier};
use crate::core::monitor::{MembershipMonitor, MonitorConfig};
use crate::core::orchestrator::OrchestratorConfig;
use crate::core::routes::admin_router;
use crate::core::state::ControllerState;

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Address for node registration and heartbeats (TCP, line-delimited JSON)
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Address for the admin HTTP API
    #[arg(long, default_value = "0.0.0.0:8081")]
    admin_listen: String,

    /// Expected heartbeat period of nodes
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    heartbeat_interval: Duration,

    /// How often the membership monitor sweeps (default: min(1s, heartbeat interval))
    #[arg(long, value_parser = humantime::parse_duration)]
    sweep_interval: Option<Duration>,

    /// Wait per liveness probe attempt
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    probe_timeout: Duration,

    /// Liveness probe attempts before a node is declared unreachable
    #[arg(long, default_value_t = 2)]
    probe_retries: usize,

    /// How long an unanswered probe may run before it counts as failed
    /// (default: probe timeout x retries + sweep interval)
    #[arg(long, value_parser = humantime::parse_duration)]
    probe_grace: Option<Duration>,

    /// Close node connections idle for this long
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    idle_timeout: Duration,

    /// Weight of normalised available storage in node scores
    #[arg(long, default_value_t = 0.5)]
    storage_weight: f64,

    /// Weight of normalised bandwidth in node scores
    #[arg(long, default_value_t = 0.5)]
    bandwidth_weight: f64,
}

impl ServeArgs {
    pub fn liveness_config(&self) -> LivenessConfig {
        LivenessConfig {
            timeout: self.probe_timeout,
            retries: self.probe_retries.max(1),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new(self.heartbeat_interval, &self.liveness_config());
        if let Some(sweep) = self.sweep_interval {
            config.sweep_interval = sweep;
        }
        config.probe_grace = self.probe_grace.unwrap_or(
            self.probe_timeout * self.probe_retries.max(1) as u32 + config.sweep_interval,
        );
        config
    }

    /// Rejects settings that would stall or crash the background loops.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage_weight < 0.0 || self.bandwidth_weight < 0.0 {
            anyhow::bail!("score weights must not be negative");
        }
        let durations = [
            ("--heartbeat-interval", Some(self.heartbeat_interval)),
            ("--sweep-interval", self.sweep_interval),
            ("--probe-timeout", Some(self.probe_timeout)),
            ("--idle-timeout", Some(self.idle_timeout)),
        ];
        for (flag, value) in durations {
            if value.is_some_and(|d| d.is_zero()) {
                anyhow::bail!("{flag} must be greater than zero");
            }
        }
        Ok(())
    }
}

pub async fn serve(serve_args: ServeArgs) -> anyhow::Result<()> {
    serve_args.validate()?;

    let state = ControllerState::new(
        OrchestratorConfig {
            storage_weight: serve_args.storage_weight,
            bandwidth_weight: serve_args.bandwidth_weight,
        },
        ListenerConfig {
            idle_timeout: serve_args.idle_timeout,
        },
    );

    let monitor_config = serve_args.monitor_config();
    info!(
        heartbeat_interval = ?monitor_config.heartbeat_interval,
        sweep_interval = ?monitor_config.sweep_interval,
        probe_grace = ?monitor_config.probe_grace,
        "membership monitor configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel::<bool>(false);

    // Spawn membership monitor
    let monitor = MembershipMonitor::new(
        state.registry.clone(),
        LivenessVerifier::new(serve_args.liveness_config()),
        monitor_config,
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx.clone()));

    let node_listener = TcpListener::bind(&serve_args.listen).await?;
    let listener_handle = tokio::spawn(serve_node_protocol(
        node_listener,
        state.clone(),
        shutdown_rx.clone(),
    ));

    let admin_listener = TcpListener::bind(&serve_args.admin_listen).await?;
    info!("admin API listening on {}", serve_args.admin_listen);

    let mut admin_shutdown = shutdown_rx;
    let server = axum::serve(admin_listener, admin_router(state)).with_graceful_shutdown(
        async move {
            let _ = admin_shutdown.wait_for(|stop| *stop).await;
        },
    );
    let server_handle = tokio::spawn(async move { server.await });

    // Graceful shutdown: ctrl+c
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    let _ = shutdown_tx.send(true);
    let _ = monitor_handle.await;
    let _ = listener_handle.await;
    server_handle.await??;

    Ok(())
}
