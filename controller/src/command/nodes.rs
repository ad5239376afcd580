use clap::Parser;

use common::schemas::{NetworkStats, NodeView};

#[derive(Parser, Debug, Clone)]
pub struct NodesArgs {
    /// Base URL of the controller admin API
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    admin_url: String,
}

pub async fn nodes(args: NodesArgs) -> anyhow::Result<()> {
    let base = args.admin_url.trim_end_matches('/');
    let client = reqwest::Client::new();

    let nodes: Vec<NodeView> = client
        .get(format!("{base}/admin/nodes"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let stats: NetworkStats = client
        .get(format!("{base}/admin/stats"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!(
        "{:<16} {:<12} {:>10} {:>12} {:>10} {:>10}",
        "NODE", "STATUS", "STORAGE_GB", "AVAILABLE_GB", "BW_MBPS", "HB_AGE_MS"
    );
    for n in &nodes {
        println!(
            "{:<16} {:<12} {:>10} {:>12.2} {:>10} {:>10}",
            n.node_id,
            n.status.to_string(),
            n.declared_storage_gb,
            n.available_storage_gb,
            n.declared_bandwidth_mbps,
            n.last_heartbeat_age_ms
        );
    }

    println!(
        "\n{} nodes ({} active, {} suspect, {} unreachable), {} connections, {} bytes placed",
        stats.total_nodes,
        stats.active_nodes,
        stats.suspect_nodes,
        stats.unreachable_nodes,
        stats.total_connections,
        stats.total_bytes_placed
    );
    println!(
        "capacity {} GB, available {:.2} GB, bandwidth {} Mbps",
        stats.total_storage_capacity_gb, stats.available_storage_gb, stats.total_bandwidth_mbps
    );

    Ok(())
}
