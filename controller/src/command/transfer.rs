use clap::Parser;

use common::schemas::TransferRequest;

use crate::core::orchestrator::{ChunkOutcome, TransferSummary};

#[derive(Parser, Debug, Clone)]
pub struct TransferArgs {
    /// Base URL of the controller admin API
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    admin_url: String,

    #[arg(long)]
    file_name: String,

    /// File size in MB (1 MB = 1024 * 1024 bytes)
    #[arg(long)]
    size_mb: f64,

    #[arg(long, default_value_t = 2)]
    replication: usize,

    /// Print every chunk, not only the ones that were not placed
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

pub async fn transfer(args: TransferArgs) -> anyhow::Result<()> {
    let req = TransferRequest {
        file_name: args.file_name,
        size_mb: args.size_mb,
        replication_factor: args.replication,
    };

    let url = format!("{}/transfers", args.admin_url.trim_end_matches('/'));
    let resp = reqwest::Client::new().post(url).json(&req).send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("transfer rejected ({status}): {body}");
    }
    let summary: TransferSummary = resp.json().await?;

    println!(
        "job {} {:?}: {} ({} bytes) x{}",
        summary.job_id,
        summary.status,
        summary.file_name,
        summary.size_bytes,
        summary.replication_factor
    );
    println!(
        "chunks: {} of {} placed, chunk size {} bytes, simulated {:.3}s",
        summary.placed_chunks,
        summary.total_chunks,
        summary.chunk_size_bytes,
        summary.total_simulated_seconds
    );

    for chunk in &summary.chunks {
        if args.verbose || chunk.outcome != ChunkOutcome::Placed {
            println!(
                "  #{:<5} {:>10} B  {:<22} [{}]  {:.3}s",
                chunk.index,
                chunk.chunk_size_bytes,
                format!("{:?}", chunk.outcome),
                chunk.replica_node_ids.join(", "),
                chunk.simulated_duration_seconds
            );
        }
    }

    Ok(())
}
