//! Chunked, replicated placement of simulated file transfers.
//!
//! A plan ranks `Active` nodes by a weighted score over available storage and bandwidth,
//! reserves every replica in the registry, and derives a simulated duration from the slowest
//! replica. Nothing is moved; reservations stay held until the job is released.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use common::chunking::{chunk_layout, chunk_size_for};
use common::constants::MAX_TRANSFER_CHUNKS;
use common::time_utils::utc_now_ms;

use crate::core::node::NodeRecord;
use crate::core::registry::Registry;
use crate::core::stats::ControllerStats;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("replication factor must be at least 1")]
    InvalidReplicationFactor,
    #[error("file is empty")]
    EmptyFile,
    #[error("file name must not be empty")]
    EmptyFileName,
    #[error("file needs {0} chunks, at most {max} are allowed", max = MAX_TRANSFER_CHUNKS)]
    TooManyChunks(u64),
}

/// Score weights, applied after min-max normalisation across the eligible set.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub storage_weight: f64,
    pub bandwidth_weight: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            storage_weight: 0.5,
            bandwidth_weight: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkOutcome {
    Placed,
    InsufficientCapacity,
    InsufficientNodes,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChunkPlan {
    pub index: usize,
    pub chunk_size_bytes: u64,
    /// Distinct nodes, best score first.
    pub replica_node_ids: Vec<String>,
    pub simulated_duration_seconds: f64,
    pub outcome: ChunkOutcome,
    /// blake3 of `{job_id}-{index}`, hex. Stands in for a content digest.
    pub checksum: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferJob {
    pub job_id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
    pub replication_factor: usize,
    /// Nominal chunk size; the last chunk may be shorter.
    pub chunk_size_bytes: u64,
    pub chunks: Vec<ChunkPlan>,
    pub created_at_ms: i64,
}

impl TransferJob {
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks are transferred one after another.
    pub fn total_simulated_seconds(&self) -> f64 {
        self.chunks.iter().map(|c| c.simulated_duration_seconds).sum()
    }

    pub fn status(&self) -> JobStatus {
        if self.chunks.iter().all(|c| c.outcome == ChunkOutcome::Placed) {
            JobStatus::Success
        } else if self.chunks.iter().all(|c| c.replica_node_ids.is_empty()) {
            JobStatus::Failed
        } else {
            JobStatus::Partial
        }
    }

    /// Replica bytes this job holds across all nodes.
    pub fn placed_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .map(|c| c.chunk_size_bytes * c.replica_node_ids.len() as u64)
            .sum()
    }

    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            job_id: self.job_id,
            file_name: self.file_name.clone(),
            size_bytes: self.size_bytes,
            replication_factor: self.replication_factor,
            chunk_size_bytes: self.chunk_size_bytes,
            total_chunks: self.total_chunks(),
            placed_chunks: self
                .chunks
                .iter()
                .filter(|c| c.outcome == ChunkOutcome::Placed)
                .count(),
            total_simulated_seconds: self.total_simulated_seconds(),
            status: self.status(),
            chunks: self.chunks.clone(),
        }
    }
}

/// What a caller gets back for a transfer request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferSummary {
    pub job_id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
    pub replication_factor: usize,
    pub chunk_size_bytes: u64,
    pub total_chunks: usize,
    pub placed_chunks: usize,
    pub total_simulated_seconds: f64,
    pub status: JobStatus,
    pub chunks: Vec<ChunkPlan>,
}

#[derive(Clone, Debug)]
struct Candidate {
    node_id: String,
    available_bytes: u64,
    bandwidth_mbps: u64,
    score: f64,
}

fn chunk_checksum(job_id: Uuid, index: usize) -> String {
    blake3::hash(format!("{job_id}-{index}").as_bytes())
        .to_hex()
        .to_string()
}

fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        1.0
    }
}

/// Scores candidates and sorts them best first, ties broken by node id ascending.
fn rank(candidates: &mut [Candidate], config: &OrchestratorConfig) {
    let bounds = |values: &mut dyn Iterator<Item = f64>| {
        values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (storage_min, storage_max) =
        bounds(&mut candidates.iter().map(|c| c.available_bytes as f64));
    let (bw_min, bw_max) = bounds(&mut candidates.iter().map(|c| c.bandwidth_mbps as f64));

    for c in candidates.iter_mut() {
        c.score = config.storage_weight
            * normalize(c.available_bytes as f64, storage_min, storage_max)
            + config.bandwidth_weight * normalize(c.bandwidth_mbps as f64, bw_min, bw_max);
    }

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

/// Seconds to move `bytes` at `bandwidth_mbps` (decimal megabits).
pub fn simulated_seconds(bytes: u64, bandwidth_mbps: u64) -> f64 {
    if bandwidth_mbps == 0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (bandwidth_mbps as f64 * 1_000_000.0)
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Registry,
    stats: ControllerStats,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: Registry, stats: ControllerStats, config: OrchestratorConfig) -> Self {
        Orchestrator {
            registry,
            stats,
            config,
        }
    }

    /// Plans and reserves a transfer.
    ///
    /// Eligibility is fixed by one registry snapshot. Each chunk re-ranks that set against the
    /// capacity this job has already consumed. Reservations race with concurrent plans; a
    /// lost race falls through to the next candidate.
    #[tracing::instrument(name = "orchestrator.plan", skip(self), fields(job_id))]
    pub fn plan_transfer(
        &self,
        file_name: &str,
        size_bytes: u64,
        replication_factor: usize,
    ) -> Result<TransferJob, TransferError> {
        if file_name.trim().is_empty() {
            return Err(TransferError::EmptyFileName);
        }
        if size_bytes == 0 {
            return Err(TransferError::EmptyFile);
        }
        if replication_factor == 0 {
            return Err(TransferError::InvalidReplicationFactor);
        }

        let chunk_size = chunk_size_for(size_bytes);
        let total_chunks = size_bytes.div_ceil(chunk_size);
        if total_chunks > MAX_TRANSFER_CHUNKS {
            return Err(TransferError::TooManyChunks(total_chunks));
        }

        let job_id = Uuid::new_v4();
        tracing::Span::current().record("job_id", tracing::field::display(job_id));

        let mut candidates: Vec<Candidate> = self
            .registry
            .snapshot()
            .iter()
            .filter(|n| n.is_eligible())
            .map(|n: &NodeRecord| Candidate {
                node_id: n.node_id.clone(),
                available_bytes: n.available_storage_bytes(),
                bandwidth_mbps: n.declared_bandwidth_mbps,
                score: 0.0,
            })
            .collect();
        let eligible = candidates.len();
        let target = replication_factor.min(eligible);

        let mut chunks = Vec::new();
        for (index, chunk_bytes) in chunk_layout(size_bytes, chunk_size).into_iter().enumerate() {
            rank(&mut candidates, &self.config);

            let mut replicas = Vec::with_capacity(target);
            let mut slowest: Option<u64> = None;
            for c in candidates.iter_mut() {
                if replicas.len() == target {
                    break;
                }
                if c.available_bytes < chunk_bytes {
                    continue;
                }

                if self.registry.reserve(&c.node_id, chunk_bytes) {
                    c.available_bytes -= chunk_bytes;
                    slowest = Some(slowest.map_or(c.bandwidth_mbps, |s| s.min(c.bandwidth_mbps)));
                    replicas.push(c.node_id.clone());
                } else {
                    // Someone else took the space since the snapshot.
                    c.available_bytes = self.registry.available_bytes(&c.node_id).unwrap_or(0);
                    debug!(node_id = %c.node_id, index, "reservation lost to a concurrent plan");
                }
            }

            let outcome = if eligible == 0 {
                ChunkOutcome::InsufficientNodes
            } else if replicas.len() == replication_factor {
                ChunkOutcome::Placed
            } else if replicas.len() == eligible {
                ChunkOutcome::InsufficientNodes
            } else {
                ChunkOutcome::InsufficientCapacity
            };

            self.stats
                .record_placed(chunk_bytes * replicas.len() as u64);
            chunks.push(ChunkPlan {
                index,
                chunk_size_bytes: chunk_bytes,
                replica_node_ids: replicas,
                simulated_duration_seconds: slowest
                    .map_or(0.0, |bw| simulated_seconds(chunk_bytes, bw)),
                outcome,
                checksum: chunk_checksum(job_id, index),
            });
        }

        let job = TransferJob {
            job_id,
            file_name: file_name.to_string(),
            size_bytes,
            replication_factor,
            chunk_size_bytes: chunk_size,
            chunks,
            created_at_ms: utc_now_ms(),
        };

        info!(
            file_name,
            size_bytes,
            replication_factor,
            eligible,
            chunks = job.total_chunks(),
            status = ?job.status(),
            "transfer planned"
        );

        Ok(job)
    }

    /// Gives back every reservation the job holds. Returns the bytes actually released,
    /// which can be less than placed if a node re-registered with less storage.
    pub fn release(&self, job: &TransferJob) -> u64 {
        let mut released = 0;
        for chunk in &job.chunks {
            for node_id in &chunk.replica_node_ids {
                released += self.registry.release(node_id, chunk.chunk_size_bytes);
            }
        }
        self.stats.record_released(job.placed_bytes());

        info!(job_id = %job.job_id, released, "transfer released");

        released
    }
}
