use axum::{
    Router,
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use common::api_error::ApiError;
use common::constants::MB;
use common::schemas::{NetworkStats, NodeView, TransferRequest};

use crate::core::orchestrator::TransferSummary;
use crate::core::state::ControllerState;

pub fn admin_router(state: ControllerState) -> Router {
    Router::new()
        .route("/admin/nodes", get(list_nodes))
        .route("/admin/stats", get(network_stats))
        .route("/transfers", post(create_transfer))
        .route(
            "/transfers/{job_id}",
            get(get_transfer).delete(release_transfer),
        )
        .with_state(state)
}

// GET /admin/nodes
#[tracing::instrument(name = "controller.list_nodes", skip(ctx))]
pub async fn list_nodes(State(ctx): State<ControllerState>) -> Json<Vec<NodeView>> {
    Json(ctx.node_views())
}

// GET /admin/stats
#[tracing::instrument(name = "controller.stats", skip(ctx))]
pub async fn network_stats(State(ctx): State<ControllerState>) -> Json<NetworkStats> {
    Json(ctx.network_stats())
}

// POST /transfers
/// Plans a transfer, reserves its replicas and keeps the job for later release.
#[tracing::instrument(name = "controller.transfer", skip(ctx, req), fields(file_name = %req.file_name))]
pub async fn create_transfer(
    State(ctx): State<ControllerState>,
    Json(req): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferSummary>), ApiError> {
    let size_bytes = size_mb_to_bytes(req.size_mb)?;

    let job = ctx
        .orchestrator
        .plan_transfer(&req.file_name, size_bytes, req.replication_factor)
        .map_err(|e| ApiError::InvalidTransfer(e.to_string()))?;

    let summary = job.summary();
    ctx.jobs.insert(job);

    Ok((StatusCode::CREATED, Json(summary)))
}

// GET /transfers/{job_id}
#[tracing::instrument(name = "controller.get_transfer", skip(ctx))]
pub async fn get_transfer(
    Path(job_id): Path<String>,
    State(ctx): State<ControllerState>,
) -> Result<Json<TransferSummary>, ApiError> {
    let id = parse_job_id(&job_id)?;
    let job = ctx
        .jobs
        .get(&id)
        .ok_or(ApiError::TransferNotFound(job_id))?;

    Ok(Json(job.summary()))
}

// DELETE /transfers/{job_id}
/// Releases every reservation the job holds and forgets it.
#[tracing::instrument(name = "controller.release_transfer", skip(ctx))]
pub async fn release_transfer(
    Path(job_id): Path<String>,
    State(ctx): State<ControllerState>,
) -> Result<StatusCode, ApiError> {
    let id = parse_job_id(&job_id)?;
    let job = ctx
        .jobs
        .remove(&id)
        .ok_or(ApiError::TransferNotFound(job_id))?;

    ctx.orchestrator.release(&job);

    Ok(StatusCode::NO_CONTENT)
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::TransferNotFound(raw.to_string()))
}

fn size_mb_to_bytes(size_mb: f64) -> Result<u64, ApiError> {
    if !size_mb.is_finite() || size_mb <= 0.0 {
        return Err(ApiError::InvalidTransfer(format!(
            "size_mb must be a positive number, got {size_mb}"
        )));
    }

    let bytes = (size_mb * MB as f64).round();
    if bytes < 1.0 || bytes >= u64::MAX as f64 {
        return Err(ApiError::InvalidTransfer(format!(
            "size_mb out of range: {size_mb}"
        )));
    }

    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_conversion() {
        assert_eq!(size_mb_to_bytes(50.0).unwrap(), 50 * MB);
        assert_eq!(size_mb_to_bytes(0.5).unwrap(), MB / 2);
        assert!(size_mb_to_bytes(0.0).is_err());
        assert!(size_mb_to_bytes(-1.0).is_err());
        assert!(size_mb_to_bytes(f64::NAN).is_err());
        assert!(size_mb_to_bytes(1e-9).is_err());
    }
}
