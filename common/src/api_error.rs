use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found: transfer {0}")]
    TransferNotFound(String),
    #[error("bad request: {0}")]
    InvalidTransfer(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match self {
            ApiError::TransferNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidTransfer(_) => StatusCode::BAD_REQUEST,
            ApiError::Any(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
