use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tally_score::{ScoreError, VerifyError};
use tally_sync::PushError;
use tally_wallet::{InvalidWalletId, StoreError};

/// Every way a request can fail, rendered as `{"error":{"code","message"}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("malformed score header: {0}")]
    ScoreFormat(#[from] ScoreError),
    #[error("rejected score: {0}")]
    BadScore(VerifyError),
    #[error("insufficient score: {0}")]
    InsufficientScore(VerifyError),
    #[error(transparent)]
    WalletId(#[from] InvalidWalletId),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Push(PushError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ScoreFormat(_) | Self::BadScore(_) | Self::WalletId(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientScore(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Push(err) if err.is_rejection() => StatusCode::BAD_REQUEST,
            Self::Push(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::ScoreFormat(_) | Self::WalletId(_) => "FORMAT_ERROR",
            Self::BadScore(_) => "INVALID_SCORE",
            Self::InsufficientScore(_) => "INSUFFICIENT_SCORE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Push(PushError::Ledger(_)) => "INVALID_LEDGER",
            Self::Push(PushError::IdMismatch { .. }) => "ID_MISMATCH",
            Self::Push(PushError::Merge(_)) => "MERGE_CONFLICT",
            Self::Push(PushError::Store(_)) | Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        if err.is_policy() {
            Self::InsufficientScore(err)
        } else {
            Self::BadScore(err)
        }
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        Self::Push(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });
        (status, Json(body)).into_response()
    }
}
