use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

use crate::rate_limit::Denial;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog file {} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("catalog file {} is unreadable: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

// Every way a like-api request can fail
#[derive(Error, Debug)]
pub enum LikeError {
    #[error("invalid app id")]
    InvalidAppId,
    #[error("missing hash verification")]
    MissingHash,
    #[error("hash verification failed, refresh the app catalog and retry")]
    HashMismatch,
    #[error("app id does not exist or is no longer listed")]
    UnknownApp,
    #[error("{0}")]
    Throttled(Denial),
    #[error("invalid {0} request")]
    InvalidAction(&'static str),
    #[error("unsupported request method")]
    MethodNotAllowed,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl LikeError {
    pub fn status(&self) -> StatusCode {
        match self {
            LikeError::InvalidAppId | LikeError::MissingHash | LikeError::InvalidAction(_) => {
                StatusCode::BAD_REQUEST
            }
            LikeError::HashMismatch => StatusCode::FORBIDDEN,
            LikeError::UnknownApp => StatusCode::NOT_FOUND,
            LikeError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            LikeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            LikeError::Store(_) | LikeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, LikeError::Store(_) | LikeError::Internal(_))
    }

    // Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            LikeError::InvalidAppId => "invalid_app_id",
            LikeError::MissingHash => "missing_hash",
            LikeError::HashMismatch => "hash_mismatch",
            LikeError::UnknownApp => "unknown_app",
            LikeError::Throttled(Denial::TooFrequent) => "too_frequent",
            LikeError::Throttled(Denial::LimitReached) => "limit_reached",
            LikeError::InvalidAction(_) => "invalid_action",
            LikeError::MethodNotAllowed => "method_not_allowed",
            LikeError::Store(_) | LikeError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for LikeError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match &self {
            // malformed requests and internal failures use the bare error shape
            LikeError::InvalidAppId | LikeError::InvalidAction(_) | LikeError::MethodNotAllowed => {
                json!({ "error": self.to_string() })
            }
            LikeError::Store(_) | LikeError::Internal(_) => {
                json!({ "error": "internal server error" })
            }
            _ => json!({ "success": false, "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
