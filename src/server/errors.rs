//! HTTP error responses: JSON bodies with a status derived from the
//! failing stage.

use crate::error::{Dng2PngError, UploadError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

/// Everything a handler can fail with. Bodies are JSON with a `message`
/// field; server errors add an `error` field with the underlying cause.
#[derive(ThisError, Debug)]
pub enum ApiError {
    /// Upload refused before conversion
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Requested output is missing, already cleaned up, or was never produced
    #[error("File not found.")]
    NotFound,

    /// Every decoder preset and the fallback failed
    #[error("Error occurred during DNG conversion.")]
    Conversion(#[source] Dng2PngError),

    /// rawloader could not read the upload
    #[error("Error occurred while reading DNG metadata.")]
    Inspect(#[source] Dng2PngError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upload(UploadError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conversion(_) | ApiError::Inspect(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Underlying cause for server errors, shown to the client for diagnostics.
    fn detail(&self) -> Option<String> {
        match self {
            ApiError::Upload(UploadError::Storage(e)) => Some(e.to_string()),
            ApiError::Conversion(e) | ApiError::Inspect(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.detail();

        if status.is_server_error() {
            tracing::error!("{}: {}", self, detail.as_deref().unwrap_or("-"));
        } else {
            tracing::debug!("Client error: {}", self);
        }

        let body = match detail {
            Some(error) => json!({ "message": self.to_string(), "error": error }),
            None => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Upload(UploadError::MissingFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Upload(UploadError::TooLarge { limit: 1 }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Upload(UploadError::EmptyFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conversion(Dng2PngError::Internal("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conversion_error_exposes_detail() {
        let e = ApiError::Conversion(Dng2PngError::ConversionFailed {
            primary: "p".into(),
            fallback: "f".into(),
        });
        let detail = e.detail().unwrap();
        assert!(detail.contains("p") && detail.contains("f"));
        assert_eq!(e.to_string(), "Error occurred during DNG conversion.");
    }
}
