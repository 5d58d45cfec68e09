//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use trellis_core::Error as CoreError;

/// An error returned by an API handler; a thin status-mapping wrapper over
/// the core taxonomy.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CoreError);

/// Lift a store-level error into an API error.
pub(crate) fn store_err<E: Into<CoreError>>(e: E) -> ApiError {
  ApiError(e.into())
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      CoreError::Validation(_) => StatusCode::BAD_REQUEST,
      CoreError::MemberNotFound(_) | CoreError::SponsorNotFound(_) => {
        StatusCode::NOT_FOUND
      }
      CoreError::AlreadyPlaced(_)
      | CoreError::SlotTaken { .. }
      | CoreError::PlacementContention { .. } => StatusCode::CONFLICT,
      CoreError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
      CoreError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
      CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
      tracing::error!(error = %self.0, "request failed");
    }

    (status, Json(json!({ "error": self.0.to_string() }))).into_response()
  }
}
