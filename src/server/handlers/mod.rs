//! HTTP handlers for the server.

pub mod print;
pub mod printer;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::bridge::JobHandle;
use crate::error::EstafetaError;

/// Body of every job-launching endpoint.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub success: bool,
    pub job: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 202 for a launched job, an error status for one refused up front.
///
/// Launched jobs are not awaited; their outcome arrives on
/// `/api/notifications`.
pub async fn job_response(handle: JobHandle) -> Response {
    let job = handle.id();
    if !handle.is_rejected() {
        return (
            StatusCode::ACCEPTED,
            Json(JobResponse {
                success: true,
                job,
                error: None,
            }),
        )
            .into_response();
    }

    let error = match handle.wait().await {
        Err(e) => e,
        Ok(()) => EstafetaError::Task("rejected job reported success".into()),
    };
    (
        status_for(&error),
        Json(JobResponse {
            success: false,
            job,
            error: Some(error.to_string()),
        }),
    )
        .into_response()
}

/// Map a refusal to an HTTP status.
pub fn status_for(error: &EstafetaError) -> StatusCode {
    match error {
        EstafetaError::InvalidAddress(_) | EstafetaError::InvalidPayload(_) => {
            StatusCode::BAD_REQUEST
        }
        EstafetaError::NoPrinterConfigured => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// JSON error with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}
