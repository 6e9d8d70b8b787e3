//! Print handlers.
//!
//! Binary payloads travel as base64 strings.

use axum::{Json, extract::State, response::Response};
use serde::Deserialize;
use std::sync::Arc;

use super::super::state::AppState;
use super::job_response;

#[derive(Debug, Deserialize)]
pub struct TextForm {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct PayloadForm {
    /// Base64-encoded command stream
    pub data: String,
}

/// POST /api/print/text - Framed UTF-8 text.
pub async fn text(State(state): State<Arc<AppState>>, Json(form): Json<TextForm>) -> Response {
    job_response(state.bridge.print(&form.text)).await
}

/// POST /api/print/raw - Command stream sent as is.
pub async fn raw(State(state): State<Arc<AppState>>, Json(form): Json<PayloadForm>) -> Response {
    job_response(state.bridge.print_base64(&form.data)).await
}

/// POST /api/print/alternative - Command stream with wake/init preamble.
pub async fn alternative(
    State(state): State<Arc<AppState>>,
    Json(form): Json<PayloadForm>,
) -> Response {
    job_response(state.bridge.print_alternative(&form.data)).await
}

/// POST /api/print/raster - Text printed as a bitmap.
pub async fn raster(State(state): State<Arc<AppState>>, Json(form): Json<TextForm>) -> Response {
    job_response(state.bridge.print_raster(&form.text)).await
}

/// POST /api/print/diagnostic - Fixed self test.
pub async fn diagnostic(State(state): State<Arc<AppState>>) -> Response {
    job_response(state.bridge.diagnostic_test()).await
}
