//! Printer selection and reachability handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::address::PrinterAddress;
use crate::bridge::Notification;
use crate::directory::PairedDevice;

use super::super::state::AppState;
use super::{error_response, job_response};

#[derive(Debug, Deserialize)]
pub struct AddressForm {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct AddressBody {
    pub address: Option<PrinterAddress>,
}

/// GET /api/printer/address - The stored printer.
pub async fn get_address(State(state): State<Arc<AppState>>) -> Json<AddressBody> {
    Json(AddressBody {
        address: state.bridge.get_address(),
    })
}

/// PUT /api/printer/address - Store a printer without connecting.
pub async fn set_address(
    State(state): State<Arc<AppState>>,
    Json(form): Json<AddressForm>,
) -> Response {
    if !state.bridge.set_address(&form.address) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid MAC address");
    }
    Json(AddressBody {
        address: state.bridge.get_address(),
    })
    .into_response()
}

/// DELETE /api/printer/address - Forget the stored printer.
pub async fn clear_address(State(state): State<Arc<AppState>>) -> StatusCode {
    state.bridge.clear_address();
    StatusCode::NO_CONTENT
}

/// GET /api/printer/devices - Bonded devices.
pub async fn devices(State(state): State<Arc<AppState>>) -> Json<Vec<PairedDevice>> {
    // bluetoothctl is a blocking subprocess
    let bridge = state.bridge.clone();
    let devices = tokio::task::spawn_blocking(move || bridge.list_paired())
        .await
        .unwrap_or_default();
    Json(devices)
}

/// POST /api/printer/connect - Store, then connect and disconnect.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(form): Json<AddressForm>,
) -> Response {
    job_response(state.bridge.connect(&form.address)).await
}

/// POST /api/printer/check - Connect to the stored printer and disconnect.
pub async fn check(State(state): State<Arc<AppState>>) -> Response {
    job_response(state.bridge.check_connection()).await
}

/// GET /api/notifications - Recent notifications, oldest first.
pub async fn notifications(State(state): State<Arc<AppState>>) -> Json<Vec<Notification>> {
    Json(state.notifications.recent())
}
