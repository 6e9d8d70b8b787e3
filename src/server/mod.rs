//! # HTTP Server for the Printer Bridge
//!
//! Exposes the bridge commands as a small JSON API, for web apps that cannot
//! reach Bluetooth themselves.
//!
//! ## Usage
//!
//! ```bash
//! estafeta serve --listen 127.0.0.1:8080
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/api/printer/address` | | `{"address": ...}` |
//! | PUT | `/api/printer/address` | `{"address"}` | `{"address": ...}` or 400 |
//! | DELETE | `/api/printer/address` | | 204 |
//! | GET | `/api/printer/devices` | | `[{"name", "address"}]` |
//! | POST | `/api/printer/connect` | `{"address"}` | 202 + job id |
//! | POST | `/api/printer/check` | | 202 + job id |
//! | POST | `/api/print/text` | `{"text"}` | 202 + job id |
//! | POST | `/api/print/raw` | `{"data"}` (base64) | 202 + job id |
//! | POST | `/api/print/alternative` | `{"data"}` (base64) | 202 + job id |
//! | POST | `/api/print/raster` | `{"text"}` | 202 + job id |
//! | POST | `/api/print/diagnostic` | | 202 + job id |
//! | GET | `/api/notifications` | | recent notifications |
//!
//! Jobs refused before launch (no printer configured, bad payload, ...)
//! answer with an error status right away instead of 202. Adapter checks
//! (permission, radio) run inside the job, so their refusals arrive on
//! `/api/notifications` like any other failure.

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::EstafetaError;

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Printer selection
        .route(
            "/api/printer/address",
            get(handlers::printer::get_address)
                .put(handlers::printer::set_address)
                .delete(handlers::printer::clear_address),
        )
        .route("/api/printer/devices", get(handlers::printer::devices))
        .route("/api/printer/connect", post(handlers::printer::connect))
        .route("/api/printer/check", post(handlers::printer::check))
        // Printing
        .route("/api/print/text", post(handlers::print::text))
        .route("/api/print/raw", post(handlers::print::raw))
        .route("/api/print/alternative", post(handlers::print::alternative))
        .route("/api/print/raster", post(handlers::print::raster))
        .route("/api/print/diagnostic", post(handlers::print::diagnostic))
        // Feedback
        .route("/api/notifications", get(handlers::printer::notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use estafeta::bridge::{NotificationLog, PrinterBridge};
/// use estafeta::printer::{BridgeSettings, ConfigStore, MemoryStore};
/// use estafeta::server::{serve, AppState, ServerConfig};
/// use estafeta::transport::BluezAdapter;
///
/// # async fn example() -> Result<(), estafeta::EstafetaError> {
/// let log = Arc::new(NotificationLog::default());
/// let bridge = PrinterBridge::new(
///     Arc::new(BluezAdapter::new(1)),
///     ConfigStore::new(MemoryStore::new()),
///     log.clone(),
///     BridgeSettings::default(),
/// );
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:8080".to_string(),
/// };
/// serve(AppState::new(config, bridge, log)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(state: AppState) -> Result<(), EstafetaError> {
    let listen_addr = state.config.listen_addr.clone();
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| {
            EstafetaError::Transport(format!("Failed to bind to {}: {}", listen_addr, e))
        })?;
    info!("Listening on http://{}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| EstafetaError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{NotificationLog, PrinterBridge};
    use crate::printer::{BridgeSettings, ConfigStore, MemoryStore};
    use crate::transport::mock::MockAdapter;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const MAC: &str = "00:11:22:33:44:55";

    fn app(mock: &MockAdapter) -> (Router, Arc<AppState>) {
        let log = Arc::new(NotificationLog::default());
        let bridge = PrinterBridge::new(
            Arc::new(mock.clone()),
            ConfigStore::new(MemoryStore::new()),
            log.clone(),
            BridgeSettings::without_delays(),
        );
        let config = ServerConfig {
            listen_addr: "127.0.0.1:0".into(),
        };
        let state = Arc::new(AppState::new(config, bridge, log));
        (router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_address_lifecycle() {
        let (app, _) = app(&MockAdapter::new());

        let (status, body) = call(&app, "GET", "/api/printer/address", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"address": null}));

        let (status, body) =
            call(&app, "PUT", "/api/printer/address", Some(json!({"address": MAC}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], MAC);

        let (status, _) =
            call(&app, "PUT", "/api/printer/address", Some(json!({"address": "AABBCCDDEEFF"})))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "DELETE", "/api/printer/address", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(&app, "GET", "/api/printer/address", None).await;
        assert_eq!(body["address"], Value::Null);
    }

    #[tokio::test]
    async fn test_devices() {
        let mock = MockAdapter::new().with_unnamed(MAC);
        let (app, _) = app(&mock);
        let (status, body) = call(&app, "GET", "/api/printer/devices", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"name": "Unknown", "address": MAC}]));
    }

    #[tokio::test]
    async fn test_print_without_printer_is_conflict() {
        let mock = MockAdapter::new();
        let (app, _) = app(&mock);
        let (status, body) = call(&app, "POST", "/api/print/text", Some(json!({"text": "Hi"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No printer configured");
        assert_eq!(mock.sockets_created(), 0);

        let (_, notes) = call(&app, "GET", "/api/notifications", None).await;
        assert_eq!(notes[0]["message"], "No printer configured");
        assert_eq!(notes[0]["job"], body["job"]);
    }

    #[tokio::test]
    async fn test_bad_base64_is_bad_request() {
        let mock = MockAdapter::new().with_bonded(MAC, "P");
        let (app, state) = app(&mock);
        state.bridge.set_address(MAC);
        let (status, _) = call(&app, "POST", "/api/print/raw", Some(json!({"data": "%%%"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_adapter_refusal_is_reported_as_notification() {
        let mock = MockAdapter::new().with_bonded(MAC, "P").disabled();
        let (app, state) = app(&mock);
        state.bridge.set_address(MAC);
        let (status, body) = call(&app, "POST", "/api/print/diagnostic", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        // The job settles in the background
        for _ in 0..100 {
            if !state.notifications.recent().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let (_, notes) = call(&app, "GET", "/api/notifications", None).await;
        assert_eq!(notes[0]["message"], "Bluetooth not available");
        assert_eq!(notes[0]["job"], body["job"]);
    }

    #[tokio::test]
    async fn test_print_is_accepted() {
        let mock = MockAdapter::new().with_bonded(MAC, "P");
        let (app, state) = app(&mock);
        state.bridge.set_address(MAC);
        let (status, body) =
            call(&app, "POST", "/api/print/raw", Some(json!({"data": "G0AbZAM="}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["success"], true);
        assert!(body["job"].is_string());
        assert!(body.get("error").is_none());
    }
}
