//! Server state and configuration.

use std::sync::Arc;

use crate::bridge::{NotificationLog, PrinterBridge};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub bridge: PrinterBridge,
    /// Same log the bridge notifies into.
    pub notifications: Arc<NotificationLog>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        bridge: PrinterBridge,
        notifications: Arc<NotificationLog>,
    ) -> Self {
        Self {
            config,
            bridge,
            notifications,
        }
    }
}
