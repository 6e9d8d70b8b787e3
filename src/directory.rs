//! # Device Directory
//!
//! Lists printers already bonded with this host, for a picker UI.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::address::PrinterAddress;
use crate::transport::BluetoothAdapter;

/// Name shown for devices that do not report one.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// A bonded device as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairedDevice {
    pub name: String,
    pub address: PrinterAddress,
}

#[derive(Clone)]
pub struct DeviceDirectory {
    adapter: Arc<dyn BluetoothAdapter>,
}

impl DeviceDirectory {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>) -> Self {
        Self { adapter }
    }

    /// Bonded devices, or an empty list when the host cannot tell.
    ///
    /// Missing permission and adapter failures are soft: they are logged and
    /// yield no devices rather than an error.
    pub fn list_paired(&self) -> Vec<PairedDevice> {
        if !self.adapter.has_connect_permission() {
            debug!("No Bluetooth permission, listing no devices");
            return Vec::new();
        }
        match self.adapter.bonded_devices() {
            Ok(devices) => devices
                .into_iter()
                .map(|d| PairedDevice {
                    name: d.name.unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
                    address: d.address,
                })
                .collect(),
            Err(e) => {
                warn!("Failed to list paired devices: {}", e);
                Vec::new()
            }
        }
    }
}
