//! # Error Types
//!
//! This module defines the error taxonomy used throughout the bridge.
//!
//! Every bridge operation catches these at its boundary and turns them into a
//! short notification, so the `Display` strings double as user-facing text.

use std::io;

use thiserror::Error;

/// Main error type for estafeta operations
#[derive(Debug, Error)]
pub enum EstafetaError {
    /// The Bluetooth connect capability is not granted to this process
    #[error("Bluetooth permission not granted")]
    PermissionDenied,

    /// Malformed hardware address, rejected before any I/O
    #[error("Invalid MAC address: {0:?}")]
    InvalidAddress(String),

    /// The operation needs a stored printer address and there is none
    #[error("No printer configured")]
    NoPrinterConfigured,

    /// Local radio is off or absent
    #[error("Bluetooth not available")]
    AdapterUnavailable,

    /// The adapter cannot resolve the address to a device
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device exists but is not bonded with this host
    #[error("Pair printer {0} in system settings")]
    NotPaired(String),

    /// Both secure and insecure channels failed
    #[error("Connection to {address} failed: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// I/O error in the middle of a payload
    #[error("Write failed at byte {offset} of {total}: {source}")]
    WriteFailed {
        offset: usize,
        total: usize,
        #[source]
        source: io::Error,
    },

    /// Payload could not be decoded or is empty
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Settings file could not be read or holds invalid values
    #[error("Settings error: {0}")]
    Settings(String),

    /// Platform plumbing failure (bluetoothctl, socket options)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A background task died before reporting
    #[error("Task error: {0}")]
    Task(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EstafetaError {
    /// Whether a fresh attempt could succeed without outside intervention.
    ///
    /// Only link-level failures qualify. Configuration, permission and
    /// pairing problems need the user to fix something first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EstafetaError::ConnectionFailed { .. } | EstafetaError::WriteFailed { .. }
        )
    }
}
