//! # Printer Transport Layer
//!
//! Platform abstraction for Bluetooth SPP printers plus the paced writer.
//!
//! ## Available Backends
//!
//! - [`bluetooth`]: BlueZ on Linux (`bluetoothctl` + RFCOMM sockets)
//! - [`mock`]: In-memory adapter for tests
//!
//! ## Seams
//!
//! [`BluetoothAdapter`] covers everything the bridge asks of the local radio:
//! permission and power state, device resolution, the bonded-device list and
//! socket construction. [`SppSocket`] is the duplex stream the writer talks to.

pub mod bluetooth;
pub mod mock;
pub mod rfcomm;
pub mod writer;

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::address::PrinterAddress;
use crate::error::EstafetaError;

pub use bluetooth::BluezAdapter;
pub use writer::write_chunked;

/// Serial Port Profile service class UUID.
pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Link security requested for an RFCOMM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    /// Authenticated and encrypted (pairing-derived keys)
    Secure,
    /// No authentication requirement on the link
    Insecure,
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::Secure => f.write_str("secure"),
            Security::Insecure => f.write_str("insecure"),
        }
    }
}

/// Pairing state of a remote device as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

/// A device handle resolved by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    pub address: PrinterAddress,
    pub name: Option<String>,
    pub bond_state: BondState,
}

/// A duplex byte stream to a printer.
///
/// `connect` blocks until the link is up or the platform's own timeout fires.
pub trait SppSocket: Write + Send {
    fn connect(&mut self) -> io::Result<()>;

    /// Release the socket. Calling it twice must be harmless.
    fn close(&mut self) -> io::Result<()>;
}

/// The local Bluetooth radio.
pub trait BluetoothAdapter: Send + Sync {
    /// Whether this process may open Bluetooth connections at all.
    fn has_connect_permission(&self) -> bool;

    /// Whether the radio is present and powered.
    fn is_enabled(&self) -> bool;

    /// Stop an in-progress inquiry. Connecting during discovery fails
    /// spuriously on several stacks.
    fn cancel_discovery(&self) -> io::Result<()>;

    /// Resolve an address to a device, or `None` if the adapter does not
    /// know it.
    fn remote_device(&self, address: &PrinterAddress) -> Option<RemoteDevice>;

    /// Devices bonded with this host.
    fn bonded_devices(&self) -> Result<Vec<RemoteDevice>, EstafetaError>;

    /// Construct (but do not connect) an SPP socket to `device`.
    fn create_socket(
        &self,
        device: &RemoteDevice,
        security: Security,
    ) -> io::Result<Box<dyn SppSocket>>;
}
