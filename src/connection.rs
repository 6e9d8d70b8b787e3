//! # Connection Manager
//!
//! Turns a printer address into an open SPP stream.
//!
//! ## Connection Tiers
//!
//! 1. Secure RFCOMM channel (authenticated, encrypted)
//! 2. Insecure channel, for printers that never finish the encryption
//!    handshake
//!
//! If the platform cannot even construct an insecure socket, a second secure
//! socket is used for tier 2.
//!
//! The manager never pairs. An unbonded device is reported as
//! [`EstafetaError::NotPaired`] so the user can pair it in system settings.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::address::PrinterAddress;
use crate::error::EstafetaError;
use crate::transport::{BluetoothAdapter, BondState, RemoteDevice, Security, SppSocket};

/// An open stream to one printer.
///
/// Owned by exactly one operation. Closed by [`Connection::close`] or, as a
/// backstop, on drop.
pub struct Connection {
    address: PrinterAddress,
    security: Security,
    socket: Option<Box<dyn SppSocket>>,
}

impl Connection {
    pub fn address(&self) -> &PrinterAddress {
        &self.address
    }

    /// Tier the link came up on.
    pub fn security(&self) -> Security {
        self.security
    }

    /// Close the stream. Errors are logged and otherwise ignored.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(mut socket) = self.socket.take()
            && let Err(e) = socket.close()
        {
            debug!(address = %self.address, "Close failed: {}", e);
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.socket.as_mut() {
            Some(socket) => socket.write(buf),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.socket.as_mut() {
            Some(socket) => socket.flush(),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed")),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("security", &self.security)
            .field("open", &self.socket.is_some())
            .finish()
    }
}

/// # Connection Manager
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Arc<dyn BluetoothAdapter>,
}

impl ConnectionManager {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>) -> Self {
        Self { adapter }
    }

    /// Open a connection. Blocks for as long as the platform's connect does.
    ///
    /// ## Errors
    ///
    /// - [`EstafetaError::DeviceNotFound`] if the adapter cannot resolve the address
    /// - [`EstafetaError::NotPaired`] if the device is not bonded
    /// - [`EstafetaError::ConnectionFailed`] if both tiers fail
    pub fn open(&self, address: &PrinterAddress) -> Result<Connection, EstafetaError> {
        // Connecting while an inquiry runs fails spuriously on many stacks
        if let Err(e) = self.adapter.cancel_discovery() {
            debug!("Could not cancel discovery: {}", e);
        }

        let device = self
            .adapter
            .remote_device(address)
            .ok_or_else(|| EstafetaError::DeviceNotFound(address.to_string()))?;
        if device.bond_state != BondState::Bonded {
            return Err(EstafetaError::NotPaired(address.to_string()));
        }

        match self.dial(&device, Security::Secure) {
            Ok(socket) => return Ok(self.opened(address, Security::Secure, socket)),
            Err(e) => warn!(%address, "Secure connect failed, trying insecure: {}", e),
        }

        let (security, mut socket) = match self.adapter.create_socket(&device, Security::Insecure)
        {
            Ok(socket) => (Security::Insecure, socket),
            Err(e) => {
                warn!(%address, "Insecure socket creation failed, falling back to secure: {}", e);
                let socket = self
                    .adapter
                    .create_socket(&device, Security::Secure)
                    .map_err(|source| connection_failed(address, source))?;
                (Security::Secure, socket)
            }
        };

        if let Err(e) = socket.connect() {
            if let Err(close_err) = socket.close() {
                debug!("Close after failed connect: {}", close_err);
            }
            return Err(connection_failed(address, e));
        }
        Ok(self.opened(address, security, socket))
    }

    /// Create and connect one socket, closing it again if the connect fails.
    fn dial(&self, device: &RemoteDevice, security: Security) -> io::Result<Box<dyn SppSocket>> {
        let mut socket = self.adapter.create_socket(device, security)?;
        if let Err(e) = socket.connect() {
            if let Err(close_err) = socket.close() {
                debug!("Close after failed connect: {}", close_err);
            }
            return Err(e);
        }
        Ok(socket)
    }

    fn opened(
        &self,
        address: &PrinterAddress,
        security: Security,
        socket: Box<dyn SppSocket>,
    ) -> Connection {
        info!(%address, %security, "Connected");
        Connection {
            address: address.clone(),
            security,
            socket: Some(socket),
        }
    }
}

fn connection_failed(address: &PrinterAddress, source: io::Error) -> EstafetaError {
    EstafetaError::ConnectionFailed {
        address: address.to_string(),
        source,
    }
}
