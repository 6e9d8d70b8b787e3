//! # Mock Adapter
//!
//! In-memory [`BluetoothAdapter`] for tests and dry runs. It records every
//! socket, connection and write call so tests can assert on exact traffic.
//!
//! Clones share state: keep one clone in the test, hand the other to the
//! bridge.
//!
//! ```
//! use std::sync::Arc;
//! use estafeta::transport::mock::MockAdapter;
//! use estafeta::transport::{BluetoothAdapter, Security};
//!
//! let mock = MockAdapter::new()
//!     .with_bonded("00:11:22:33:44:55", "TSP100")
//!     .fail_secure_connect(1);
//! let adapter: Arc<dyn BluetoothAdapter> = Arc::new(mock.clone());
//! assert!(adapter.is_enabled());
//! assert_eq!(mock.sockets_created(), 0);
//! ```

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::address::PrinterAddress;
use crate::error::EstafetaError;

use super::{BluetoothAdapter, BondState, RemoteDevice, Security, SppSocket};

/// Failure budget meaning "every time".
pub const ALWAYS: u32 = u32::MAX;

#[derive(Debug, Default)]
struct Budget(u32);

impl Budget {
    /// Consume one failure, if any are left.
    fn take(&mut self) -> bool {
        match self.0 {
            0 => false,
            ALWAYS => true,
            _ => {
                self.0 -= 1;
                true
            }
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    permission: bool,
    enabled: bool,
    listing_fails: bool,
    devices: Vec<RemoteDevice>,

    secure_create: Budget,
    secure_connect: Budget,
    insecure_create: Budget,
    insecure_connect: Budget,
    write_failures: Budget,
    close_failures: Budget,
    connect_delay: Duration,
    query_delay: Duration,

    sockets_created: usize,
    sockets_closed: usize,
    connections: Vec<Security>,
    open: usize,
    max_open: usize,
    writes: Vec<(Security, Vec<u8>)>,
    discovery_cancels: usize,
}

/// # Mock Bluetooth Adapter
///
/// Starts with permission granted, the radio on and no known devices.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                permission: true,
                enabled: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn with_device(self, address: &str, name: Option<&str>, bond_state: BondState) -> Self {
        // Test setup error, not a runtime condition
        let address = PrinterAddress::parse(address).expect("mock device address must be valid");
        self.state().devices.push(RemoteDevice {
            address,
            name: name.map(str::to_string),
            bond_state,
        });
        self
    }

    /// Add a bonded device.
    ///
    /// # Panics
    ///
    /// If `address` is not a valid MAC.
    pub fn with_bonded(self, address: &str, name: &str) -> Self {
        self.with_device(address, Some(name), BondState::Bonded)
    }

    /// Add a bonded device that reports no name.
    pub fn with_unnamed(self, address: &str) -> Self {
        self.with_device(address, None, BondState::Bonded)
    }

    /// Add a device the host knows but has not bonded with.
    pub fn with_unbonded(self, address: &str) -> Self {
        self.with_device(address, Some("Unpaired"), BondState::None)
    }

    pub fn deny_permission(self) -> Self {
        self.state().permission = false;
        self
    }

    pub fn disabled(self) -> Self {
        self.state().enabled = false;
        self
    }

    /// Make the bonded-device listing fail.
    pub fn fail_listing(self) -> Self {
        self.state().listing_fails = true;
        self
    }

    /// Fail the next `n` secure socket constructions ([`ALWAYS`] for all).
    pub fn fail_secure_create(self, n: u32) -> Self {
        self.state().secure_create = Budget(n);
        self
    }

    /// Fail the next `n` secure connects.
    pub fn fail_secure_connect(self, n: u32) -> Self {
        self.state().secure_connect = Budget(n);
        self
    }

    /// Fail the next `n` insecure socket constructions.
    pub fn fail_insecure_create(self, n: u32) -> Self {
        self.state().insecure_create = Budget(n);
        self
    }

    /// Fail the next `n` insecure connects.
    pub fn fail_insecure_connect(self, n: u32) -> Self {
        self.state().insecure_connect = Budget(n);
        self
    }

    /// Fail the next `n` write calls with a broken pipe.
    pub fn fail_writes(self, n: u32) -> Self {
        self.state().write_failures = Budget(n);
        self
    }

    /// Fail the next `n` socket closes. The socket is released anyway.
    pub fn fail_close(self, n: u32) -> Self {
        self.state().close_failures = Budget(n);
        self
    }

    /// Block every successful connect for `delay`.
    pub fn connect_delay(self, delay: Duration) -> Self {
        self.state().connect_delay = delay;
        self
    }

    /// Block the permission and power queries for `delay`, like a
    /// `bluetoothctl` waiting on a busy daemon.
    pub fn query_delay(self, delay: Duration) -> Self {
        self.state().query_delay = delay;
        self
    }

    fn slow_query(&self) {
        let delay = self.state().query_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    // ===== Observations =====

    pub fn sockets_created(&self) -> usize {
        self.state().sockets_created
    }

    /// Sockets created and never closed.
    pub fn unclosed_sockets(&self) -> usize {
        let state = self.state();
        state.sockets_created - state.sockets_closed
    }

    /// Security of each successful connect, in order.
    pub fn connections(&self) -> Vec<Security> {
        self.state().connections.clone()
    }

    /// Highest number of simultaneously connected sockets seen.
    pub fn max_concurrent(&self) -> usize {
        self.state().max_open
    }

    /// Every write call with the socket's security.
    pub fn writes(&self) -> Vec<(Security, Vec<u8>)> {
        self.state().writes.clone()
    }

    /// Sizes of individual write calls.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.state().writes.iter().map(|(_, b)| b.len()).collect()
    }

    /// All bytes written, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state()
            .writes
            .iter()
            .flat_map(|(_, b)| b.iter().copied())
            .collect()
    }

    /// Bytes written on sockets of one security level.
    pub fn written_on(&self, security: Security) -> Vec<u8> {
        self.state()
            .writes
            .iter()
            .filter(|(s, _)| *s == security)
            .flat_map(|(_, b)| b.iter().copied())
            .collect()
    }

    pub fn discovery_cancels(&self) -> usize {
        self.state().discovery_cancels
    }
}

impl BluetoothAdapter for MockAdapter {
    fn has_connect_permission(&self) -> bool {
        self.slow_query();
        self.state().permission
    }

    fn is_enabled(&self) -> bool {
        self.slow_query();
        self.state().enabled
    }

    fn cancel_discovery(&self) -> io::Result<()> {
        self.state().discovery_cancels += 1;
        Ok(())
    }

    fn remote_device(&self, address: &PrinterAddress) -> Option<RemoteDevice> {
        let key = address.device_key();
        self.state()
            .devices
            .iter()
            .find(|d| d.address.device_key() == key)
            .cloned()
    }

    fn bonded_devices(&self) -> Result<Vec<RemoteDevice>, EstafetaError> {
        let state = self.state();
        if state.listing_fails {
            return Err(EstafetaError::Transport("mock listing failure".into()));
        }
        Ok(state
            .devices
            .iter()
            .filter(|d| d.bond_state == BondState::Bonded)
            .cloned()
            .collect())
    }

    fn create_socket(
        &self,
        _device: &RemoteDevice,
        security: Security,
    ) -> io::Result<Box<dyn SppSocket>> {
        let mut state = self.state();
        let fail = match security {
            Security::Secure => state.secure_create.take(),
            Security::Insecure => state.insecure_create.take(),
        };
        if fail {
            return Err(io::Error::other(format!("{} socket unavailable", security)));
        }
        state.sockets_created += 1;
        Ok(Box::new(MockSocket {
            state: Arc::clone(&self.state),
            security,
            connected: false,
            closed: false,
        }))
    }
}

/// Socket handed out by [`MockAdapter`].
pub struct MockSocket {
    state: Arc<Mutex<MockState>>,
    security: Security,
    connected: bool,
    closed: bool,
}

impl MockSocket {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        }
        let security = self.security;
        let mut state = self.state();
        if state.write_failures.take() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        state.writes.push((security, buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"))
        }
    }
}

impl SppSocket for MockSocket {
    fn connect(&mut self) -> io::Result<()> {
        let delay = {
            let mut state = self.state();
            let fail = match self.security {
                Security::Secure => state.secure_connect.take(),
                Security::Insecure => state.insecure_connect.take(),
            };
            if fail {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{} connect refused", self.security),
                ));
            }
            state.open += 1;
            state.max_open = state.max_open.max(state.open);
            state.connections.push(self.security);
            state.connect_delay
        };
        self.connected = true;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let was_connected = std::mem::replace(&mut self.connected, false);
        let mut state = self.state();
        state.sockets_closed += 1;
        if was_connected {
            state.open -= 1;
        }
        if state.close_failures.take() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "close failed"));
        }
        Ok(())
    }
}
