//! # BlueZ Adapter
//!
//! [`BluetoothAdapter`] for Linux hosts running BlueZ.
//!
//! Adapter and device state come from `bluetoothctl`; streams are raw
//! RFCOMM sockets ([`RfcommSocket`]).
//!
//! ## Bluetooth Setup (Linux)
//!
//! The printer must be paired at the OS level first. The bridge never
//! initiates pairing:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# scan on
//! # Note the printer's address, e.g. 00:11:62:XX:XX:XX
//! [bluetooth]# pair 00:11:62:XX:XX:XX
//! [bluetooth]# trust 00:11:62:XX:XX:XX
//! ```
//!
//! ## Commands Used
//!
//! | Query | Command | Parsed from |
//! |-------|---------|-------------|
//! | Power state | `bluetoothctl show` | `Powered: yes` |
//! | Device info | `bluetoothctl info <MAC>` | `Name:`, `Paired:`, `Bonded:` |
//! | Bonded list | `bluetoothctl devices Paired` | `Device <MAC> <name>` lines |
//! | Stop inquiry | `bluetoothctl scan off` | exit status only |
//!
//! Older BlueZ releases lack `devices Paired`; `paired-devices` is tried
//! when the first form yields nothing.

use std::io;
use std::process::Command;

use tracing::{debug, trace};

use crate::address::{self, PrinterAddress};
use crate::error::EstafetaError;

use super::rfcomm::{self, RfcommSocket};
use super::{BluetoothAdapter, BondState, RemoteDevice, Security, SppSocket};

/// Default control tool
pub const BLUETOOTHCTL: &str = "bluetoothctl";

/// # BlueZ Bluetooth Adapter
pub struct BluezAdapter {
    program: String,
    channel: u8,
}

impl BluezAdapter {
    /// Adapter dialing SPP on `channel`.
    pub fn new(channel: u8) -> Self {
        Self {
            program: BLUETOOTHCTL.to_string(),
            channel,
        }
    }

    /// Use a different `bluetoothctl` binary (e.g. a wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn run(&self, args: &[&str]) -> Result<String, EstafetaError> {
        trace!(program = %self.program, ?args, "Running");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                EstafetaError::Transport(format!("Failed to run '{}': {}", self.program, e))
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EstafetaError::Transport(format!(
                "'{} {}' failed: {}",
                self.program,
                args.join(" "),
                if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
            )));
        }
        Ok(stdout)
    }
}

impl BluetoothAdapter for BluezAdapter {
    fn has_connect_permission(&self) -> bool {
        match rfcomm::try_socket() {
            Ok(()) => true,
            Err(e) => {
                let denied = matches!(e.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES));
                if denied {
                    debug!("Bluetooth socket creation denied: {}", e);
                }
                !denied
            }
        }
    }

    fn is_enabled(&self) -> bool {
        match self.run(&["show"]) {
            Ok(out) => parse_powered(&out),
            Err(e) => {
                debug!("Adapter query failed: {}", e);
                false
            }
        }
    }

    fn cancel_discovery(&self) -> io::Result<()> {
        // Fails harmlessly when no inquiry is running
        self.run(&["scan", "off"])
            .map(drop)
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn remote_device(&self, address: &PrinterAddress) -> Option<RemoteDevice> {
        match self.run(&["info", address.as_str()]) {
            Ok(out) => parse_info(address, &out),
            Err(e) => {
                debug!(%address, "Device lookup failed: {}", e);
                None
            }
        }
    }

    fn bonded_devices(&self) -> Result<Vec<RemoteDevice>, EstafetaError> {
        let mut devices = self
            .run(&["devices", "Paired"])
            .map(|out| parse_device_list(&out))
            .unwrap_or_default();
        if devices.is_empty() {
            devices = parse_device_list(&self.run(&["paired-devices"])?);
        }
        Ok(devices)
    }

    fn create_socket(
        &self,
        device: &RemoteDevice,
        security: Security,
    ) -> io::Result<Box<dyn SppSocket>> {
        let socket = RfcommSocket::new(&device.address, self.channel, security)?;
        Ok(Box::new(socket))
    }
}

// ============================================================================
// OUTPUT PARSING
// ============================================================================

/// `Powered: yes` anywhere in `bluetoothctl show`.
pub fn parse_powered(output: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Powered:"))
        .any(|v| v.trim() == "yes")
}

/// Parse `bluetoothctl info <MAC>`.
///
/// Bond state uses `Bonded:` when present, else `Paired:` (BlueZ before 5.66
/// only reports the latter).
pub fn parse_info(address: &PrinterAddress, output: &str) -> Option<RemoteDevice> {
    if output.contains("not available") {
        return None;
    }
    let wanted = address.device_key();
    let header_found = output.lines().any(|line| {
        line.trim()
            .strip_prefix("Device ")
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|mac| mac.eq_ignore_ascii_case(&wanted))
    });
    if !header_found {
        return None;
    }

    let mut name = None;
    let mut alias = None;
    let mut paired = None;
    let mut bonded = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("Name:") {
            name = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("Alias:") {
            alias = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("Paired:") {
            paired = Some(v.trim() == "yes");
        } else if let Some(v) = line.strip_prefix("Bonded:") {
            bonded = Some(v.trim() == "yes");
        }
    }

    let bond_state = if bonded.or(paired).unwrap_or(false) {
        BondState::Bonded
    } else {
        BondState::None
    };

    Some(RemoteDevice {
        address: address.clone(),
        name: name.or(alias).filter(|n| !is_placeholder_name(n)),
        bond_state,
    })
}

/// Parse `Device <MAC> <name>` lines. Other lines are ignored.
pub fn parse_device_list(output: &str) -> Vec<RemoteDevice> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Device ")?;
            let (mac, name) = match rest.split_once(' ') {
                Some((mac, name)) => (mac, Some(name.trim())),
                None => (rest, None),
            };
            if !address::validate(mac) {
                return None;
            }
            let address = PrinterAddress::parse(mac).ok()?;
            Some(RemoteDevice {
                address,
                name: name
                    .filter(|n| !n.is_empty() && !is_placeholder_name(n))
                    .map(str::to_string),
                bond_state: BondState::Bonded,
            })
        })
        .collect()
}

/// BlueZ shows nameless devices as their address with dashes.
fn is_placeholder_name(name: &str) -> bool {
    address::validate(&name.replace('-', ":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_BONDED: &str = "Device 00:11:62:AA:BB:CC (public)
\tName: TSP100
\tAlias: TSP100
\tClass: 0x00040680
\tPaired: yes
\tBonded: yes
\tTrusted: yes
\tBlocked: no
\tConnected: no
\tUUID: Serial Port               (00001101-0000-1000-8000-00805f9b34fb)
";

    fn addr(s: &str) -> PrinterAddress {
        PrinterAddress::parse(s).unwrap()
    }

    #[test]
    fn test_parse_powered() {
        assert!(parse_powered("Controller 00:1A:7D:DA:71:13 (public)\n\tPowered: yes\n"));
        assert!(!parse_powered("Controller 00:1A:7D:DA:71:13 (public)\n\tPowered: no\n"));
        assert!(!parse_powered("No default controller available\n"));
    }

    #[test]
    fn test_parse_info_bonded() {
        let dev = parse_info(&addr("00:11:62:aa:bb:cc"), INFO_BONDED).unwrap();
        assert_eq!(dev.name.as_deref(), Some("TSP100"));
        assert_eq!(dev.bond_state, BondState::Bonded);
        // Keeps the caller's spelling
        assert_eq!(dev.address.as_str(), "00:11:62:aa:bb:cc");
    }

    #[test]
    fn test_parse_info_paired_only() {
        let out = "Device 00:11:22:33:44:55 (public)\n\tName: P\n\tPaired: yes\n";
        let dev = parse_info(&addr("00:11:22:33:44:55"), out).unwrap();
        assert_eq!(dev.bond_state, BondState::Bonded);
    }

    #[test]
    fn test_parse_info_not_bonded() {
        let out = "Device 00:11:22:33:44:55 (public)\n\tName: P\n\tPaired: no\n\tBonded: no\n";
        let dev = parse_info(&addr("00:11:22:33:44:55"), out).unwrap();
        assert_eq!(dev.bond_state, BondState::None);
    }

    #[test]
    fn test_parse_info_unknown_device() {
        let out = "Device 00:11:22:33:44:55 not available\n";
        assert!(parse_info(&addr("00:11:22:33:44:55"), out).is_none());
        assert!(parse_info(&addr("00:11:22:33:44:55"), "").is_none());
    }

    #[test]
    fn test_parse_info_placeholder_name() {
        let out = "Device 00:11:22:33:44:55 (public)\n\tAlias: 00-11-22-33-44-55\n\tPaired: yes\n";
        let dev = parse_info(&addr("00:11:22:33:44:55"), out).unwrap();
        assert_eq!(dev.name, None);
    }

    #[test]
    fn test_parse_device_list() {
        let out = "Device 00:11:62:AA:BB:CC TSP100\n\
                   Device 66:22:E8:01:02:03 MTP-II Printer\n\
                   Device 11:22:33:44:55:66 11-22-33-44-55-66\n\
                   [CHG] Controller 00:1A:7D:DA:71:13 Discovering: no\n\
                   Device garbage name\n";
        let devices = parse_device_list(out);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].address.as_str(), "00:11:62:AA:BB:CC");
        assert_eq!(devices[0].name.as_deref(), Some("TSP100"));
        assert_eq!(devices[1].name.as_deref(), Some("MTP-II Printer"));
        assert_eq!(devices[2].name, None);
        assert!(devices.iter().all(|d| d.bond_state == BondState::Bonded));
    }

    #[test]
    fn test_missing_tool_is_transport_error() {
        let adapter = BluezAdapter::new(1).with_program("/nonexistent/bluetoothctl");
        assert!(!adapter.is_enabled());
        assert!(adapter.remote_device(&addr("00:11:22:33:44:55")).is_none());
        assert!(matches!(
            adapter.bonded_devices(),
            Err(EstafetaError::Transport(_))
        ));
    }
}
