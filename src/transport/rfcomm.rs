//! # RFCOMM Sockets
//!
//! Raw `AF_BLUETOOTH` stream sockets speaking RFCOMM, the transport under the
//! Serial Port Profile.
//!
//! ## Link Security
//!
//! The secure/insecure split maps onto the kernel's `BT_SECURITY` option:
//!
//! | Variant | Level | Meaning |
//! |---------|-------|---------|
//! | Secure | `BT_SECURITY_MEDIUM` (2) | Authenticated link, encryption required |
//! | Insecure | `BT_SECURITY_LOW` (1) | No authentication requirement |
//!
//! Some thermal printers never complete the encryption handshake, which is
//! why the connection manager falls back to the insecure level.
//!
//! ## Address Byte Order
//!
//! `bdaddr_t` stores the address least significant octet first, so
//! `00:11:22:33:44:55` goes on the wire as `[0x55, 0x44, 0x33, 0x22, 0x11, 0x00]`.

use std::io::{self, Write};

use crate::address::PrinterAddress;

use super::{Security, SppSocket};

/// Address family for Bluetooth sockets
pub const AF_BLUETOOTH: i32 = 31;

/// RFCOMM protocol number
pub const BTPROTO_RFCOMM: i32 = 3;

/// Socket option level for Bluetooth options
pub const SOL_BLUETOOTH: i32 = 274;

/// Security level option
pub const BT_SECURITY: i32 = 4;

pub const BT_SECURITY_LOW: u8 = 1;
pub const BT_SECURITY_MEDIUM: u8 = 2;

/// Kernel security level for a socket variant.
pub fn security_level(security: Security) -> u8 {
    match security {
        Security::Secure => BT_SECURITY_MEDIUM,
        Security::Insecure => BT_SECURITY_LOW,
    }
}

/// `bdaddr_t` byte order for an address.
pub fn bdaddr(address: &PrinterAddress) -> [u8; 6] {
    let mut octets = address.octets();
    octets.reverse();
    octets
}

/// # RFCOMM Socket
///
/// Created with the security level applied; [`SppSocket::connect`] then
/// dials the printer's channel. Writes use `send(2)` with `MSG_NOSIGNAL` so a
/// dropped link surfaces as `EPIPE` instead of killing the process.
pub struct RfcommSocket {
    fd: Option<sys::Fd>,
    bdaddr: [u8; 6],
    channel: u8,
}

impl RfcommSocket {
    /// Create a socket for `address` on `channel` with the given security.
    ///
    /// ## Errors
    ///
    /// - `EAFNOSUPPORT` when the kernel has no Bluetooth support
    /// - `EPERM`/`EACCES` when the process may not use Bluetooth
    /// - `Unsupported` on platforms other than Linux
    pub fn new(address: &PrinterAddress, channel: u8, security: Security) -> io::Result<Self> {
        let fd = sys::socket()?;
        sys::set_security(&fd, security_level(security))?;
        Ok(Self {
            fd: Some(fd),
            bdaddr: bdaddr(address),
            channel,
        })
    }

    fn fd(&self) -> io::Result<&sys::Fd> {
        self.fd
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed"))
    }
}

impl Write for RfcommSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        sys::send(self.fd()?, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Unbuffered: every send goes straight to the kernel
        Ok(())
    }
}

impl SppSocket for RfcommSocket {
    fn connect(&mut self) -> io::Result<()> {
        sys::connect(self.fd()?, self.bdaddr, self.channel)
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the descriptor closes it
        self.fd.take();
        Ok(())
    }
}

/// Check whether this process may create Bluetooth sockets.
///
/// Returns the creation error, if any.
pub fn try_socket() -> io::Result<()> {
    sys::socket().map(drop)
}

#[cfg(target_os = "linux")]
mod sys {
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use super::{AF_BLUETOOTH, BT_SECURITY, BTPROTO_RFCOMM, SOL_BLUETOOTH};

    pub type Fd = OwnedFd;

    #[repr(C)]
    struct BtSecurity {
        level: u8,
        key_size: u8,
    }

    #[repr(C)]
    struct SockaddrRc {
        rc_family: libc::sa_family_t,
        rc_bdaddr: [u8; 6],
        rc_channel: u8,
    }

    pub fn socket() -> io::Result<OwnedFd> {
        let fd = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn set_security(fd: &OwnedFd, level: u8) -> io::Result<()> {
        let sec = BtSecurity { level, key_size: 0 };
        let result = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                SOL_BLUETOOTH,
                BT_SECURITY,
                &sec as *const BtSecurity as *const libc::c_void,
                mem::size_of::<BtSecurity>() as libc::socklen_t,
            )
        };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn connect(fd: &OwnedFd, bdaddr: [u8; 6], channel: u8) -> io::Result<()> {
        let addr = SockaddrRc {
            rc_family: AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: bdaddr,
            rc_channel: channel,
        };
        loop {
            let result = unsafe {
                libc::connect(
                    fd.as_raw_fd(),
                    &addr as *const SockaddrRc as *const libc::sockaddr,
                    mem::size_of::<SockaddrRc>() as libc::socklen_t,
                )
            };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn send(fd: &OwnedFd, buf: &[u8]) -> io::Result<usize> {
        let sent = unsafe {
            libc::send(
                fd.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                libc::MSG_NOSIGNAL,
            )
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;

    pub type Fd = ();

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "RFCOMM sockets are only supported on Linux",
        )
    }

    pub fn socket() -> io::Result<()> {
        Err(unsupported())
    }

    pub fn set_security(_fd: &(), _level: u8) -> io::Result<()> {
        Err(unsupported())
    }

    pub fn connect(_fd: &(), _bdaddr: [u8; 6], _channel: u8) -> io::Result<()> {
        Err(unsupported())
    }

    pub fn send(_fd: &(), _buf: &[u8]) -> io::Result<usize> {
        Err(unsupported())
    }
}
