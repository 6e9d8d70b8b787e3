//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders and job encoding for ESC/POS receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Init, mode reset, bold, feeds and cut
//! - [`graphics`]: 1-bit packing and the raster bit image command
//! - [`job`]: Print jobs and the write plans they encode to
//!
//! ## Usage Example
//!
//! ```
//! use estafeta::protocol::commands;
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(commands::mode_reset());
//! data.extend("Hello".as_bytes());
//! data.extend(commands::finalization());
//!
//! // Send `data` through a connection...
//! ```

pub mod commands;
pub mod graphics;
pub mod job;

pub use job::{Plan, PrintJob, Step};
