//! # Estafeta - Bluetooth ESC/POS Printer Bridge
//!
//! Estafeta drives thermal receipt printers over Bluetooth Serial Port
//! Profile. It provides:
//!
//! - **Printer selection**: validated, persisted printer address
//! - **Connection management**: secure channel first, insecure fallback
//! - **Protocol encoding**: ESC/POS framing, raster text for missing glyphs
//! - **Paced transport**: chunked writes that small printer buffers survive
//! - **Background jobs**: retries, per-printer serialization, cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use estafeta::{
//!     PrinterBridge,
//!     bridge::TracingNotifier,
//!     printer::{BridgeSettings, ConfigStore, JsonFileStore},
//!     transport::BluezAdapter,
//! };
//!
//! # async fn example() -> Result<(), estafeta::EstafetaError> {
//! let bridge = PrinterBridge::new(
//!     Arc::new(BluezAdapter::new(1)),
//!     ConfigStore::new(JsonFileStore::default_location()),
//!     Arc::new(TracingNotifier),
//!     BridgeSettings::default(),
//! );
//!
//! // The printer must already be paired with the host
//! bridge.connect("00:11:62:AA:BB:CC").wait().await?;
//! bridge.print("Table 4\n2x Coffee\n").wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`address`] | Hardware address validation |
//! | [`bridge`] | Command surface, jobs, notifications |
//! | [`connection`] | Device resolution and tiered connect |
//! | [`directory`] | Bonded device listing |
//! | [`protocol`] | ESC/POS commands, raster graphics, job encoding |
//! | [`render`] | Text to bitmap rendering |
//! | [`transport`] | Bluetooth adapters, sockets, paced writer |
//! | [`retry`] | Bounded retry with cancellable backoff |
//! | [`printer`] | Address store and bridge settings |
//! | [`server`] | JSON HTTP API |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Any ESC/POS printer exposing SPP, e.g. the common 58mm and 80mm
//! Bluetooth receipt printers. Raster defaults assume an 80mm head
//! (576 dots).

pub mod address;
pub mod bridge;
pub mod connection;
pub mod directory;
pub mod error;
pub mod logging;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod retry;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use address::PrinterAddress;
pub use bridge::PrinterBridge;
pub use error::EstafetaError;
pub use printer::BridgeSettings;
