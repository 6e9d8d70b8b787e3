//! # Printer Module
//!
//! Persistent printer selection and bridge tuning.
//!
//! ## Modules
//!
//! - [`config`]: The configuration store for the selected printer address
//! - [`settings`]: Pacing, retry and raster settings

pub mod config;
pub mod settings;

pub use config::{ConfigStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use settings::{BridgeSettings, RasterSettings};
