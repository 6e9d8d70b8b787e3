//! # Bridge Settings
//!
//! Tuning knobs for pacing, retries and raster rendering.
//!
//! Every field has a default matching what works on common 80mm SPP thermal
//! printers, so an empty JSON object (or no file at all) is a valid
//! configuration:
//!
//! ```
//! use estafeta::printer::BridgeSettings;
//!
//! let settings: BridgeSettings = serde_json::from_str("{}").unwrap();
//! assert_eq!(settings.chunk_size, 256);
//! assert_eq!(settings.retry_attempts, 2);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EstafetaError;
use crate::transport::writer::Pacing;

/// Default RFCOMM channel. SPP printers publish their serial service here.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Maximum bytes per write call.
    pub chunk_size: usize,
    /// Pause after each chunk (milliseconds).
    pub chunk_delay_ms: u64,
    /// Pause after the socket connects, before the first byte (text jobs).
    pub connect_settle_ms: u64,
    /// Pause after the socket connects for raw jobs.
    pub raw_connect_settle_ms: u64,
    /// Pause after `ESC @` so the printer finishes resetting.
    pub init_settle_ms: u64,
    /// Pause after the raw payload is flushed, before closing.
    pub raw_drain_ms: u64,
    /// Pause after the cut command, before closing.
    pub finalize_settle_ms: u64,
    /// Pause after the diagnostic reset, before the first test line.
    pub diagnostic_reset_ms: u64,
    /// Pause between diagnostic test steps.
    pub diagnostic_step_ms: u64,
    /// Total attempts for print jobs (1 disables retrying).
    pub retry_attempts: u32,
    /// Pause between attempts (milliseconds).
    pub retry_backoff_ms: u64,
    /// RFCOMM channel used for the SPP service.
    pub rfcomm_channel: u8,
    pub raster: RasterSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            chunk_delay_ms: 10,
            connect_settle_ms: 150,
            raw_connect_settle_ms: 100,
            init_settle_ms: 50,
            raw_drain_ms: 300,
            finalize_settle_ms: 200,
            diagnostic_reset_ms: 500,
            diagnostic_step_ms: 200,
            retry_attempts: 2,
            retry_backoff_ms: 1000,
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
            raster: RasterSettings::default(),
        }
    }
}

/// Canvas and font used when text is printed as a bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    /// Canvas width in dots (576 = 72mm at 8 dots/mm).
    pub width: u16,
    /// Canvas height in dots.
    pub height: u16,
    /// Glyph height in pixels.
    pub font_size: f32,
    /// Left inset of the first glyph, in dots.
    pub left_inset: u16,
    /// TrueType/OpenType face for anti-aliased text.
    ///
    /// When unset, or when the file cannot be loaded, text is drawn with the
    /// built-in Spleen bitmap face: hard-edged pixels, scaled to the nearest
    /// whole multiple of its cell size. Configure a TTF here to get smooth
    /// glyph edges.
    pub font_path: Option<PathBuf>,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            width: 576,
            height: 120,
            font_size: 48.0,
            left_inset: 10,
            font_path: None,
        }
    }
}

impl BridgeSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EstafetaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            EstafetaError::Settings(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Self = serde_json::from_str(&contents).map_err(|e| {
            EstafetaError::Settings(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), EstafetaError> {
        if self.chunk_size == 0 {
            return Err(EstafetaError::Settings("chunk_size must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(EstafetaError::Settings(
                "retry_attempts must be at least 1".into(),
            ));
        }
        if self.raster.width == 0 || self.raster.height == 0 {
            return Err(EstafetaError::Settings("raster canvas must not be empty".into()));
        }
        if !(self.raster.font_size.is_finite() && self.raster.font_size > 0.0) {
            return Err(EstafetaError::Settings("raster font_size must be positive".into()));
        }
        Ok(())
    }

    /// Chunking parameters for the writer.
    pub fn pacing(&self) -> Pacing {
        Pacing {
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay(),
        }
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn raw_connect_settle(&self) -> Duration {
        Duration::from_millis(self.raw_connect_settle_ms)
    }

    pub fn init_settle(&self) -> Duration {
        Duration::from_millis(self.init_settle_ms)
    }

    pub fn raw_drain(&self) -> Duration {
        Duration::from_millis(self.raw_drain_ms)
    }

    pub fn finalize_settle(&self) -> Duration {
        Duration::from_millis(self.finalize_settle_ms)
    }

    pub fn diagnostic_reset(&self) -> Duration {
        Duration::from_millis(self.diagnostic_reset_ms)
    }

    pub fn diagnostic_step(&self) -> Duration {
        Duration::from_millis(self.diagnostic_step_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Settings with every pause set to zero. Handy for tests and dry runs.
    pub fn without_delays() -> Self {
        Self {
            chunk_delay_ms: 0,
            connect_settle_ms: 0,
            raw_connect_settle_ms: 0,
            init_settle_ms: 0,
            raw_drain_ms: 0,
            finalize_settle_ms: 0,
            diagnostic_reset_ms: 0,
            diagnostic_step_ms: 0,
            retry_backoff_ms: 0,
            ..Self::default()
        }
    }
}
