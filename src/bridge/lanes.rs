//! Per-printer serialization.
//!
//! A printer accepts one RFCOMM link at a time, and two interleaved jobs
//! would garble each other's output anyway. Every operation holds its
//! printer's lane from its first connection attempt until it finishes;
//! later operations wait behind it. The order in which waiting operations
//! get the lane is not guaranteed to match submission order, since each
//! one asks for the lane from its own task after the adapter checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::address::PrinterAddress;

pub type Lane = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub struct DeviceLanes {
    lanes: Mutex<HashMap<String, Lane>>,
}

impl DeviceLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lane for `address`. Spellings differing only in case share one.
    pub fn lane(&self, address: &PrinterAddress) -> Lane {
        let mut lanes = self.lanes.lock().unwrap_or_else(|p| p.into_inner());
        // Forget lanes nobody holds or waits on
        lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
        Arc::clone(lanes.entry(address.device_key()).or_default())
    }

    /// Lanes currently in use.
    pub fn active(&self) -> usize {
        self.lanes.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
