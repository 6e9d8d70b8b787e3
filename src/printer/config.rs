//! # Printer Configuration Store
//!
//! Holds the one persisted value of the bridge: the selected printer address.
//!
//! The store is the single source of truth. Nothing else caches the address
//! across calls; every print operation reads it fresh.
//!
//! ## Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`JsonFileStore`] | Default; `<config dir>/estafeta/printer_prefs.json` |
//! | [`MemoryStore`] | Tests and throwaway sessions |
//!
//! Writes are last-writer-wins. The file backend replaces the file through a
//! rename from a temp file unique to each write, so readers see either the
//! old or the new document. A document that no longer parses (a torn write,
//! a hand edit) reads as empty and is replaced by the next write.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::address::{self, PrinterAddress};

/// Key under which the selected printer is stored.
pub const PREF_PRINTER_MAC: &str = "printer_mac";

/// File name of the preference document.
pub const PREFS_FILE_NAME: &str = "printer_prefs.json";

/// Minimal key-value persistence scoped to the bridge.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> io::Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// JSON document on disk: a flat object of string values.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store in the user's configuration directory.
    ///
    /// Falls back to the working directory when the platform has none.
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .map(|d| d.join("estafeta"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(PREFS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Current document for a read-modify-write, and whether it had to be
    /// discarded.
    fn read_for_update(&self) -> io::Result<(BTreeMap<String, String>, bool)> {
        match self.read_all() {
            Ok(values) => Ok((values, false)),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), "Discarding unreadable preferences: {}", e);
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        let result = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> io::Result<()> {
        let (mut values, _) = self.read_for_update()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let (mut values, discarded) = self.read_for_update()?;
        if values.remove(key).is_some() || discarded {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// # Configuration Store
///
/// Persists, retrieves and clears the selected printer address.
///
/// ```
/// use estafeta::printer::{ConfigStore, MemoryStore};
///
/// let store = ConfigStore::new(MemoryStore::new());
/// assert!(store.set("00:11:22:33:44:55"));
/// assert_eq!(store.get().unwrap().as_str(), "00:11:22:33:44:55");
/// assert!(!store.set("not-a-mac"));
/// store.clear();
/// assert!(store.get().is_none());
/// ```
#[derive(Clone)]
pub struct ConfigStore {
    backend: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new<S: KeyValueStore + 'static>(backend: S) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Validate and persist. Returns false, leaving the previous value in
    /// place, when the address is malformed or the backend refuses the write.
    pub fn set(&self, address: &str) -> bool {
        if !address::validate(address) {
            debug!(address, "Rejected invalid printer address");
            return false;
        }
        match self.backend.put(PREF_PRINTER_MAC, address) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist printer address: {}", e);
                false
            }
        }
    }

    /// The stored address, if any.
    ///
    /// A stored value that no longer validates is reported as absent.
    pub fn get(&self) -> Option<PrinterAddress> {
        let raw = match self.backend.get(PREF_PRINTER_MAC) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                warn!("Failed to read printer address: {}", e);
                return None;
            }
        };
        match PrinterAddress::parse(&raw) {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!(stored = %raw, "Stored printer address is malformed");
                None
            }
        }
    }

    /// The raw stored string, valid or not.
    pub fn get_raw(&self) -> Option<String> {
        self.backend
            .get(PREF_PRINTER_MAC)
            .ok()
            .flatten()
            .filter(|s| !s.is_empty())
    }

    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(PREF_PRINTER_MAC) {
            warn!("Failed to clear printer address: {}", e);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
