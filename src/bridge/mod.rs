//! # Printer Bridge
//!
//! The command surface a host (CLI, HTTP server, embedding app) drives.
//!
//! ## Commands
//!
//! | Command | Blocking | Result |
//! |---------|----------|--------|
//! | [`set_address`](PrinterBridge::set_address) | no I/O | `bool` |
//! | [`get_address`](PrinterBridge::get_address) | no I/O | `Option` |
//! | [`clear_address`](PrinterBridge::clear_address) | no I/O | `()` |
//! | [`list_paired`](PrinterBridge::list_paired) | adapter query | `Vec<PairedDevice>` |
//! | [`connect`](PrinterBridge::connect) | background | [`JobHandle`] |
//! | [`check_connection`](PrinterBridge::check_connection) | background | [`JobHandle`] |
//! | [`print`](PrinterBridge::print) | background | [`JobHandle`] |
//! | [`print_raw`](PrinterBridge::print_raw) / [`print_base64`](PrinterBridge::print_base64) | background | [`JobHandle`] |
//! | [`print_alternative`](PrinterBridge::print_alternative) | background | [`JobHandle`] |
//! | [`print_raster`](PrinterBridge::print_raster) | background | [`JobHandle`] |
//! | [`diagnostic_test`](PrinterBridge::diagnostic_test) | background | [`JobHandle`] |
//!
//! Background commands return at once. Every one of them ends in exactly one
//! notification, whether it was refused up front or failed on the wire.
//! They spawn onto the current Tokio runtime and must be called from inside
//! one.
//!
//! ## Guards
//!
//! Device commands pass the same checks, in order, before any connection
//! attempt:
//!
//! | Step | Check | Runs |
//! |------|-------|------|
//! | 1 | Payload (non-empty, valid base64) | caller's thread |
//! | 2 | Printer address (explicit, or the stored one) | caller's thread |
//! | 3 | Bluetooth permission | background, blocking pool |
//! | 4 | Radio powered on | background, blocking pool |
//!
//! Steps 3 and 4 query the adapter, which on BlueZ means a `bluetoothctl`
//! subprocess, so they never run on the caller's thread. A refusal at step 1
//! or 2 comes back as an already-closed [`JobHandle`]; a refusal at step 3 or
//! 4 closes the running job before it takes the printer's lane.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use estafeta::bridge::{PrinterBridge, TracingNotifier};
//! use estafeta::printer::{BridgeSettings, ConfigStore, JsonFileStore};
//! use estafeta::transport::BluezAdapter;
//!
//! # async fn example() -> Result<(), estafeta::EstafetaError> {
//! let settings = BridgeSettings::default();
//! let bridge = PrinterBridge::new(
//!     Arc::new(BluezAdapter::new(settings.rfcomm_channel)),
//!     ConfigStore::new(JsonFileStore::default_location()),
//!     Arc::new(TracingNotifier),
//!     settings,
//! );
//! bridge.set_address("00:11:62:AA:BB:CC");
//! bridge.print("Hello\n").wait().await?;
//! # Ok(())
//! # }
//! ```

mod handle;
mod lanes;
pub mod notify;
mod pipeline;

pub use handle::{JobHandle, OpState, Outcome};
pub use lanes::DeviceLanes;
pub use notify::{Fanout, Level, Notification, NotificationLog, Notifier, TracingNotifier};

use std::sync::Arc;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address::PrinterAddress;
use crate::connection::ConnectionManager;
use crate::directory::{DeviceDirectory, PairedDevice};
use crate::error::EstafetaError;
use crate::printer::{BridgeSettings, ConfigStore};
use crate::protocol::PrintJob;
use crate::render::RasterRenderer;
use crate::retry::RetryPolicy;
use crate::transport::BluetoothAdapter;

use pipeline::Pipeline;

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64 payload. Whitespace and line breaks are ignored.
///
/// ```
/// use estafeta::bridge::decode_base64;
///
/// assert_eq!(decode_base64("G0A=").unwrap(), vec![0x1B, 0x40]);
/// assert_eq!(decode_base64("G0A").unwrap(), vec![0x1B, 0x40]);
/// assert!(decode_base64("not base64!").is_err());
/// ```
pub fn decode_base64(data: &str) -> Result<Vec<u8>, EstafetaError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_BASE64
        .decode(compact)
        .map_err(|e| EstafetaError::InvalidPayload(format!("bad base64: {}", e)))
}

/// What a launched job does.
#[derive(Debug, Clone)]
enum Task {
    Connect,
    Check,
    Print(PrintJob),
}

impl Task {
    /// Success text and failure prefix for notifications.
    fn messages(&self) -> (&'static str, &'static str) {
        match self {
            Task::Connect => ("Printer connected", "Connection failed"),
            Task::Check => ("Printer reachable", "Printer unreachable"),
            Task::Print(PrintJob::Text(_)) | Task::Print(PrintJob::RawBytes(_)) => {
                ("Print sent", "Print failed")
            }
            Task::Print(PrintJob::Alternative(_)) => ("Alt Print sent", "Alt Print failed"),
            Task::Print(PrintJob::RasterText(_)) => ("Raster print sent", "Raster print failed"),
            Task::Print(PrintJob::Diagnostic) => ("Diagnostic Test Sent", "Diagnostic Error"),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Task::Connect => "connect",
            Task::Check => "check",
            Task::Print(job) => job.kind(),
        }
    }
}

struct Shared {
    adapter: Arc<dyn BluetoothAdapter>,
    store: ConfigStore,
    notifier: Arc<dyn Notifier>,
    settings: BridgeSettings,
    renderer: RasterRenderer,
    manager: ConnectionManager,
    directory: DeviceDirectory,
    lanes: DeviceLanes,
}

/// # Printer Bridge
///
/// Cheap to clone; clones share the store, lanes and notifier.
#[derive(Clone)]
pub struct PrinterBridge {
    shared: Arc<Shared>,
}

impl PrinterBridge {
    pub fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        store: ConfigStore,
        notifier: Arc<dyn Notifier>,
        settings: BridgeSettings,
    ) -> Self {
        let renderer = RasterRenderer::new(settings.raster.clone());
        Self {
            shared: Arc::new(Shared {
                manager: ConnectionManager::new(Arc::clone(&adapter)),
                directory: DeviceDirectory::new(Arc::clone(&adapter)),
                adapter,
                store,
                notifier,
                settings,
                renderer,
                lanes: DeviceLanes::new(),
            }),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.shared.settings
    }

    pub fn renderer(&self) -> &RasterRenderer {
        &self.shared.renderer
    }

    // ===== Configuration =====

    /// Validate and persist the printer address.
    ///
    /// Returns false, keeping the previous value, if the address is malformed.
    pub fn set_address(&self, address: &str) -> bool {
        self.shared.store.set(address)
    }

    pub fn get_address(&self) -> Option<PrinterAddress> {
        self.shared.store.get()
    }

    pub fn clear_address(&self) {
        self.shared.store.clear();
    }

    /// Bonded devices. Empty without permission or with a broken adapter.
    pub fn list_paired(&self) -> Vec<PairedDevice> {
        self.shared.directory.list_paired()
    }

    // ===== Device commands =====

    /// Validate, persist, then open and close a connection to `address`.
    ///
    /// The address is stored once the adapter checks pass, even if the
    /// connection itself then fails.
    pub fn connect(&self, address: &str) -> JobHandle {
        match self.admit(Some(address)) {
            Ok(address) => self.launch(address, Task::Connect),
            Err(e) => self.reject(e),
        }
    }

    /// Connect to the stored printer and close again.
    pub fn check_connection(&self) -> JobHandle {
        self.submit_task(Task::Check)
    }

    /// Print UTF-8 text with init, mode reset and finalization.
    pub fn print(&self, text: &str) -> JobHandle {
        if text.is_empty() {
            return self.reject(EstafetaError::InvalidPayload("empty text".into()));
        }
        self.submit(PrintJob::Text(text.to_string()))
    }

    /// Send a complete command stream untouched.
    pub fn print_raw(&self, bytes: Vec<u8>) -> JobHandle {
        if bytes.is_empty() {
            return self.reject(EstafetaError::InvalidPayload("empty payload".into()));
        }
        self.submit(PrintJob::RawBytes(bytes))
    }

    /// [`print_raw`](Self::print_raw) with a base64 payload.
    pub fn print_base64(&self, data: &str) -> JobHandle {
        match decode_base64(data) {
            Ok(bytes) => self.print_raw(bytes),
            Err(e) => self.reject(e),
        }
    }

    /// Print a base64 payload wrapped in the wake/init preamble and
    /// finalization, for printers that ignore a bare raw stream.
    pub fn print_alternative(&self, data: &str) -> JobHandle {
        match decode_base64(data) {
            Ok(bytes) if bytes.is_empty() => {
                self.reject(EstafetaError::InvalidPayload("empty payload".into()))
            }
            Ok(bytes) => self.submit(PrintJob::Alternative(bytes)),
            Err(e) => self.reject(e),
        }
    }

    /// Print text as a bitmap, for scripts the printer font lacks.
    pub fn print_raster(&self, text: &str) -> JobHandle {
        if text.is_empty() {
            return self.reject(EstafetaError::InvalidPayload("empty text".into()));
        }
        self.submit(PrintJob::RasterText(text.to_string()))
    }

    /// Run the fixed self test against the stored printer.
    pub fn diagnostic_test(&self) -> JobHandle {
        self.submit(PrintJob::Diagnostic)
    }

    /// Print any job on the stored printer.
    pub fn submit(&self, job: PrintJob) -> JobHandle {
        self.submit_task(Task::Print(job))
    }

    fn submit_task(&self, task: Task) -> JobHandle {
        match self.admit(None) {
            Ok(address) => self.launch(address, task),
            Err(e) => self.reject(e),
        }
    }

    /// Address guard shared by every device command. Touches the store
    /// only; the adapter checks run in the launched job.
    fn admit(&self, explicit: Option<&str>) -> Result<PrinterAddress, EstafetaError> {
        match explicit {
            Some(raw) => PrinterAddress::parse(raw),
            None => {
                let raw = self
                    .shared
                    .store
                    .get_raw()
                    .ok_or(EstafetaError::NoPrinterConfigured)?;
                PrinterAddress::parse(&raw)
            }
        }
    }

    fn reject(&self, error: EstafetaError) -> JobHandle {
        let id = Uuid::new_v4();
        debug!(job = %id, "Rejected: {}", error);
        self.shared
            .notifier
            .notify(Notification::error(error.to_string()).for_job(id));
        JobHandle::rejected(id, error)
    }

    fn launch(&self, address: PrinterAddress, task: Task) -> JobHandle {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(OpState::Idle);
        info!(job = %id, %address, kind = task.kind(), "Job queued");

        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            Shared::execute(shared, id, address, task, Arc::new(state_tx), token).await
        });
        JobHandle::running(id, cancel, state_rx, join)
    }
}

impl Shared {
    async fn execute(
        self: Arc<Self>,
        id: Uuid,
        address: PrinterAddress,
        task: Task,
        state: Arc<watch::Sender<OpState>>,
        cancel: CancellationToken,
    ) -> Result<(), EstafetaError> {
        let (sent, failed) = task.messages();

        match self.preflight(&address, &task, &cancel).await {
            // A cancelled job is reported below like any other cancellation
            Ok(()) | Err(EstafetaError::Cancelled) => {}
            Err(e) => {
                // Refused before any connection attempt: same shape as an
                // up-front rejection
                debug!(job = %id, "Rejected: {}", e);
                state.send_replace(OpState::Closed(Outcome::Failure));
                self.notifier
                    .notify(Notification::error(e.to_string()).for_job(id));
                return Err(e);
            }
        }

        let lane = self.lanes.lane(&address);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EstafetaError::Cancelled),
            guard = lane.lock_owned() => {
                let shared = Arc::clone(&self);
                let address = address.clone();
                let state = Arc::clone(&state);
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || {
                    let _guard = guard;
                    shared.run_blocking(&address, &task, &state, &cancel)
                })
                .await
                .unwrap_or_else(|e| Err(EstafetaError::Task(e.to_string())))
            }
        };

        let outcome = match &result {
            Ok(()) => Outcome::Success,
            Err(EstafetaError::Cancelled) => Outcome::Cancelled,
            Err(_) => Outcome::Failure,
        };
        state.send_replace(OpState::Closed(outcome));

        let notification = match &result {
            Ok(()) => {
                info!(job = %id, %address, "{}", sent);
                Notification::info(sent)
            }
            Err(e) => {
                warn!(job = %id, %address, "{}: {}", failed, e);
                Notification::error(format!("{}: {}", failed, e))
            }
        };
        self.notifier.notify(notification.for_job(id));
        result
    }

    /// Adapter guards, then persistence for `connect`. Both block, so they
    /// run on the blocking pool; the wait ends early on cancellation.
    async fn preflight(
        self: &Arc<Self>,
        address: &PrinterAddress,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<(), EstafetaError> {
        let shared = Arc::clone(self);
        let address = address.clone();
        let persist = matches!(task, Task::Connect);
        let cancelled = cancel.clone();
        let check = tokio::task::spawn_blocking(move || {
            if !shared.adapter.has_connect_permission() {
                return Err(EstafetaError::PermissionDenied);
            }
            if !shared.adapter.is_enabled() {
                return Err(EstafetaError::AdapterUnavailable);
            }
            if persist && !cancelled.is_cancelled() && !shared.store.set(address.as_str()) {
                warn!(%address, "Could not persist printer address");
            }
            Ok(())
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EstafetaError::Cancelled),
            joined = check => joined.unwrap_or_else(|e| Err(EstafetaError::Task(e.to_string()))),
        }
    }

    fn run_blocking(
        &self,
        address: &PrinterAddress,
        task: &Task,
        state: &watch::Sender<OpState>,
        cancel: &CancellationToken,
    ) -> Result<(), EstafetaError> {
        let pipeline = Pipeline {
            manager: &self.manager,
            address,
            state,
            cancel,
        };
        match task {
            Task::Connect | Task::Check => pipeline.reach(),
            Task::Print(job) => {
                let plan = job.encode(&self.settings, &self.renderer);
                let policy = match job {
                    PrintJob::Diagnostic => RetryPolicy::once(),
                    _ => RetryPolicy::from_settings(&self.settings),
                };
                pipeline.print(&plan, self.settings.pacing(), policy)
            }
        }
    }
}
