//! # Notifications
//!
//! Short human-readable status messages ("Print sent", "No printer
//! configured") emitted by every bridge operation. The host decides how to
//! show them: log lines, an HTTP feed, a toast.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// How many notifications [`NotificationLog`] keeps by default.
pub const DEFAULT_LOG_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    /// Job that produced it, if any. Rejections before launch carry one too.
    pub job: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            job: None,
            at: Utc::now(),
        }
    }

    pub fn for_job(mut self, id: Uuid) -> Self {
        self.job = Some(id);
        self
    }
}

/// Receiver of bridge notifications. Called from background tasks.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Info => info!(job = ?n.job, "{}", n.message),
            Level::Error => warn!(job = ?n.job, "{}", n.message),
        }
    }
}

/// Bounded in-memory history, newest last.
#[derive(Debug)]
pub struct NotificationLog {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Snapshot of the retained notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Notifications produced by one job.
    pub fn for_job(&self, id: Uuid) -> Vec<Notification> {
        self.recent()
            .into_iter()
            .filter(|n| n.job == Some(id))
            .collect()
    }

    /// Message texts only, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.recent().into_iter().map(|n| n.message).collect()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

/// Forwards every notification to several sinks.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Notifier for Fanout {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}
