//! Telemetry sink: where the lifecycle reports what it is doing.
//!
//! A sink is the read-only UI side of the crate. The lifecycle and the
//! simulator push log lines, status text, stats and button state into it
//! and never read anything back. Updates are delivered after the crate's
//! own locks are released, so a sink may query the controller it serves.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::utils::STATS_PLACEHOLDER;

/// Receives user-facing updates. All calls are fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink: Send + Sync {
    /// Append a line to the log.
    fn log(&self, message: &str);

    /// Replace the status line.
    fn set_status(&self, message: &str);

    /// Replace the displayed power and cadence.
    fn set_stats(&self, power_text: &str, cadence_text: &str);

    /// Switch the connect button between "connect" and "disconnect".
    fn set_button_connected(&self, connected: bool);
}

/// A sink that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "kickr_rust_ble::sink", "{}", message);
    }

    fn set_status(&self, message: &str) {
        info!(target: "kickr_rust_ble::sink", status = message);
    }

    fn set_stats(&self, power_text: &str, cadence_text: &str) {
        info!(target: "kickr_rust_ble::sink", power = power_text, cadence = cadence_text);
    }

    fn set_button_connected(&self, connected: bool) {
        info!(target: "kickr_rust_ble::sink", button_connected = connected);
    }
}

/// One update for a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUpdate {
    /// A log line.
    Log(String),
    /// A status line.
    Status(String),
    /// A stats pair.
    Stats {
        /// Power text.
        power: String,
        /// Cadence text.
        cadence: String,
    },
    /// Button state.
    Button(bool),
}

impl SinkUpdate {
    /// Send this update to `sink`.
    pub fn deliver_to(&self, sink: &dyn TelemetrySink) {
        match self {
            Self::Log(line) => sink.log(line),
            Self::Status(status) => sink.set_status(status),
            Self::Stats { power, cadence } => sink.set_stats(power, cadence),
            Self::Button(connected) => sink.set_button_connected(*connected),
        }
    }
}

/// Updates queued while a lock was held, in the order they were produced.
///
/// Delivered by [`deliver`](Self::deliver) or when dropped. Bind the value
/// to a local so the lock guard is released first:
///
/// ```rust,ignore
/// let updates = machine.lock().connect();
/// updates.deliver();
/// ```
#[must_use = "queued updates reach the sink only once delivered"]
pub struct PendingUpdates {
    sink: Arc<dyn TelemetrySink>,
    updates: Vec<SinkUpdate>,
}

impl PendingUpdates {
    /// Queue `updates` for `sink`.
    pub fn new(sink: Arc<dyn TelemetrySink>, updates: Vec<SinkUpdate>) -> Self {
        Self { sink, updates }
    }

    /// The queued updates.
    pub fn updates(&self) -> &[SinkUpdate] {
        &self.updates
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Send every queued update to the sink.
    pub fn deliver(mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        for update in std::mem::take(&mut self.updates) {
            update.deliver_to(self.sink.as_ref());
        }
    }
}

impl Drop for PendingUpdates {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for PendingUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUpdates")
            .field("updates", &self.updates)
            .finish()
    }
}

/// A timestamped [`SinkUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    /// When the update was received.
    pub at: DateTime<Utc>,
    /// The update.
    pub update: SinkUpdate,
}

#[derive(Debug)]
struct DisplayState {
    status: String,
    power: String,
    cadence: String,
    button_connected: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            status: String::new(),
            power: STATS_PLACEHOLDER.to_string(),
            cadence: STATS_PLACEHOLDER.to_string(),
            button_connected: false,
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    display: DisplayState,
    records: Vec<SinkRecord>,
}

/// A sink that keeps the current display state and a history of updates.
///
/// Cloning shares the underlying recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<RwLock<Recording>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status line.
    pub fn status(&self) -> String {
        self.inner.read().display.status.clone()
    }

    /// Current `(power, cadence)` texts.
    pub fn stats(&self) -> (String, String) {
        let recording = self.inner.read();
        (
            recording.display.power.clone(),
            recording.display.cadence.clone(),
        )
    }

    /// Current button state.
    pub fn button_connected(&self) -> bool {
        self.inner.read().display.button_connected
    }

    /// All log lines, oldest first.
    pub fn logs(&self) -> Vec<String> {
        self.inner
            .read()
            .records
            .iter()
            .filter_map(|record| match &record.update {
                SinkUpdate::Log(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// The log rendered as append-only text, one line per entry.
    pub fn log_text(&self) -> String {
        self.logs().iter().map(|line| format!("{line}\n")).collect()
    }

    /// Number of stats updates received.
    pub fn stats_updates(&self) -> usize {
        self.inner
            .read()
            .records
            .iter()
            .filter(|record| matches!(record.update, SinkUpdate::Stats { .. }))
            .count()
    }

    /// Every update received, oldest first.
    pub fn records(&self) -> Vec<SinkRecord> {
        self.inner.read().records.clone()
    }

    /// Forget the history, keeping the current display state.
    pub fn clear_history(&self) {
        self.inner.write().records.clear();
    }

    fn record(&self, update: SinkUpdate) {
        let mut recording = self.inner.write();

        match &update {
            SinkUpdate::Log(_) => {}
            SinkUpdate::Status(status) => recording.display.status = status.clone(),
            SinkUpdate::Stats { power, cadence } => {
                recording.display.power = power.clone();
                recording.display.cadence = cadence.clone();
            }
            SinkUpdate::Button(connected) => recording.display.button_connected = *connected,
        }

        recording.records.push(SinkRecord {
            at: Utc::now(),
            update,
        });
    }
}

impl TelemetrySink for RecordingSink {
    fn log(&self, message: &str) {
        self.record(SinkUpdate::Log(message.to_string()));
    }

    fn set_status(&self, message: &str) {
        self.record(SinkUpdate::Status(message.to_string()));
    }

    fn set_stats(&self, power_text: &str, cadence_text: &str) {
        self.record(SinkUpdate::Stats {
            power: power_text.to_string(),
            cadence: cadence_text.to_string(),
        });
    }

    fn set_button_connected(&self, connected: bool) {
        self.record(SinkUpdate::Button(connected));
    }
}
