//! Trainer connection state machine.
//!
//! Owns the lifecycle [`Snapshot`], runs the [`Effect`]s that
//! [`reduce`] asks for against a [`BleTransport`] and reports to a
//! [`TelemetrySink`]. Sink updates are queued and handed back as
//! [`PendingUpdates`], so a caller holding the machine behind a lock can
//! deliver them after the guard is released. Every request the machine opens gets a fresh
//! [`OperationId`]; events for operations that are no longer outstanding are
//! dropped, so a late scan batch can never restart a finished attempt.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::ble::dispatcher::{Dispatch, GattDispatcher};
use crate::ble::filter::DeviceFilter;
use crate::ble::lifecycle::{reduce, Effect, Input, LifecycleState, Notice, Snapshot, Transition};
use crate::ble::transport::{
    BleTransport, OperationHandle, OperationId, Responder, TransportEvent, TransportPayload,
};
use crate::data::ConnectionSession;
use crate::protocol::{GattEvent, ServiceMethod};
use crate::sink::{PendingUpdates, SinkUpdate, TelemetrySink};

/// Event for lifecycle state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// The state before the change.
    pub previous: LifecycleState,
    /// The new state.
    pub state: LifecycleState,
    /// Address of the trainer, once one was found.
    pub target_address: Option<String>,
}

/// An open subscription and the id its events carry.
#[derive(Debug)]
struct Outstanding {
    id: OperationId,
    handle: OperationHandle,
}

impl Outstanding {
    fn release(mut self) {
        debug!("Releasing {} operation {}", self.handle.method(), self.id);
        self.handle.cancel();
    }
}

/// Drives one trainer connection from discovery to teardown.
pub struct ConnectionStateMachine {
    transport: Arc<dyn BleTransport>,
    sink: Arc<dyn TelemetrySink>,
    filter: DeviceFilter,
    dispatcher: GattDispatcher,
    snapshot: Snapshot,
    enable_check: Option<Outstanding>,
    scan: Option<Outstanding>,
    link: Option<Outstanding>,
    next_operation: OperationId,
    outbox: Vec<SinkUpdate>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    state_tx: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionStateMachine {
    /// Create an idle machine.
    ///
    /// Transport events arrive on the returned receiver; feed each one to
    /// [`handle_event`](Self::handle_event).
    pub fn new(
        transport: Arc<dyn BleTransport>,
        sink: Arc<dyn TelemetrySink>,
        filter: DeviceFilter,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = broadcast::channel(16);

        let machine = Self {
            transport,
            sink,
            filter,
            dispatcher: GattDispatcher::new(),
            snapshot: Snapshot::default(),
            enable_check: None,
            scan: None,
            link: None,
            next_operation: 0,
            outbox: Vec::new(),
            events_tx,
            state_tx,
        };

        (machine, events_rx)
    }

    /// Replace the GATT dispatcher, e.g. to install a telemetry decoder.
    pub fn with_dispatcher(mut self, dispatcher: GattDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.snapshot.state
    }

    /// Get the current session.
    pub fn session(&self) -> &ConnectionSession {
        &self.snapshot.session
    }

    /// Address of the trainer picked by the current attempt.
    pub fn target_address(&self) -> Option<&str> {
        self.snapshot.session.target_address.as_deref()
    }

    /// Check if a session is running (connecting or connected).
    pub fn is_active(&self) -> bool {
        self.snapshot.session.active
    }

    /// The device filter in use.
    pub fn filter(&self) -> &DeviceFilter {
        &self.filter
    }

    /// Subscribe to lifecycle state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.state_tx.subscribe()
    }

    /// Start a connection attempt. Ignored unless idle.
    pub fn connect(&mut self) -> PendingUpdates {
        self.apply(Input::Connect);
        self.take_updates()
    }

    /// Tear down the session. Ignored when idle.
    pub fn disconnect(&mut self) -> PendingUpdates {
        self.apply(Input::Disconnect);
        self.take_updates()
    }

    /// Handle one event delivered by the transport.
    pub fn handle_event(&mut self, event: TransportEvent) -> PendingUpdates {
        self.route_event(event);
        self.take_updates()
    }

    /// Handle a GATT event for the current link.
    ///
    /// Also the entry point for events pushed by a host outside the
    /// transport's own subscription.
    pub fn handle_gatt_event(&mut self, event: GattEvent) -> PendingUpdates {
        self.route_gatt_event(event);
        self.take_updates()
    }

    fn take_updates(&mut self) -> PendingUpdates {
        PendingUpdates::new(self.sink.clone(), std::mem::take(&mut self.outbox))
    }

    fn route_event(&mut self, event: TransportEvent) {
        if !self.is_current(event.method, event.operation) {
            debug!(
                "Dropping stale {} event for operation {}",
                event.method, event.operation
            );
            return;
        }

        match event.outcome {
            Err(failure) => self.apply(Input::Failed {
                method: event.method,
                failure,
            }),
            Ok(TransportPayload::Enabled(enabled)) => self.apply(Input::Enabled(enabled)),
            Ok(TransportPayload::Scan(result)) => {
                debug!("Scan batch with {} device(s)", result.devices().len());
                self.apply(Input::Devices(result));
            }
            Ok(TransportPayload::ScanStopped) => self.apply(Input::ScanStopped),
            Ok(TransportPayload::Gatt(gatt)) => self.route_gatt_event(gatt),
        }
    }

    fn route_gatt_event(&mut self, event: GattEvent) {
        debug!("GATT event: {} {}", event.kind, event.values_text());

        match self.dispatcher.dispatch(&event) {
            Dispatch::Link(connected) => self.apply(Input::Link(connected)),
            Dispatch::MissingState => {
                warn!("connectionStateChange without a connected flag");
            }
            Dispatch::Info(line) => self.outbox.push(SinkUpdate::Log(line)),
            Dispatch::Telemetry(sample) => self.outbox.push(SinkUpdate::Stats {
                power: sample.power_text(),
                cadence: sample.cadence_text(),
            }),
            Dispatch::Ignore => {}
        }
    }

    /// Check whether `operation` is the outstanding request for `method`.
    ///
    /// Stop-scan acknowledgments have no subscription and are always current.
    fn is_current(&self, method: ServiceMethod, operation: OperationId) -> bool {
        let outstanding = match method {
            ServiceMethod::StopScan => return true,
            ServiceMethod::IsEnabled => &self.enable_check,
            ServiceMethod::StartScan => &self.scan,
            ServiceMethod::ClientConnect => &self.link,
        };

        outstanding.as_ref().map(|o| o.id) == Some(operation)
    }

    fn apply(&mut self, input: Input) {
        let mut pending = VecDeque::from([input]);

        while let Some(input) = pending.pop_front() {
            let Transition { snapshot, effects } = reduce(&self.snapshot, input, &self.filter);
            self.set_snapshot(snapshot);

            for effect in effects {
                if let Some(follow_up) = self.execute(effect) {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::CheckEnabled => {
                if self.enable_check.is_some() {
                    warn!("Enablement check already outstanding");
                    return None;
                }
                let responder = self.responder(ServiceMethod::IsEnabled);
                let id = responder.operation();
                let handle = self.transport.check_enabled(responder);
                self.enable_check = Some(Outstanding { id, handle });
            }
            Effect::ReleaseEnableCheck => {
                if let Some(outstanding) = self.enable_check.take() {
                    outstanding.release();
                }
            }
            Effect::StartScan => {
                if self.scan.is_some() {
                    warn!("Scan already outstanding");
                    return None;
                }
                let responder = self.responder(ServiceMethod::StartScan);
                let id = responder.operation();
                let handle = self.transport.start_scan(responder);
                self.scan = Some(Outstanding { id, handle });
            }
            Effect::StopScan => {
                // The stop request and the handle release are independent.
                if let Some(outstanding) = self.scan.take() {
                    let responder = self.responder(ServiceMethod::StopScan);
                    self.transport.stop_scan(responder);
                    outstanding.release();
                }
            }
            Effect::Connect(address) => {
                if self.link.is_some() {
                    warn!("Connect already outstanding");
                    return None;
                }
                let responder = self.responder(ServiceMethod::ClientConnect);
                let id = responder.operation();
                let handle = self.transport.connect(&address, responder);
                self.link = Some(Outstanding { id, handle });
            }
            Effect::CancelConnect => {
                if let Some(outstanding) = self.link.take() {
                    outstanding.release();
                }
            }
            Effect::Notify(notice) => self.outbox.push(match notice {
                Notice::Log(line) => SinkUpdate::Log(line),
                Notice::Status(status) => SinkUpdate::Status(status),
                Notice::Button(connected) => SinkUpdate::Button(connected),
            }),
            Effect::Settle => return Some(Input::Settled),
        }

        None
    }

    fn responder<T: Into<TransportPayload>>(&mut self, method: ServiceMethod) -> Responder<T> {
        self.next_operation += 1;
        Responder::new(self.next_operation, method, self.events_tx.clone())
    }

    /// Update the snapshot and emit an event if the state changed.
    fn set_snapshot(&mut self, snapshot: Snapshot) {
        let previous = self.snapshot.state;
        self.snapshot = snapshot;

        if previous != self.snapshot.state {
            info!("Lifecycle state changed: {} -> {}", previous, self.snapshot.state);

            let _ = self.state_tx.send(ConnectionEvent {
                previous,
                state: self.snapshot.state,
                target_address: self.snapshot.session.target_address.clone(),
            });
        }
    }
}

impl std::fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("snapshot", &self.snapshot)
            .field("filter", &self.filter)
            .field("enable_check", &self.enable_check)
            .field("scan", &self.scan)
            .field("link", &self.link)
            .finish()
    }
}
