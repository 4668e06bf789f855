//! Trainer controller: the public entry point.
//!
//! Picks a backend once, at construction, and forwards `connect`,
//! `disconnect` and `toggle` to it. The BLE backend runs the connection
//! state machine; the simulated backend skips discovery and streams
//! synthetic telemetry.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ble::connection::ConnectionStateMachine;
use crate::ble::dispatcher::GattDispatcher;
use crate::ble::lifecycle::{LifecycleState, STATUS_CONNECTING, STATUS_DISCONNECTED};
use crate::ble::platform::BtleplugTransport;
use crate::ble::transport::BleTransport;
use crate::config::ControllerConfig;
use crate::error::Result;
use crate::protocol::GattEvent;
use crate::simulator::TelemetrySimulator;
use crate::sink::TelemetrySink;
use crate::utils::STATS_PLACEHOLDER;

/// Status line shown before the first connect.
pub const STATUS_READY: &str = "Press Connect";

/// What the host can do, decided once.
#[derive(Clone)]
pub enum Capability {
    /// A Bluetooth stack is available through this transport.
    Bluetooth(Arc<dyn BleTransport>),
    /// No Bluetooth; fabricate telemetry.
    Simulator,
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bluetooth(_) => write!(f, "Bluetooth"),
            Self::Simulator => write!(f, "Simulator"),
        }
    }
}

/// One way of producing telemetry.
#[cfg_attr(test, mockall::automock)]
pub trait TrainerBackend: Send + Sync {
    /// Start a session.
    fn connect(&self);

    /// End the session.
    fn disconnect(&self);

    /// Check if a session is running (connecting or connected).
    fn is_active(&self) -> bool;

    /// Lifecycle state of the session.
    fn state(&self) -> LifecycleState;

    /// Feed a GATT event pushed by the host.
    fn handle_inbound_event(&self, event: GattEvent);

    /// Check if this backend fabricates its data.
    fn is_simulated(&self) -> bool;

    /// Stop background work. Returns the task to wait for, if any.
    fn shutdown(&self) -> Option<JoinHandle<()>>;
}

/// Backend that streams simulator samples. No discovery or connect phase.
pub struct SimulatedTrainer {
    simulator: TelemetrySimulator,
    sink: Arc<dyn TelemetrySink>,
}

impl SimulatedTrainer {
    /// Create a simulated trainer reporting to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulator settings are invalid.
    pub fn new(config: &ControllerConfig, sink: Arc<dyn TelemetrySink>) -> Result<Self> {
        let simulator = TelemetrySimulator::new(config.simulator.clone(), sink.clone())?;
        Ok(Self { simulator, sink })
    }
}

impl TrainerBackend for SimulatedTrainer {
    fn connect(&self) {
        if self.simulator.is_running() {
            self.sink
                .log("Already connecting or connected; ignoring connect request");
            return;
        }

        self.sink.set_button_connected(true);
        self.sink.set_status(STATUS_CONNECTING);
        self.sink
            .log("Simulator detected; skipping BLE initialization.");

        let sink = self.sink.clone();
        self.simulator.start(move |sample| {
            sink.set_stats(&sample.power_text(), &sample.cadence_text());
        });
    }

    /// Ends on status "Disconnected", not "Disconnecting...": the simulator
    /// has no teardown phase that would later settle the status.
    fn disconnect(&self) {
        if !self.simulator.stop() {
            self.sink.log("Not currently connected");
            return;
        }

        self.sink.set_button_connected(false);
        self.sink.set_status(STATUS_DISCONNECTED);
        self.sink.log("Simulation stopped");
    }

    fn is_active(&self) -> bool {
        self.simulator.is_running()
    }

    fn state(&self) -> LifecycleState {
        if self.simulator.is_running() {
            LifecycleState::Connected
        } else {
            LifecycleState::Idle
        }
    }

    fn handle_inbound_event(&self, event: GattEvent) {
        debug!("Simulator ignoring inbound {} event", event.kind);
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.simulator.stop();
        None
    }
}

/// Backend that drives a real trainer through a [`BleTransport`].
pub struct BleTrainer {
    machine: Arc<Mutex<ConnectionStateMachine>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl BleTrainer {
    /// Create the state machine and spawn the task that feeds it transport
    /// events. Must be called from within a Tokio runtime.
    pub fn new(
        transport: Arc<dyn BleTransport>,
        config: &ControllerConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self::with_dispatcher(transport, config, sink, GattDispatcher::new())
    }

    /// Like [`new`](Self::new), routing GATT events through `dispatcher`.
    pub fn with_dispatcher(
        transport: Arc<dyn BleTransport>,
        config: &ControllerConfig,
        sink: Arc<dyn TelemetrySink>,
        dispatcher: GattDispatcher,
    ) -> Self {
        let (machine, mut events) =
            ConnectionStateMachine::new(transport, sink, config.device_filter());
        let machine = Arc::new(Mutex::new(machine.with_dispatcher(dispatcher)));

        let driven = machine.clone();
        let driver = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let updates = driven.lock().handle_event(event);
                updates.deliver();
            }

            debug!("Transport event loop ended");
        });

        Self {
            machine,
            driver: Mutex::new(Some(driver)),
        }
    }

    /// Shared access to the state machine.
    pub fn machine(&self) -> Arc<Mutex<ConnectionStateMachine>> {
        self.machine.clone()
    }
}

impl TrainerBackend for BleTrainer {
    fn connect(&self) {
        let updates = self.machine.lock().connect();
        updates.deliver();
    }

    fn disconnect(&self) {
        let updates = self.machine.lock().disconnect();
        updates.deliver();
    }

    fn is_active(&self) -> bool {
        self.machine.lock().is_active()
    }

    fn state(&self) -> LifecycleState {
        self.machine.lock().state()
    }

    fn handle_inbound_event(&self, event: GattEvent) {
        let updates = self.machine.lock().handle_gatt_event(event);
        updates.deliver();
    }

    fn is_simulated(&self) -> bool {
        false
    }

    fn shutdown(&self) -> Option<JoinHandle<()>> {
        let driver = self.driver.lock().take()?;
        driver.abort();
        Some(driver)
    }
}

impl Drop for BleTrainer {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

/// Public entry point for connecting to a trainer.
pub struct TrainerController {
    backend: Box<dyn TrainerBackend>,
    sink: Arc<dyn TelemetrySink>,
}

impl TrainerController {
    /// Create a controller for `capability` and reset the sink to its
    /// initial display. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        capability: Capability,
        config: ControllerConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        Self::with_dispatcher(capability, config, sink, GattDispatcher::new())
    }

    /// Like [`new`](Self::new), routing GATT events through `dispatcher`.
    ///
    /// Use this to install a [`TelemetryDecoder`](crate::ble::TelemetryDecoder)
    /// for characteristic notifications. The simulator has no GATT events
    /// and ignores the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_dispatcher(
        capability: Capability,
        config: ControllerConfig,
        sink: Arc<dyn TelemetrySink>,
        dispatcher: GattDispatcher,
    ) -> Result<Self> {
        config.validate()?;

        info!("Creating trainer controller ({:?})", capability);

        let backend: Box<dyn TrainerBackend> = match capability {
            Capability::Bluetooth(transport) => Box::new(BleTrainer::with_dispatcher(
                transport,
                &config,
                sink.clone(),
                dispatcher,
            )),
            Capability::Simulator => {
                if dispatcher.has_decoder() {
                    debug!("Simulator selected; telemetry decoder unused");
                }
                Box::new(SimulatedTrainer::new(&config, sink.clone())?)
            }
        };

        Ok(Self::with_backend(backend, sink))
    }

    /// Open the host Bluetooth adapter, or fall back to the simulator when
    /// the host has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the adapter
    /// fails for a reason other than being unavailable.
    pub async fn detect(config: ControllerConfig, sink: Arc<dyn TelemetrySink>) -> Result<Self> {
        config.validate()?;

        let capability = match BtleplugTransport::new().await {
            Ok(transport) => Capability::Bluetooth(Arc::new(transport)),
            Err(e) if e.is_unavailable() => {
                warn!("{}; falling back to the simulator", e);
                Capability::Simulator
            }
            Err(e) => return Err(e),
        };

        Self::new(capability, config, sink)
    }

    fn with_backend(backend: Box<dyn TrainerBackend>, sink: Arc<dyn TelemetrySink>) -> Self {
        sink.set_button_connected(false);
        sink.set_status(STATUS_READY);
        sink.set_stats(STATS_PLACEHOLDER, STATS_PLACEHOLDER);

        Self { backend, sink }
    }

    /// Start a session.
    pub fn connect(&self) {
        self.backend.connect();
    }

    /// End the session.
    pub fn disconnect(&self) {
        self.backend.disconnect();
    }

    /// Disconnect when a session is running, connect otherwise.
    pub fn toggle(&self) {
        if self.backend.is_active() {
            self.backend.disconnect();
        } else {
            self.backend.connect();
        }
    }

    /// Feed a GATT event pushed by the host. Ignored in simulator mode.
    pub fn handle_inbound_event(&self, event: GattEvent) {
        self.backend.handle_inbound_event(event);
    }

    /// Check if a session is running (connecting or connected).
    pub fn is_active(&self) -> bool {
        self.backend.is_active()
    }

    /// Lifecycle state of the session.
    pub fn state(&self) -> LifecycleState {
        self.backend.state()
    }

    /// Check if the simulator backend was selected.
    pub fn is_simulated(&self) -> bool {
        self.backend.is_simulated()
    }

    /// The sink updates are reported to.
    pub fn sink(&self) -> &Arc<dyn TelemetrySink> {
        &self.sink
    }

    /// End any running session and stop background tasks.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down trainer controller");

        if self.backend.is_active() {
            self.backend.disconnect();
        }

        if let Some(task) = self.backend.shutdown() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Transport event loop failed: {}", e);
                }
            }
        }

        Ok(())
    }
}
