//! Connection lifecycle transitions.
//!
//! The lifecycle is a pure reducer: [`reduce`] maps the current
//! [`Snapshot`] and one [`Input`] to the next snapshot plus a list of
//! [`Effect`]s. It never touches the transport or the sink; the
//! [`ConnectionStateMachine`](crate::ble::ConnectionStateMachine) executes
//! the effects.
//!
//! ```text
//! Idle -> CheckingEnabled -> Scanning -> TargetFound -> AwaitingLink -> Connected
//!   ^            |               |                           |             |
//!   +------------+---------------+------- failure -----------+             |
//!   +---------------------------- Disconnecting <-------------------------+
//! ```

use crate::ble::filter::DeviceFilter;
use crate::data::{ConnectionSession, ScanResult};
use crate::error::TransportFailure;
use crate::protocol::ServiceMethod;

/// Status line while a connection attempt is in progress.
pub const STATUS_CONNECTING: &str = "Connecting...";
/// Status line once the trainer link is up.
pub const STATUS_CONNECTED: &str = "Connected";
/// Status line after a disconnect.
pub const STATUS_DISCONNECTED: &str = "Disconnected";
/// Status line after a failed attempt.
pub const STATUS_FAILED: &str = "Connection failed";
/// Status line when the adapter reports it is switched off.
pub const STATUS_BLUETOOTH_DISABLED: &str = "Bluetooth is disabled";

/// Sub-state of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectPhase {
    /// Waiting for the adapter to report it is enabled.
    CheckingEnabled,
    /// Scanning for the target trainer.
    Scanning,
    /// A scan result matched; the scan is being stopped.
    TargetFound,
    /// A connect request is outstanding.
    AwaitingLink,
}

/// Lifecycle state of the trainer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No connection and no attempt in progress.
    #[default]
    Idle,
    /// A connection attempt is in progress.
    Connecting(ConnectPhase),
    /// Connected to the trainer.
    Connected,
    /// A local disconnect is tearing the connection down.
    Disconnecting,
}

impl LifecycleState {
    /// Check if idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if an attempt is in progress.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting(_))
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting(ConnectPhase::CheckingEnabled) => write!(f, "CheckingEnabled"),
            Self::Connecting(ConnectPhase::Scanning) => write!(f, "Scanning"),
            Self::Connecting(ConnectPhase::TargetFound) => write!(f, "TargetFound"),
            Self::Connecting(ConnectPhase::AwaitingLink) => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Lifecycle state together with the session it owns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Current state.
    pub state: LifecycleState,
    /// Current session.
    pub session: ConnectionSession,
}

impl Snapshot {
    fn reset() -> Self {
        Self::default()
    }

    fn with_state(&self, state: LifecycleState) -> Self {
        Self {
            state,
            session: self.session.clone(),
        }
    }
}

/// Something that happened, fed to [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// The user asked to connect.
    Connect,
    /// The user asked to disconnect.
    Disconnect,
    /// Local teardown finished.
    Settled,
    /// The adapter reported its enablement state.
    Enabled(bool),
    /// A scan batch arrived.
    Devices(ScanResult),
    /// The stop-scan request was acknowledged.
    ScanStopped,
    /// The GATT link went up or down.
    Link(bool),
    /// A transport request failed.
    Failed {
        /// The request that failed.
        method: ServiceMethod,
        /// What the transport reported.
        failure: TransportFailure,
    },
}

/// A message for the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Append a line to the log.
    Log(String),
    /// Replace the status line.
    Status(String),
    /// Switch the connect button between its two labels.
    Button(bool),
}

/// Work the state machine must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the enablement subscription.
    CheckEnabled,
    /// Cancel the enablement subscription.
    ReleaseEnableCheck,
    /// Open the scan subscription.
    StartScan,
    /// Stop scanning: notify the transport and cancel the scan handle.
    StopScan,
    /// Open a connect subscription to the address.
    Connect(String),
    /// Cancel the connect subscription.
    CancelConnect,
    /// Tell the sink something.
    Notify(Notice),
    /// Feed [`Input::Settled`] back once the other effects ran.
    Settle,
}

/// Result of one reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The snapshot after the input.
    pub snapshot: Snapshot,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(current: &Snapshot) -> Self {
        Self {
            snapshot: current.clone(),
            effects: Vec::new(),
        }
    }

    fn stay_with(current: &Snapshot, notice: Notice) -> Self {
        Self {
            snapshot: current.clone(),
            effects: vec![Effect::Notify(notice)],
        }
    }

    fn to(snapshot: Snapshot, effects: Vec<Effect>) -> Self {
        Self { snapshot, effects }
    }
}

fn log(message: impl Into<String>) -> Effect {
    Effect::Notify(Notice::Log(message.into()))
}

fn status(message: &str) -> Effect {
    Effect::Notify(Notice::Status(message.to_string()))
}

fn button(connected: bool) -> Effect {
    Effect::Notify(Notice::Button(connected))
}

/// Effects that release every outstanding subscription.
fn release_all() -> [Effect; 3] {
    [
        Effect::ReleaseEnableCheck,
        Effect::StopScan,
        Effect::CancelConnect,
    ]
}

/// Compute the transition for `input` in `current`.
pub fn reduce(current: &Snapshot, input: Input, filter: &DeviceFilter) -> Transition {
    use ConnectPhase::*;
    use LifecycleState::*;

    match (current.state, input) {
        (Idle, Input::Connect) => Transition::to(
            Snapshot {
                state: Connecting(CheckingEnabled),
                session: ConnectionSession::started(),
            },
            vec![
                button(true),
                status(STATUS_CONNECTING),
                log("Checking BLE state..."),
                Effect::CheckEnabled,
            ],
        ),
        (_, Input::Connect) => Transition::stay_with(
            current,
            Notice::Log("Already connecting or connected; ignoring connect request".into()),
        ),

        (Idle, Input::Disconnect) => {
            Transition::stay_with(current, Notice::Log("Not currently connected".into()))
        }
        (Disconnecting, Input::Disconnect) => Transition::stay(current),
        (_, Input::Disconnect) => {
            let mut effects = release_all().to_vec();
            effects.extend([
                button(false),
                status(STATUS_DISCONNECTED),
                log("Disconnected"),
                Effect::Settle,
            ]);

            Transition::to(
                Snapshot {
                    state: Disconnecting,
                    session: ConnectionSession::default(),
                },
                effects,
            )
        }
        (Disconnecting, Input::Settled) => Transition::to(Snapshot::reset(), Vec::new()),
        (_, Input::Settled) => Transition::stay(current),

        (Connecting(CheckingEnabled), Input::Enabled(true)) => Transition::to(
            current.with_state(Connecting(Scanning)),
            vec![
                Effect::ReleaseEnableCheck,
                log("Starting BLE scan..."),
                Effect::StartScan,
            ],
        ),
        (Connecting(CheckingEnabled), Input::Enabled(false)) => Transition::to(
            Snapshot::reset(),
            vec![
                Effect::ReleaseEnableCheck,
                log("BLE is disabled or unavailable on this host."),
                button(false),
                status(STATUS_BLUETOOTH_DISABLED),
            ],
        ),
        (_, Input::Enabled(_)) => Transition::stay(current),

        (Connecting(Scanning), Input::Devices(result)) => {
            let Some(device) = filter.select_target(result.devices()) else {
                return Transition::stay(current);
            };

            // TargetFound is only held while the scan is being stopped.
            let address = device.address.clone();
            let found = Snapshot {
                state: Connecting(TargetFound),
                session: current.session.clone().with_target(address.clone()),
            };

            Transition::to(
                found.with_state(Connecting(AwaitingLink)),
                vec![
                    log(format!("Found target device: {}", device)),
                    Effect::StopScan,
                    log(format!("Connecting to {}...", address)),
                    Effect::Connect(address),
                ],
            )
        }
        (_, Input::Devices(_)) => Transition::stay(current),

        (_, Input::ScanStopped) => Transition::stay_with(current, Notice::Log("Stopped scan".into())),

        (Connecting(AwaitingLink), Input::Link(true)) => Transition::to(
            current.with_state(Connected),
            vec![log("Trainer connected!"), status(STATUS_CONNECTED)],
        ),
        (Connecting(AwaitingLink), Input::Link(false)) => {
            let target = current.session.target_address.clone().unwrap_or_default();
            Transition::to(
                Snapshot::reset(),
                vec![
                    Effect::CancelConnect,
                    log(format!("Connection to {} was refused.", target)),
                    button(false),
                    status(STATUS_FAILED),
                ],
            )
        }
        (Connected, Input::Link(false)) => Transition::to(
            Snapshot::reset(),
            vec![
                Effect::CancelConnect,
                log("Trainer disconnected."),
                button(false),
                status(STATUS_DISCONNECTED),
            ],
        ),
        (_, Input::Link(_)) => Transition::stay(current),

        (state, Input::Failed { method, failure }) => {
            let line = log(format!("{} error: {}", method, failure));

            // The scan handle is already released when stopScan answers.
            if method == ServiceMethod::StopScan || !(state.is_connecting() || state.is_connected()) {
                return Transition::to(current.clone(), vec![line]);
            }

            let mut effects = vec![line];
            effects.extend(release_all());
            effects.extend([button(false), status(STATUS_FAILED)]);
            Transition::to(Snapshot::reset(), effects)
        }
    }
}
