//! Scripted in-memory transport for tests.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::ble::connection::ConnectionStateMachine;
use crate::ble::transport::{BleTransport, OperationHandle, Responder, TransportEvent};
use crate::data::{Device, ScanResult};
use crate::error::TransportFailure;
use crate::protocol::{GattEvent, ServiceMethod, ServiceRequest};

/// How the stub answers each request, synchronously, before returning.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub enabled: Option<Result<bool, TransportFailure>>,
    pub scan: Vec<Result<ScanResult, TransportFailure>>,
    pub stop_scan: Option<Result<(), TransportFailure>>,
    pub connect: Option<Result<GattEvent, TransportFailure>>,
}

#[derive(Default)]
struct Responders {
    enabled: Option<Responder<bool>>,
    scan: Option<Responder<ScanResult>>,
    connect: Option<Responder<GattEvent>>,
}

/// A transport that records requests and answers from a script.
#[derive(Default)]
pub(crate) struct StubTransport {
    script: Mutex<Script>,
    requests: Arc<Mutex<Vec<ServiceRequest>>>,
    cancels: Arc<Mutex<Vec<ServiceMethod>>>,
    responders: Mutex<Responders>,
}

impl StubTransport {
    /// Answers nothing; tests drive events through the `emit_*` methods.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enabled, one scan batch with a KICKR, stop ack, link up.
    pub fn answering() -> Arc<Self> {
        Self::scripted(Self::answering_script())
    }

    /// The script behind [`answering`](Self::answering).
    pub fn answering_script() -> Script {
        Script {
            enabled: Some(Ok(true)),
            scan: vec![Ok(ScanResult::new(vec![Device::new(
                "KICKR CORE",
                "AA:BB:CC:DD",
            )]))],
            stop_scan: Some(Ok(())),
            connect: Some(Ok(GattEvent::connection_state_change(true))),
        }
    }

    pub fn scripted(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    /// Every request, in order.
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().clone()
    }

    /// Method names of every request, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.requests().iter().map(|r| r.method.as_str()).collect()
    }

    /// Method names of the subscribing requests, in order.
    pub fn subscription_methods(&self) -> Vec<&'static str> {
        self.requests()
            .iter()
            .filter(|r| r.method.is_subscription())
            .map(|r| r.method.as_str())
            .collect()
    }

    /// How many times `method` was requested.
    pub fn count(&self, method: ServiceMethod) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    /// Methods whose handles were canceled, in order.
    pub fn cancels(&self) -> Vec<ServiceMethod> {
        self.cancels.lock().clone()
    }

    pub fn emit_enabled(&self, enabled: bool) -> bool {
        self.responders
            .lock()
            .enabled
            .as_ref()
            .map_or(false, |r| r.success(enabled))
    }

    pub fn emit_scan(&self, result: ScanResult) -> bool {
        self.responders
            .lock()
            .scan
            .as_ref()
            .map_or(false, |r| r.success(result))
    }

    pub fn emit_gatt(&self, event: GattEvent) -> bool {
        self.responders
            .lock()
            .connect
            .as_ref()
            .map_or(false, |r| r.success(event))
    }

    pub fn fail_connect(&self, failure: TransportFailure) -> bool {
        self.responders
            .lock()
            .connect
            .as_ref()
            .map_or(false, |r| r.failure(failure))
    }

    fn handle(&self, method: ServiceMethod) -> OperationHandle {
        let cancels = self.cancels.clone();
        OperationHandle::new(method, move || cancels.lock().push(method))
    }
}

impl BleTransport for StubTransport {
    fn check_enabled(&self, responder: Responder<bool>) -> OperationHandle {
        self.requests.lock().push(ServiceRequest::is_enabled());

        match self.script.lock().enabled.clone() {
            Some(Ok(enabled)) => {
                responder.success(enabled);
            }
            Some(Err(failure)) => {
                responder.failure(failure);
            }
            None => {}
        }

        self.responders.lock().enabled = Some(responder);
        self.handle(ServiceMethod::IsEnabled)
    }

    fn start_scan(&self, responder: Responder<ScanResult>) -> OperationHandle {
        self.requests.lock().push(ServiceRequest::start_scan());

        for outcome in self.script.lock().scan.clone() {
            match outcome {
                Ok(result) => responder.success(result),
                Err(failure) => responder.failure(failure),
            };
        }

        self.responders.lock().scan = Some(responder);
        self.handle(ServiceMethod::StartScan)
    }

    fn stop_scan(&self, responder: Responder<()>) {
        self.requests.lock().push(ServiceRequest::stop_scan());

        match self.script.lock().stop_scan.clone() {
            Some(Ok(())) => {
                responder.success(());
            }
            Some(Err(failure)) => {
                responder.failure(failure);
            }
            None => {}
        }
    }

    fn connect(&self, address: &str, responder: Responder<GattEvent>) -> OperationHandle {
        self.requests.lock().push(ServiceRequest::connect(address));

        match self.script.lock().connect.clone() {
            Some(Ok(event)) => {
                responder.success(event);
            }
            Some(Err(failure)) => {
                responder.failure(failure);
            }
            None => {}
        }

        self.responders.lock().connect = Some(responder);
        self.handle(ServiceMethod::ClientConnect)
    }
}

/// Feed every queued transport event to the machine.
pub(crate) fn pump(
    machine: &mut ConnectionStateMachine,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
) -> usize {
    let mut handled = 0;
    while let Ok(event) = events.try_recv() {
        machine.handle_event(event).deliver();
        handled += 1;
    }
    handled
}
