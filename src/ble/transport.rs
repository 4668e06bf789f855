//! BLE transport capability.
//!
//! The connection state machine talks to the radio only through the
//! [`BleTransport`] trait. Each request is handed a [`Responder`] that
//! delivers results and failures as [`TransportEvent`]s on the machine's
//! event channel, and returns an [`OperationHandle`] that cancels the
//! request. Nothing here blocks: transports do their work on spawned tasks
//! (or, in tests, answer synchronously into the channel).

use std::marker::PhantomData;

use tokio::sync::mpsc;
use tracing::trace;

use crate::data::ScanResult;
use crate::error::TransportFailure;
use crate::protocol::{GattEvent, ServiceMethod};

/// Identifier of one transport request, unique per state machine.
pub type OperationId = u64;

/// Cancelable subscription representing one outstanding transport request.
///
/// Canceling is idempotent and safe after the underlying operation already
/// completed. Dropping a handle cancels it.
pub struct OperationHandle {
    method: ServiceMethod,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
    canceled: bool,
}

impl OperationHandle {
    /// Create a handle that runs `on_cancel` the first time it is canceled.
    pub fn new(method: ServiceMethod, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            method,
            on_cancel: Some(Box::new(on_cancel)),
            canceled: false,
        }
    }

    /// Create a handle with nothing to release on cancel.
    pub fn detached(method: ServiceMethod) -> Self {
        Self {
            method,
            on_cancel: None,
            canceled: false,
        }
    }

    /// The request this handle belongs to.
    pub fn method(&self) -> ServiceMethod {
        self.method
    }

    /// Cancel the subscription.
    pub fn cancel(&mut self) {
        if self.canceled {
            return;
        }

        self.canceled = true;
        trace!("Canceling {} subscription", self.method);

        if let Some(f) = self.on_cancel.take() {
            f();
        }
    }

    /// Check if the handle has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("method", &self.method)
            .field("canceled", &self.canceled)
            .finish()
    }
}

impl Drop for OperationHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Successful result payload of a transport request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportPayload {
    /// Adapter enablement state from `isEnabled`.
    Enabled(bool),
    /// A batch of devices from `startScan`.
    Scan(ScanResult),
    /// Acknowledgment of `stopScan`.
    ScanStopped,
    /// A GATT event from `client/connect`.
    Gatt(GattEvent),
}

impl From<bool> for TransportPayload {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<ScanResult> for TransportPayload {
    fn from(result: ScanResult) -> Self {
        Self::Scan(result)
    }
}

impl From<()> for TransportPayload {
    fn from(_: ()) -> Self {
        Self::ScanStopped
    }
}

impl From<GattEvent> for TransportPayload {
    fn from(event: GattEvent) -> Self {
        Self::Gatt(event)
    }
}

/// One result or failure delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// The request that produced this event.
    pub operation: OperationId,
    /// The method of that request.
    pub method: ServiceMethod,
    /// Result or failure.
    pub outcome: Result<TransportPayload, TransportFailure>,
}

/// Delivers results of one transport request back to the state machine.
///
/// The type parameter fixes which payload the request produces.
pub struct Responder<T> {
    operation: OperationId,
    method: ServiceMethod,
    events: mpsc::UnboundedSender<TransportEvent>,
    _payload: PhantomData<fn(T)>,
}

impl<T> Clone for Responder<T> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation,
            method: self.method,
            events: self.events.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .finish()
    }
}

impl<T: Into<TransportPayload>> Responder<T> {
    /// Create a responder for operation `operation`.
    pub fn new(
        operation: OperationId,
        method: ServiceMethod,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            operation,
            method,
            events,
            _payload: PhantomData,
        }
    }

    /// The operation this responder answers for.
    pub fn operation(&self) -> OperationId {
        self.operation
    }

    /// The method of the request.
    pub fn method(&self) -> ServiceMethod {
        self.method
    }

    /// Deliver a successful result.
    ///
    /// Returns `false` when the receiving side is gone.
    pub fn success(&self, value: T) -> bool {
        self.send(Ok(value.into()))
    }

    /// Deliver a failure.
    ///
    /// Returns `false` when the receiving side is gone.
    pub fn failure(&self, failure: TransportFailure) -> bool {
        self.send(Err(failure))
    }

    /// Check if the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn send(&self, outcome: Result<TransportPayload, TransportFailure>) -> bool {
        self.events
            .send(TransportEvent {
                operation: self.operation,
                method: self.method,
                outcome,
            })
            .is_ok()
    }
}

/// Capability interface over a host BLE stack.
///
/// Implementations must never block the caller. `stop_scan` must be safe to
/// call when no scan is running.
pub trait BleTransport: Send + Sync {
    /// Subscribe to the adapter enablement state.
    fn check_enabled(&self, responder: Responder<bool>) -> OperationHandle;

    /// Start scanning; each discovery batch is delivered as a [`ScanResult`].
    fn start_scan(&self, responder: Responder<ScanResult>) -> OperationHandle;

    /// Ask the host to stop scanning. The acknowledgment is informational.
    fn stop_scan(&self, responder: Responder<()>);

    /// Connect to `address` and subscribe to its GATT events.
    fn connect(&self, address: &str, responder: Responder<GattEvent>) -> OperationHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cancel_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut handle = OperationHandle::new(ServiceMethod::StartScan, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.cancel();
        handle.cancel();
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = OperationHandle::new(ServiceMethod::ClientConnect, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_handle() {
        let mut handle = OperationHandle::detached(ServiceMethod::IsEnabled);
        assert!(!handle.is_canceled());
        handle.cancel();
        assert!(handle.is_canceled());
        assert_eq!(handle.method(), ServiceMethod::IsEnabled);
    }

    #[test]
    fn test_responder_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let responder: Responder<bool> = Responder::new(7, ServiceMethod::IsEnabled, tx);

        assert!(responder.success(true));
        assert!(responder.failure(TransportFailure::new(3, "off")));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.operation, 7);
        assert_eq!(first.method, ServiceMethod::IsEnabled);
        assert_eq!(first.outcome, Ok(TransportPayload::Enabled(true)));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.outcome, Err(TransportFailure::new(3, "off")));
    }

    #[test]
    fn test_responder_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let responder: Responder<()> = Responder::new(1, ServiceMethod::StopScan, tx);
        drop(rx);

        assert!(responder.is_closed());
        assert!(!responder.success(()));
    }
}
