//! Host Bluetooth transport.
//!
//! Implements [`BleTransport`] on top of `btleplug`. Every request runs as a
//! Tokio task that reports through its [`Responder`]; canceling the returned
//! handle aborts the task. Canceling a connect handle also disconnects the
//! peripheral.

use btleplug::api::{
    Central, CentralEvent, CentralState, CharPropFlags, Manager as _, Peripheral as _,
    PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{BleTransport, OperationHandle, Responder};
use crate::ble::uuids::{is_telemetry_service, service_label};
use crate::data::{Device, ScanResult};
use crate::error::{Error, Result, TransportFailure};
use crate::protocol::{GattEvent, ServiceMethod};

/// [`BleTransport`] over the host Bluetooth adapter.
pub struct BtleplugTransport {
    /// The BLE adapter.
    adapter: Adapter,
    /// Runtime the request tasks are spawned on.
    runtime: Handle,
}

impl BtleplugTransport {
    /// Open the first Bluetooth adapter of the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BluetoothUnavailable`] if the host has no Bluetooth
    /// stack or no adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Use a specific adapter. Must be called from within a Tokio runtime.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            runtime: Handle::current(),
        }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn spawn<F>(&self, method: ServiceMethod, task: F) -> OperationHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = self.runtime.spawn(task);
        OperationHandle::new(method, move || task.abort())
    }
}

impl BleTransport for BtleplugTransport {
    fn check_enabled(&self, responder: Responder<bool>) -> OperationHandle {
        let adapter = self.adapter.clone();
        self.spawn(ServiceMethod::IsEnabled, watch_state(adapter, responder))
    }

    fn start_scan(&self, responder: Responder<ScanResult>) -> OperationHandle {
        let adapter = self.adapter.clone();
        self.spawn(ServiceMethod::StartScan, scan(adapter, responder))
    }

    fn stop_scan(&self, responder: Responder<()>) {
        let adapter = self.adapter.clone();

        self.runtime.spawn(async move {
            match adapter.stop_scan().await {
                Ok(()) => {
                    info!("BLE scan stopped");
                    responder.success(());
                }
                Err(e) => {
                    warn!("Failed to stop scan: {}", e);
                    responder.failure((&e).into());
                }
            }
        });
    }

    fn connect(&self, address: &str, responder: Responder<GattEvent>) -> OperationHandle {
        let linked: Arc<Mutex<Option<Peripheral>>> = Arc::new(Mutex::new(None));
        let task = self.runtime.spawn(link(
            self.adapter.clone(),
            address.to_string(),
            linked.clone(),
            responder,
        ));

        let runtime = self.runtime.clone();
        OperationHandle::new(ServiceMethod::ClientConnect, move || {
            task.abort();

            if let Some(peripheral) = linked.lock().take() {
                runtime.spawn(async move {
                    match peripheral.disconnect().await {
                        Ok(()) => info!("Disconnected from trainer"),
                        Err(e) => warn!("Failed to disconnect: {}", e),
                    }
                });
            }
        })
    }
}

/// Report the adapter state now and on every change.
async fn watch_state(adapter: Adapter, responder: Responder<bool>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to get adapter events: {}", e);
            responder.failure((&e).into());
            return;
        }
    };

    match adapter.adapter_state().await {
        Ok(state) => {
            if let Some(enabled) = is_powered_on(&state) {
                if !responder.success(enabled) {
                    return;
                }
            }
        }
        Err(e) => {
            responder.failure((&e).into());
            return;
        }
    }

    while let Some(event) = events.next().await {
        if let CentralEvent::StateUpdate(state) = event {
            debug!("Adapter state update: {:?}", state);
            if let Some(enabled) = is_powered_on(&state) {
                if !responder.success(enabled) {
                    break;
                }
            }
        }
    }

    trace!("Adapter state watch ended");
}

/// `None` while the host has not determined the state yet.
fn is_powered_on(state: &CentralState) -> Option<bool> {
    match state {
        CentralState::PoweredOn => Some(true),
        CentralState::PoweredOff => Some(false),
        _ => None,
    }
}

/// Scan and report every discovered or updated peripheral.
async fn scan(adapter: Adapter, responder: Responder<ScanResult>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to get adapter events: {}", e);
            responder.failure((&e).into());
            return;
        }
    };

    if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
        responder.failure((&e).into());
        return;
    }

    info!("BLE scan started");

    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };

        let Some(device) = describe(&adapter, &id).await else {
            continue;
        };

        trace!("Scan result: {}", device);
        if !responder.success(ScanResult::new(vec![device])) {
            break;
        }
    }

    debug!("Scan event loop ended");
}

async fn describe(adapter: &Adapter, id: &PeripheralId) -> Option<Device> {
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok()??;

    Some(Device::new(
        properties.local_name.clone().unwrap_or_default(),
        device_address(&peripheral, &properties),
    ))
}

/// Hosts that hide the MAC address (macOS) report all zeros; use the
/// platform identifier there.
fn device_address(peripheral: &Peripheral, properties: &PeripheralProperties) -> String {
    if properties.address.into_inner() == [0; 6] {
        peripheral.id().to_string()
    } else {
        properties.address.to_string()
    }
}

async fn find_peripheral(adapter: &Adapter, address: &str) -> Option<Peripheral> {
    let peripherals = match adapter.peripherals().await {
        Ok(peripherals) => peripherals,
        Err(e) => {
            warn!("Failed to list peripherals: {}", e);
            return None;
        }
    };

    for peripheral in peripherals {
        if let Ok(Some(properties)) = peripheral.properties().await {
            if device_address(&peripheral, &properties).eq_ignore_ascii_case(address) {
                return Some(peripheral);
            }
        }
    }

    None
}

/// Connect, report link and service events, then stream notifications
/// until the peripheral goes away.
async fn link(
    adapter: Adapter,
    address: String,
    linked: Arc<Mutex<Option<Peripheral>>>,
    responder: Responder<GattEvent>,
) {
    let Some(peripheral) = find_peripheral(&adapter, &address).await else {
        responder.failure(TransportFailure::new(
            TransportFailure::DEVICE_NOT_FOUND,
            Error::DeviceNotFound { address }.to_string(),
        ));
        return;
    };

    let mut central = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            responder.failure((&e).into());
            return;
        }
    };

    *linked.lock() = Some(peripheral.clone());

    if let Err(e) = peripheral.connect().await {
        warn!("Connection to {} failed: {}", address, e);
        linked.lock().take();
        responder.failure((&e).into());
        return;
    }

    info!("Connected to {}", address);
    if !responder.success(GattEvent::connection_state_change(true)) {
        return;
    }

    match peripheral.discover_services().await {
        Ok(()) => {
            let uuids: Vec<Uuid> = peripheral.services().iter().map(|s| s.uuid).collect();
            responder.success(GattEvent::services_discovered(services_payload(&uuids)));
            subscribe_telemetry(&peripheral).await;
        }
        Err(e) => warn!("Failed to discover services: {}", e),
    }

    let mut notifications = match peripheral.notifications().await {
        Ok(notifications) => notifications,
        Err(e) => {
            warn!("Notifications unavailable: {}", e);
            stream::empty().boxed()
        }
    };

    let id = peripheral.id();

    loop {
        tokio::select! {
            Some(notification) = notifications.next() => {
                let event = GattEvent::characteristic_changed(json!({
                    "uuid": notification.uuid.to_string(),
                    "value": notification.value,
                }));
                if !responder.success(event) {
                    break;
                }
            }
            Some(event) = central.next() => {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        info!("Trainer {} dropped the link", address);
                        linked.lock().take();
                        responder.success(GattEvent::connection_state_change(false));
                        break;
                    }
                }
            }
            else => break,
        }
    }

    debug!("Link task for {} ended", address);
}

async fn subscribe_telemetry(peripheral: &Peripheral) {
    for service in peripheral.services() {
        if !is_telemetry_service(&service.uuid) {
            continue;
        }

        for characteristic in &service.characteristics {
            if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
                continue;
            }

            match peripheral.subscribe(characteristic).await {
                Ok(()) => debug!("Subscribed to {}", characteristic.uuid),
                Err(e) => warn!("Failed to subscribe to {}: {}", characteristic.uuid, e),
            }
        }
    }
}

/// `servicesDiscovered` values: every service with its label, if known.
fn services_payload(uuids: &[Uuid]) -> Value {
    let services: Vec<Value> = uuids
        .iter()
        .map(|uuid| {
            json!({
                "uuid": uuid.to_string(),
                "label": service_label(uuid),
            })
        })
        .collect();

    json!({ "services": services })
}
