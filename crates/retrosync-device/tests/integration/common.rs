//! Shared test helpers for device integration tests

use std::sync::Arc;
use std::time::Duration;

use retrosync_device::testing::SimulatedDevice;
use retrosync_device::{
    ClientOptions, HttpDeviceTransport, MutationGate, RemoteStorageClient, TransportTimeouts,
};
use wiremock::MockServer;

/// Short timeouts so failure tests stay fast
pub fn test_timeouts() -> TransportTimeouts {
    TransportTimeouts {
        list: Duration::from_secs(2),
        mutation: Duration::from_secs(2),
        upload: Duration::from_secs(5),
        download: Duration::from_secs(5),
    }
}

/// Starts a mock server and returns a transport pointing at it
pub async fn setup_device_mock() -> (MockServer, HttpDeviceTransport) {
    let server = MockServer::start().await;
    let transport = HttpDeviceTransport::with_base_url(server.uri(), test_timeouts());
    (server, transport)
}

/// Options with no backoff and the given listing retries
pub fn options(list_retries: u32) -> ClientOptions {
    ClientOptions {
        list_retries,
        retry_backoff: Duration::ZERO,
        throttle_downloads: true,
    }
}

/// A simulated device with the standard layout, plus an unthrottled client
pub fn simulated_client() -> (Arc<SimulatedDevice>, RemoteStorageClient) {
    simulated_client_for(SimulatedDevice::with_standard_layout())
}

pub fn simulated_client_for(
    device: SimulatedDevice,
) -> (Arc<SimulatedDevice>, RemoteStorageClient) {
    let device = Arc::new(device);
    let client =
        RemoteStorageClient::with_gate(device.clone(), MutationGate::unthrottled(), options(2));
    (device, client)
}
