//! Integration tests for retrosync-device
//!
//! Uses wiremock to simulate the RetroArch WebUI endpoints for the HTTP
//! transport, and the in-memory simulated device for the storage client's
//! idempotency, guard and repair behaviour.

mod common;

mod test_client;
mod test_transport;
