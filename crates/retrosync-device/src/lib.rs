//! RetroSync Device - client for the RetroArch WebUI file API
//!
//! Provides:
//! - A defensive, rate-limited storage client that enforces idempotent
//!   directory creation, the protected-path guard and directory repair
//! - A reqwest transport for the device HTTP endpoints
//! - A simulated in-memory device for tests (feature `testing`)
//!
//! ## Modules
//!
//! - [`client`] - [`RemoteStorageClient`], the only component that mutates the device
//! - [`transport`] - [`HttpDeviceTransport`], one HTTP request per call
//! - [`rate_limit`] - [`MutationGate`], fixed-interval pacing of mutations

pub mod client;
pub mod rate_limit;
pub mod transport;

#[cfg(feature = "testing")]
pub mod testing;

pub use client::{
    critical_directories, is_protected, ClearOutcome, ClientOptions, ConnectionStatus,
    CreateOutcome, RemoteStorageClient, PROTECTED_PATHS,
};
pub use rate_limit::{MutationGate, MutationPermit};
pub use transport::{HttpDeviceTransport, TransportTimeouts};
