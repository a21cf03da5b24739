//! RetroSync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteEntry`, `SyncTarget`, `BackupSet`, `PhaseResult`, `SyncLog`
//! - **Port definitions** - Traits for adapters: `ICatalogGateway`, `IDeviceTransport`,
//!   `IPlaylistMaterializer`
//! - **Configuration** - YAML-backed settings and device address resolution
//!
//! # Architecture
//!
//! The domain module contains pure data types and invariants with no I/O.
//! Ports define the trait interfaces that adapter crates implement
//! (`retrosync-device`, `retrosync-cache`, `retrosync-sync`).

pub mod config;
pub mod domain;
pub mod ports;
