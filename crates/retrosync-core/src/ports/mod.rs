//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICatalogGateway`] - Read access to ROM and platform records
//! - [`IDeviceTransport`] - Raw requests against the device file API
//! - [`IPlaylistMaterializer`] - Playlist documents per platform group

pub mod catalog;
pub mod device_transport;
pub mod playlist;

pub use catalog::{CatalogError, CatalogPlatform, CatalogRom, ICatalogGateway, RomFilter};
pub use device_transport::{IDeviceTransport, RawEntry, UploadBody};
pub use playlist::{IPlaylistMaterializer, PlaylistDocument, PlaylistEntry, PlaylistError};
