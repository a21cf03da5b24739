//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Catalog identifiers
// ============================================================================

/// Catalog identifier of a ROM record
///
/// Not stable across catalog rebuilds; never use it as a durable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RomId(i64);

impl RomId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl Display for RomId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RomId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::ValidationFailed(format!("Invalid ROM id '{s}': {e}")))
    }
}

impl From<i64> for RomId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Catalog identifier of a platform record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformId(i64);

impl PlatformId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl Display for PlatformId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PlatformId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// Maximum accepted length of a content hash string
const MAX_HASH_LEN: usize = 128;

/// Stable digest of a ROM file's bytes
///
/// Used as the directory name of the ROM's save backup, so it is restricted
/// to ASCII alphanumerics, `-` and `_`. Hex digests are normalized to
/// lowercase so that `ABC123` and `abc123` address the same backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the value is empty, too long,
    /// or contains characters that are unsafe in a directory name.
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        let trimmed = hash.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidHash("Hash cannot be empty".to_string()));
        }
        if trimmed.len() > MAX_HASH_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash too long ({} chars, max {MAX_HASH_LEN})",
                trimmed.len()
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidHash(format!(
                "Hash contains invalid characters: {trimmed}"
            )));
        }

        let normalized = if trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            trimmed.to_ascii_lowercase()
        } else {
            trimmed.to_string()
        };

        Ok(Self(normalized))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// DevicePath
// ============================================================================

/// A path inside the device's file tree
///
/// The device endpoints disagree on slash conventions: `list`, `create`,
/// `delete` and `download` take a leading slash (`/saves/snes9x/`), while
/// the `path` field of `upload` must not have one (`saves/snes9x/`). The
/// path is stored without leading or trailing slashes and rendered per
/// endpoint by [`DevicePath::dir_query`], [`DevicePath::file_query`] and
/// [`DevicePath::upload_target`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DevicePath(String);

impl DevicePath {
    /// Parse and normalize a device path
    ///
    /// Repeated, leading and trailing slashes are collapsed.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDevicePath` if any segment is `.` or `..`,
    /// or contains a backslash or NUL byte.
    pub fn new(path: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = path.as_ref();
        let mut segments = Vec::new();

        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(DomainError::InvalidDevicePath(format!(
                    "Relative segment '{segment}' in {raw}"
                )));
            }
            if segment.contains('\\') || segment.contains('\0') {
                return Err(DomainError::InvalidDevicePath(format!(
                    "Invalid character in segment '{segment}'"
                )));
            }
            segments.push(segment);
        }

        Ok(Self(segments.join("/")))
    }

    /// The root of the device tree
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// `downloads/` - where pushed ROM files live
    #[must_use]
    pub fn downloads() -> Self {
        Self("downloads".to_string())
    }

    /// `playlists/` - where `.lpl` playlists live
    #[must_use]
    pub fn playlists() -> Self {
        Self("playlists".to_string())
    }

    /// `saves/` - battery saves, partitioned per core
    #[must_use]
    pub fn saves() -> Self {
        Self("saves".to_string())
    }

    /// `states/` - emulator save states, partitioned per core
    #[must_use]
    pub fn states() -> Self {
        Self("states".to_string())
    }

    /// Returns true for the tree root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalized form without leading or trailing slashes
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if the component is empty, contains a slash, or is a
    /// relative segment.
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty()
            || component.contains('/')
            || component == "."
            || component == ".."
        {
            return Err(DomainError::InvalidDevicePath(format!(
                "Invalid path component: {component}"
            )));
        }

        if self.is_root() {
            Self::new(component)
        } else {
            Self::new(format!("{}/{component}", self.0))
        }
    }

    /// Get the last path component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Rendered as a directory for `list` and `create`: `/saves/snes9x/`
    #[must_use]
    pub fn dir_query(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}/", self.0)
        }
    }

    /// Rendered as a file for `delete` and `download`: `/downloads/mario.sfc`
    #[must_use]
    pub fn file_query(&self) -> String {
        format!("/{}", self.0)
    }

    /// Rendered as the `path` field of a multipart upload: `saves/snes9x/`
    #[must_use]
    pub fn upload_target(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }
}

impl Display for DevicePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for DevicePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DevicePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DevicePath> for String {
    fn from(path: DevicePath) -> Self {
        path.0
    }
}
