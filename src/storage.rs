//! Status persistence: versioned binary blob and the store abstraction.
//!
//! The blob layout is a stable external contract (NVS readers on other
//! components parse it): a leading schema version byte, then the status
//! fields in declaration order with `hue` little-endian. Readers must
//! reject unknown versions instead of guessing at the layout.

use crate::error::Error;
use crate::lightbulb::{LightStatus, WorkMode};

/// Current blob schema version.
pub const STATUS_SCHEMA_VERSION: u8 = 1;

/// Serialized status length in bytes.
pub const STATUS_BLOB_LEN: usize = 9;

/// Key-value namespace the status lives under.
pub const STORAGE_NAMESPACE: &str = "lightbulb";
/// Key of the status blob inside [`STORAGE_NAMESPACE`].
pub const STORAGE_KEY: &str = "lb_status";

impl LightStatus {
    /// Serialize to the versioned blob format.
    pub fn to_bytes(&self) -> [u8; STATUS_BLOB_LEN] {
        let hue = self.hue.to_le_bytes();
        [
            STATUS_SCHEMA_VERSION,
            match self.mode {
                WorkMode::Color => 0,
                WorkMode::White => 1,
            },
            u8::from(self.on),
            hue[0],
            hue[1],
            self.saturation,
            self.value,
            self.cct_percentage,
            self.brightness,
        ]
    }

    /// Parse a blob, rejecting unknown versions and out-of-range fields.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != STATUS_BLOB_LEN || bytes[0] != STATUS_SCHEMA_VERSION {
            return Err(Error::InvalidArgument);
        }
        let mode = match bytes[1] {
            0 => WorkMode::Color,
            1 => WorkMode::White,
            _ => return Err(Error::InvalidArgument),
        };
        let status = Self {
            mode,
            on: bytes[2] != 0,
            hue: u16::from_le_bytes([bytes[3], bytes[4]]),
            saturation: bytes[5],
            value: bytes[6],
            cct_percentage: bytes[7],
            brightness: bytes[8],
        };
        if !status.is_valid() {
            return Err(Error::InvalidArgument);
        }
        Ok(status)
    }
}

/// Non-volatile status storage.
///
/// Implementations wrap whatever key-value store the platform offers (NVS
/// on ESP chips) under [`STORAGE_NAMESPACE`]/[`STORAGE_KEY`]. The tick
/// scheduler calls [`StatusStore::save`] when the debounce fires.
pub trait StatusStore {
    fn save(&mut self, status: &LightStatus) -> Result<(), Error>;
    fn load(&mut self) -> Result<LightStatus, Error>;
}

/// Store for builds without persistence: saves vanish, loads fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl StatusStore for NullStore {
    fn save(&mut self, _status: &LightStatus) -> Result<(), Error> {
        Ok(())
    }

    fn load(&mut self) -> Result<LightStatus, Error> {
        Err(Error::InvalidState)
    }
}
