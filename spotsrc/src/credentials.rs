//! Application key loading
//!
//! The backend authenticates the application itself with a fixed-size
//! opaque key blob issued out of band. The blob is read from disk at
//! session create time; a missing file or a blob of the wrong size is a
//! configuration error, surfaced before any backend call is made.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Required application key size in bytes.
pub const APPLICATION_KEY_SIZE: usize = 321;

/// Fixed-size opaque application key blob
#[derive(Clone)]
pub struct ApplicationKey {
    bytes: Vec<u8>,
}

impl ApplicationKey {
    /// Load the application key from a file
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not exactly [`APPLICATION_KEY_SIZE`] bytes
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Credentials(format!("cannot read application key {}: {}", path.display(), e))
        })?;

        if bytes.len() != APPLICATION_KEY_SIZE {
            return Err(Error::Credentials(format!(
                "application key {} is {} bytes, expected {}",
                path.display(),
                bytes.len(),
                APPLICATION_KEY_SIZE
            )));
        }

        Ok(Self { bytes })
    }

    /// Key material as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the key, yielding the raw blob
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// Key material stays out of log output.
impl fmt::Debug for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApplicationKey({} bytes)", self.bytes.len())
    }
}
