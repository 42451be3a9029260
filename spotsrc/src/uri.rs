//! Track URI parsing
//!
//! The source accepts URIs with a fixed `spotify` scheme; the location part
//! (everything after `://`) is handed to the backend's link resolver
//! unchanged.

use crate::error::{Error, Result};
use std::fmt;

/// The only URI scheme this source handles.
pub const URI_SCHEME: &str = "spotify";

/// A validated track URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackUri {
    uri: String,
    location_start: usize,
}

impl TrackUri {
    /// Parse and validate a track URI
    ///
    /// # Errors
    /// - Scheme is not `spotify`
    /// - Location is missing or empty
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, location) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidUri(format!("'{}' has no scheme", uri)))?;

        if scheme != URI_SCHEME {
            return Err(Error::InvalidUri(format!(
                "'{}' has scheme '{}', expected '{}'",
                uri, scheme, URI_SCHEME
            )));
        }

        if location.is_empty() {
            return Err(Error::InvalidUri(format!("'{}' has no location", uri)));
        }

        Ok(Self {
            uri: uri.to_string(),
            location_start: scheme.len() + "://".len(),
        })
    }

    /// The full URI string
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The location part, as handed to the backend resolver
    pub fn location(&self) -> &str {
        &self.uri[self.location_start..]
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
