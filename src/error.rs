//! Errors fatal to opening a bundle.
//!
//! Per-request I/O errors are modeled separately by [`crate::Errno`]; these
//! variants are only ever produced while constructing a [`crate::Handle`] and
//! are latched onto it (see [`crate::Handle::get_error`]).

use std::fmt;
use std::path::PathBuf;

/// Why opening a sparsebundle failed.
#[derive(Debug)]
pub enum OpenError {
    /// The bundle directory, its `bands/` subdirectory, or its `Info.plist`
    /// could not be found or accessed as expected.
    Configuration(String),
    /// `Info.plist` was readable but its contents were malformed or
    /// described an unsupported bundle.
    Format(String),
}

impl OpenError {
    pub(crate) fn bands_not_a_directory(path: &std::path::Path) -> Self {
        OpenError::Configuration(format!("{} is not a directory", path.display()))
    }

    pub(crate) fn cannot_stat_bands(path: &std::path::Path, source: &std::io::Error) -> Self {
        OpenError::Configuration(format!("cannot stat {}: {source}", path.display()))
    }

    pub(crate) fn cannot_open_plist(path: &std::path::Path, source: &std::io::Error) -> Self {
        OpenError::Configuration(format!("unable to open {}: {source}", path.display()))
    }

    pub(crate) fn invalid_path(path: &PathBuf) -> Self {
        OpenError::Configuration(format!("invalid path: {}", path.display()))
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::Configuration(msg) => write!(f, "{msg}"),
            OpenError::Format(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for OpenError {}

impl From<crate::plist::PlistError> for OpenError {
    fn from(e: crate::plist::PlistError) -> Self {
        OpenError::Format(e.to_string())
    }
}
