//! POSIX error codes surfaced by per-request operations.

use std::fmt;

/// A POSIX error code, as returned by the host's file I/O.
///
/// This is the "tagged variant" translation of the source implementation's
/// `-errno` convention: every fallible per-request operation
/// (`pread`/`pwrite`/`trim`/`flush`) returns `Result<_, Errno>` instead of a
/// negative integer. [`Errno::raw`] recovers the raw POSIX error number for
/// callers that need to reproduce the literal ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(nix::errno::Errno);

impl Errno {
    /// The raw, positive POSIX error number (e.g. `2` for `ENOENT`).
    pub fn raw(&self) -> i32 {
        self.0 as i32
    }

    /// The value an adapter speaking the literal `bytes | -errno` ABI would
    /// return for this error.
    pub fn as_neg(&self) -> i64 {
        -(self.raw() as i64)
    }

    pub(crate) fn not_found() -> Self {
        Errno(nix::errno::Errno::ENOENT)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.raw())
    }
}

impl std::error::Error for Errno {}

impl From<nix::errno::Errno> for Errno {
    fn from(e: nix::errno::Errno) -> Self {
        Errno(e)
    }
}

impl From<std::io::Error> for Errno {
    fn from(e: std::io::Error) -> Self {
        match e.raw_os_error() {
            Some(code) => Errno(nix::errno::Errno::from_raw(code)),
            None => Errno(nix::errno::Errno::EIO),
        }
    }
}

impl From<Errno> for std::io::Error {
    fn from(e: Errno) -> Self {
        std::io::Error::from_raw_os_error(e.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_io_error() {
        let e = Errno::not_found();
        let io: std::io::Error = e.into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
        let back: Errno = io.into();
        assert_eq!(back, e);
    }

    #[test]
    fn as_neg_is_negative_raw() {
        let e = Errno::not_found();
        assert_eq!(e.as_neg(), -(e.raw() as i64));
    }
}
