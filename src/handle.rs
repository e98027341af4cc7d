//! Bundle handle: open/close lifecycle plus the public read/write/trim/flush
//! surface built on top of [`crate::cache::Cache`] and [`crate::io`].

use std::fs::File;
use std::path::PathBuf;

use crate::cache::Cache;
use crate::error::OpenError;
use crate::errno::Errno;
use crate::io;
use crate::plist::parse_info_plist;

/// Configuration for [`Handle::open`].
///
/// Mirrors the shape of the teacher's own mount configuration surface: a
/// plain struct with public fields rather than a builder, since there is
/// nothing here warranting one.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Path to the sparsebundle directory (containing `Info.plist` and
    /// `bands/`).
    pub path: PathBuf,
    /// Maximum number of band file descriptors held open at once. Values
    /// less than 1 are treated as 1.
    pub max_open_bands: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions { path: PathBuf::new(), max_open_bands: 16 }
    }
}

struct Bundle {
    band_size: u64,
    size: u64,
    cache: Cache,
}

/// A handle to an opened sparsebundle.
///
/// The handle is always addressable, even if [`Handle::open`] failed: per
/// spec §4.5, a failed open still latches a human-readable error retrievable
/// via [`Handle::get_error`], and [`Handle::get_size`] simply reports 0.
/// Every other operation returns an [`Errno`] describing the handle as
/// unusable.
pub struct Handle {
    inner: Result<Bundle, OpenError>,
}

impl Handle {
    /// Opens a sparsebundle. See spec §4.5 for the exact validation steps.
    pub fn open(options: OpenOptions) -> Handle {
        let inner = Self::try_open(options);
        if let Err(e) = &inner {
            log::error!("failed to open sparsebundle: {e}");
        }
        Handle { inner }
    }

    fn try_open(options: OpenOptions) -> Result<Bundle, OpenError> {
        if options.path.as_os_str().is_empty() {
            return Err(OpenError::invalid_path(&options.path));
        }
        let capacity = options.max_open_bands.max(1);

        let bands_dir = options.path.join("bands");
        let bands_meta = std::fs::metadata(&bands_dir)
            .map_err(|e| OpenError::cannot_stat_bands(&bands_dir, &e))?;
        if !bands_meta.is_dir() {
            return Err(OpenError::bands_not_a_directory(&bands_dir));
        }

        let plist_path = options.path.join("Info.plist");
        let plist_file =
            File::open(&plist_path).map_err(|e| OpenError::cannot_open_plist(&plist_path, &e))?;
        let parsed = parse_info_plist(plist_file).map_err(OpenError::from)?;

        Ok(Bundle {
            band_size: parsed.band_size,
            size: parsed.size,
            cache: Cache::new(capacity, bands_dir),
        })
    }

    /// Total logical size of the image in bytes, or 0 if `open` failed.
    pub fn get_size(&self) -> u64 {
        self.inner.as_ref().map(|b| b.size).unwrap_or(0)
    }

    /// The latched error from a failed `open`, if any.
    pub fn get_error(&self) -> Option<String> {
        self.inner.as_ref().err().map(|e| e.to_string())
    }

    fn bundle(&self) -> Result<&Bundle, Errno> {
        self.inner.as_ref().map_err(|_| Errno::not_found())
    }

    /// Reads `buf.len()` bytes starting at `offset`, zero-filling any holes.
    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<usize, Errno> {
        let bundle = self.bundle()?;
        io::pread(&bundle.cache, bundle.band_size, buf, offset)
    }

    /// Writes `buf` at `offset`, lazily allocating bands as needed.
    pub fn pwrite(&self, buf: &[u8], offset: u64) -> Result<usize, Errno> {
        let bundle = self.bundle()?;
        io::pwrite(&bundle.cache, bundle.band_size, buf, offset)
    }

    /// Unlinks every band fully contained within `[offset, offset + len)`.
    pub fn trim(&self, offset: u64, len: u64) -> Result<(), Errno> {
        let bundle = self.bundle()?;
        io::trim(&bundle.cache, bundle.band_size, offset, len)
    }

    /// Closes every cached band file descriptor without fsync-ing.
    pub fn flush(&self) -> Result<(), Errno> {
        let bundle = self.bundle()?;
        io::flush(&bundle.cache)
    }

    /// Flushes and releases the handle's resources. Always succeeds from the
    /// caller's perspective; internal flush errors are logged and swallowed.
    pub fn close(self) {
        if let Ok(bundle) = &self.inner {
            if let Err(e) = io::flush(&bundle.cache) {
                log::warn!("error flushing sparsebundle on close: {e}");
            }
        }
    }
}
