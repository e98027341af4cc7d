//! A single band file: `<bundle>/bands/<hex-id>`.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::errno::Errno;

/// Permission bits for a newly created band file, subject to umask.
const BAND_MODE: u32 = 0o666;

/// The state of a band's underlying file descriptor.
///
/// This is the tagged-variant replacement for the source implementation's
/// "negative fd means error" convention (see `DESIGN.md`): a band is always
/// one of an open fd, a confirmed absence on disk, or some other open
/// failure worth remembering (e.g. permission denied).
#[derive(Debug)]
pub(crate) enum FdState {
    Open(OwnedFd),
    /// The band file does not exist. Reads against it are holes; a write
    /// always requests `create_if_missing`, so this state is reopened
    /// before a write is attempted.
    Missing,
    /// `open` failed for a reason other than the file being absent.
    Failed(Errno),
}

impl FdState {
    pub(crate) fn is_missing(&self) -> bool {
        matches!(self, FdState::Missing)
    }
}

pub(crate) fn band_path(bands_dir: &Path, id: u64) -> PathBuf {
    bands_dir.join(format!("{id:x}"))
}

/// Opens `bands_dir/<id-hex>`, always returning a live state: failure is
/// recorded in the returned variant rather than propagated, so the cache can
/// remember "this band is absent" without losing LRU bookkeeping for it.
pub(crate) fn open_band_file(bands_dir: &Path, id: u64, create_if_missing: bool) -> FdState {
    let path = band_path(bands_dir, id);
    let result = OpenOptions::new()
        .read(true)
        .write(true)
        .create(create_if_missing)
        .mode(BAND_MODE)
        .open(&path);
    match result {
        Ok(file) => FdState::Open(OwnedFd::from(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => FdState::Missing,
        Err(e) => FdState::Failed(Errno::from(e)),
    }
}

/// Replaces `state` with [`FdState::Missing`] and closes the previous fd, if
/// any. Returns the first close error, if any; the state is updated
/// regardless.
pub(crate) fn close_band_file(state: &mut FdState) -> Result<(), Errno> {
    let previous = std::mem::replace(state, FdState::Missing);
    if let FdState::Open(fd) = previous {
        nix::unistd::close(fd).map_err(Errno::from)?;
    }
    Ok(())
}
