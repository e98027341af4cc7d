//! Bounded LRU cache of open band file descriptors.
//!
//! One [`parking_lot::Mutex`] guards the hash index and recency list
//! together; it is never held across a positional read/write, only across
//! the (cheap, local) `open`/`close` of a band file. Per-band I/O is
//! coordinated instead by each band's own `RwLock`, acquired with the cache
//! mutex still held (the "publication barrier" of spec §4.3 step 6) and
//! released by the caller once the I/O completes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, Mutex, RawRwLock, RwLock};

use crate::band::{close_band_file, open_band_file, FdState};
use crate::errno::Errno;

#[derive(Clone)]
struct OpenBand {
    state: Arc<RwLock<FdState>>,
}

struct Node {
    band: OpenBand,
    prev: Option<u64>,
    next: Option<u64>,
}

struct Inner {
    nodes: HashMap<u64, Node>,
    head: Option<u64>, // least recently used
    tail: Option<u64>, // most recently used
}

impl Inner {
    fn detach(&mut self, id: u64) {
        let (prev, next) = {
            let node = self.nodes.get(&id).expect("detach of tracked id");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes.get_mut(&p).unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes.get_mut(&n).unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn append_tail(&mut self, id: u64) {
        let old_tail = self.tail;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => self.nodes.get_mut(&t).unwrap().next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    /// Move an already-present entry to the most-recently-used end.
    fn touch(&mut self, id: u64) {
        if self.tail == Some(id) {
            return;
        }
        self.detach(id);
        self.append_tail(id);
    }

    fn insert_new(&mut self, id: u64, band: OpenBand) {
        self.nodes.insert(id, Node { band, prev: None, next: None });
        self.append_tail(id);
    }

    /// Removes `id`, waiting out any in-flight shared holders before closing
    /// its fd (the eviction-barrier semantics of spec §3/§4.3).
    fn remove_and_close(&mut self, id: u64) -> Result<(), Errno> {
        self.detach(id);
        let node = self.nodes.remove(&id).expect("remove of tracked id");
        let mut guard = node.band.state.write();
        close_band_file(&mut guard)
    }
}

pub(crate) struct Cache {
    capacity: usize,
    bands_dir: PathBuf,
    inner: Mutex<Inner>,
}

/// A band acquired from the cache, with a shared lock held for the duration
/// of exactly one positional I/O call.
pub(crate) struct BandHandle {
    guard: ArcRwLockReadGuard<RawRwLock, FdState>,
}

impl BandHandle {
    pub(crate) fn pread_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Errno> {
        match &*self.guard {
            FdState::Missing => {
                buf.fill(0);
                Ok(buf.len())
            }
            FdState::Failed(e) => Err(*e),
            FdState::Open(fd) => {
                let n = nix::sys::uio::pread(fd, buf, offset as i64).map_err(Errno::from)?;
                if n == 0 {
                    // Hole within a present-but-short (or exactly
                    // exhausted) band: zero-fill rather than report 0.
                    buf.fill(0);
                    Ok(buf.len())
                } else {
                    Ok(n)
                }
            }
        }
    }

    pub(crate) fn pwrite_at(&self, buf: &[u8], offset: u64) -> Result<usize, Errno> {
        match &*self.guard {
            FdState::Open(fd) => {
                nix::sys::uio::pwrite(fd, buf, offset as i64).map_err(Errno::from)
            }
            FdState::Missing => {
                // need_write always requests create-on-open; a write
                // acquiring a still-missing band indicates the create
                // failed silently somewhere, which should not happen.
                Err(Errno::not_found())
            }
            FdState::Failed(e) => Err(*e),
        }
    }
}

impl Cache {
    pub(crate) fn new(capacity: usize, bands_dir: PathBuf) -> Self {
        Cache {
            capacity: capacity.max(1),
            bands_dir,
            inner: Mutex::new(Inner { nodes: HashMap::new(), head: None, tail: None }),
        }
    }

    fn band_path(&self, id: u64) -> PathBuf {
        crate::band::band_path(&self.bands_dir, id)
    }

    /// Evicts the least-recently-used entry if the cache is at capacity.
    /// Must be called with `inner` locked, immediately before an insertion.
    fn evict_if_full(&self, inner: &mut Inner) -> Result<(), Errno> {
        if inner.nodes.len() >= self.capacity {
            if let Some(lru) = inner.head {
                inner.remove_and_close(lru)?;
            }
        }
        Ok(())
    }

    /// §4.3 `acquire`: returns a band with a shared lock already held.
    pub(crate) fn acquire(&self, id: u64, need_write: bool) -> Result<BandHandle, Errno> {
        let mut inner = self.inner.lock();

        if let Some(node) = inner.nodes.get(&id) {
            let reopen_for_write = need_write && node.band.state.read().is_missing();
            if reopen_for_write {
                inner.remove_and_close(id)?;
                // falls through to the miss path below
            } else {
                inner.touch(id);
                let band = inner.nodes.get(&id).unwrap().band.clone();
                let guard = band.state.read_arc();
                return Ok(BandHandle { guard });
            }
        }

        self.evict_if_full(&mut inner)?;
        let state = open_band_file(&self.bands_dir, id, need_write);
        let band = OpenBand { state: Arc::new(RwLock::new(state)) };
        inner.insert_new(id, band.clone());
        let guard = band.state.read_arc();
        Ok(BandHandle { guard })
    }

    /// §4.4 `trim`'s per-band step: find-or-open, close the fd, mark the
    /// band missing, then unlink the file on disk.
    pub(crate) fn trim_band(&self, id: u64) -> Result<(), Errno> {
        {
            let mut inner = self.inner.lock();
            if !inner.nodes.contains_key(&id) {
                self.evict_if_full(&mut inner)?;
                let state = open_band_file(&self.bands_dir, id, false);
                inner.insert_new(id, OpenBand { state: Arc::new(RwLock::new(state)) });
            }
            let node = inner.nodes.get(&id).expect("band present after insert");
            let mut guard = node.band.state.write();
            close_band_file(&mut guard)?;
        }
        match std::fs::remove_file(self.band_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Errno::from(e)),
        }
    }

    /// §4.4 `flush`: drains and closes every cached band.
    pub(crate) fn flush(&self) -> Result<(), Errno> {
        let mut inner = self.inner.lock();
        let ids: Vec<u64> = inner.nodes.keys().copied().collect();
        let mut first_err = None;
        for id in ids {
            if let Err(e) = inner.remove_and_close(id) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of bands currently cached; used by tests to assert the
    /// capacity bound (spec §8 property 6).
    #[cfg(test)]
    pub(crate) fn open_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

}
