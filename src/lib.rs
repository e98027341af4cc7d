//! Access library for Apple sparsebundle disk images.
//!
//! A sparsebundle stores a logical disk image as a directory of fixed-size
//! "band" files plus an `Info.plist` describing the image's total size and
//! band size. This crate turns that directory into a single
//! byte-addressable virtual file: [`Handle::pread`]/[`Handle::pwrite`] split
//! a logical `(offset, length)` request into per-band positional I/O,
//! [`Handle::trim`] unlinks whole bands to release their storage, and
//! [`Handle::flush`] closes every cached band file descriptor.
//!
//! This crate does not create new sparsebundles, change an existing one's
//! size or band size, validate integrity, cache data (only file
//! descriptors), coalesce writes, or fsync. It also does not mount anything:
//! there is no FUSE, network block device, or CLI surface here, only the
//! handle-based API a filesystem-in-userspace or NBD adapter would sit on
//! top of.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod band;
mod cache;
mod error;
mod errno;
mod handle;
mod io;
mod plist;

pub use crate::error::OpenError;
pub use crate::errno::Errno;
pub use crate::handle::{Handle, OpenOptions};

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("size", &self.get_size())
            .field("error", &self.get_error())
            .finish()
    }
}
