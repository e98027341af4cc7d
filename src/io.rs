//! Splits logical (offset, length) requests into per-band positional I/O.

use crate::cache::Cache;
use crate::errno::Errno;

/// Computes the (band index, intra-band offset, chunk length) a request at
/// `offset` should use, given `remaining` bytes still to transfer.
fn next_chunk(band_size: u64, offset: u64, remaining: usize) -> (u64, u64, usize) {
    let band_index = offset / band_size;
    let band_offset = offset % band_size;
    let chunk = std::cmp::min(band_size - band_offset, remaining as u64) as usize;
    (band_index, band_offset, chunk)
}

pub(crate) fn pread(cache: &Cache, band_size: u64, buf: &mut [u8], mut offset: u64) -> Result<usize, Errno> {
    let mut done = 0usize;
    while done < buf.len() {
        let (band_index, band_offset, chunk) = next_chunk(band_size, offset, buf.len() - done);
        let band = cache.acquire(band_index, false)?;
        let r = band.pread_at(&mut buf[done..done + chunk], band_offset)?;
        done += r;
        offset += r as u64;
    }
    Ok(done)
}

pub(crate) fn pwrite(cache: &Cache, band_size: u64, buf: &[u8], mut offset: u64) -> Result<usize, Errno> {
    let mut done = 0usize;
    while done < buf.len() {
        let (band_index, band_offset, chunk) = next_chunk(band_size, offset, buf.len() - done);
        let band = cache.acquire(band_index, true)?;
        let r = band.pwrite_at(&buf[done..done + chunk], band_offset)?;
        done += r;
        offset += r as u64;
    }
    Ok(done)
}

/// §4.4 `trim`: unlinks only bands fully contained within `[offset, offset + len)`.
pub(crate) fn trim(cache: &Cache, band_size: u64, offset: u64, len: u64) -> Result<(), Errno> {
    let start = offset.div_ceil(band_size);
    let end = (offset + len) / band_size;
    if start >= end {
        return Ok(());
    }
    for id in start..end {
        cache.trim_band(id)?;
    }
    Ok(())
}

pub(crate) fn flush(cache: &Cache) -> Result<(), Errno> {
    cache.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;

    fn cache(capacity: usize) -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let bands_dir = dir.path().join("bands");
        std::fs::create_dir(&bands_dir).unwrap();
        let cache = Cache::new(capacity, bands_dir);
        (dir, cache)
    }

    const B: u64 = 1024;

    #[test]
    fn read_of_unwritten_region_is_zero() {
        let (_dir, cache) = cache(4);
        let mut buf = [0xffu8; 4096];
        let n = pread(&cache, B, &mut buf, 0).unwrap();
        assert_eq!(n, buf.len());
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn read_after_write_single_band() {
        let (_dir, cache) = cache(4);
        pwrite(&cache, B, b"HELLO", 0).unwrap();
        let mut buf = [0u8; 5];
        pread(&cache, B, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"HELLO");
    }

    #[test]
    fn read_after_write_crosses_band_boundary() {
        let (_dir, cache) = cache(4);
        let data: Vec<u8> = (0..B).map(|i| (i % 251) as u8).collect();
        let offset = B - 2;
        pwrite(&cache, B, &data, offset).unwrap();
        let mut readback = vec![0u8; data.len()];
        pread(&cache, B, &mut readback, offset).unwrap();
        assert_eq!(readback, data);
    }

    #[test]
    fn trim_zeros_fully_contained_bands_and_preserves_partial_ends() {
        let (_dir, cache) = cache(8);
        let data = vec![b'A'; 4 * B as usize];
        pwrite(&cache, B, &data, 0).unwrap();

        trim(&cache, B, B, 2 * B).unwrap();

        let mut band1 = vec![0u8; B as usize];
        pread(&cache, B, &mut band1, B).unwrap();
        assert!(band1.iter().all(|&b| b == 0));

        let mut band0 = vec![0u8; B as usize];
        pread(&cache, B, &mut band0, 0).unwrap();
        assert!(band0.iter().all(|&b| b == b'A'));

        let mut band3 = vec![0u8; B as usize];
        pread(&cache, B, &mut band3, 3 * B).unwrap();
        assert!(band3.iter().all(|&b| b == b'A'));
    }

    #[test]
    fn trim_is_idempotent() {
        let (_dir, cache) = cache(8);
        let data = vec![b'A'; 3 * B as usize];
        pwrite(&cache, B, &data, 0).unwrap();
        trim(&cache, B, 0, 2 * B).unwrap();
        trim(&cache, B, 0, 2 * B).unwrap();
        let mut buf = vec![0u8; (2 * B) as usize];
        pread(&cache, B, &mut buf, 0).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn trim_smaller_than_one_band_is_a_noop() {
        let (_dir, cache) = cache(8);
        pwrite(&cache, B, b"keepme", 10).unwrap();
        trim(&cache, B, 0, 10).unwrap();
        let mut buf = [0u8; 6];
        pread(&cache, B, &mut buf, 10).unwrap();
        assert_eq!(&buf, b"keepme");
    }

    #[test]
    fn flush_drops_cached_bands_but_reads_still_work() {
        let (_dir, cache) = cache(4);
        pwrite(&cache, B, b"abc", 0).unwrap();
        flush(&cache).unwrap();
        assert_eq!(cache.open_count(), 0);
        let mut buf = [0u8; 3];
        pread(&cache, B, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn short_band_file_is_zero_filled_past_its_end() {
        let (dir, cache) = cache(4);
        // Write 3 bytes to band 0, then read 10: bytes 3..10 are a hole.
        pwrite(&cache, B, b"abc", 0).unwrap();
        drop(cache);
        let bands_dir = dir.path().join("bands");
        assert_eq!(std::fs::metadata(bands_dir.join("0")).unwrap().len(), 3);
        let cache = Cache::new(4, bands_dir);
        let mut buf = [0xffu8; 10];
        pread(&cache, B, &mut buf, 0).unwrap();
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(&buf[3..], &[0u8; 7]);
    }
}
