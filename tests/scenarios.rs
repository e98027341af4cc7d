//! End-to-end scenarios S1-S6 from the sparsebundle specification, run
//! against a real temp-directory bundle the way `fuser`'s own integration
//! tests drive a real mount through `tempfile::TempDir`.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use sparsebundle::{Handle, OpenOptions};

const B: u64 = 1024 * 1024;
const S: u64 = 16 * 1024 * 1024;
const K: usize = 4;

fn make_bundle(band_size: u64, size: u64) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("bands")).unwrap();
    let mut plist = fs::File::create(dir.path().join("Info.plist")).unwrap();
    write!(
        plist,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>band-size</key>
	<integer>{band_size}</integer>
	<key>size</key>
	<integer>{size}</integer>
	<key>bundle-backingstore-version</key>
	<integer>1</integer>
</dict>
</plist>
"#
    )
    .unwrap();
    dir
}

fn open(dir: &Path, max_open_bands: usize) -> Handle {
    let handle =
        Handle::open(OpenOptions { path: dir.to_path_buf(), max_open_bands });
    assert!(handle.get_error().is_none(), "open failed: {:?}", handle.get_error());
    handle
}

#[test]
fn s1_read_of_empty_bundle_is_zero() {
    let dir = make_bundle(B, S);
    let handle = open(dir.path(), K);
    let mut buf = [0xffu8; 4096];
    let n = handle.pread(&mut buf, 0).unwrap();
    assert_eq!(n, 4096);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn s2_small_write_creates_band_zero() {
    let dir = make_bundle(B, S);
    let handle = open(dir.path(), K);
    handle.pwrite(b"HELLO", 0).unwrap();
    let mut buf = [0u8; 5];
    handle.pread(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"HELLO");
    let band0 = dir.path().join("bands").join("0");
    assert_eq!(fs::metadata(&band0).unwrap().len(), 5);
}

#[test]
fn s3_write_spanning_a_band_boundary() {
    let dir = make_bundle(B, S);
    let handle = open(dir.path(), K);
    let x: Vec<u8> = (0..B).map(|i| (i % 256) as u8).collect();
    handle.pwrite(&x, B - 2).unwrap();

    let band0 = dir.path().join("bands").join("0");
    let band1 = dir.path().join("bands").join("1");
    assert_eq!(fs::metadata(&band0).unwrap().len(), B);
    assert!(fs::metadata(&band1).unwrap().len() >= B - 2);

    let mut readback = vec![0u8; B as usize];
    handle.pread(&mut readback, B - 2).unwrap();
    assert_eq!(readback, x);
}

#[test]
fn s4_lru_keeps_only_the_last_k_bands_but_data_survives() {
    let dir = make_bundle(B, S);
    let handle = open(dir.path(), K);
    for band in 0..10u64 {
        let mut marker = vec![0u8; 8];
        marker[0] = band as u8;
        handle.pwrite(&marker, band * B).unwrap();
    }
    let bands_dir = dir.path().join("bands");
    for band in 0..10u64 {
        assert!(bands_dir.join(format!("{band:x}")).exists());
    }

    // Band 0's data is still retrievable even though it was evicted from
    // the open-fd cache long ago.
    let mut marker = vec![0u8; 8];
    handle.pread(&mut marker, 0).unwrap();
    assert_eq!(marker[0], 0);
}

#[test]
fn s5_trim_releases_a_whole_band_and_preserves_its_neighbors() {
    let dir = make_bundle(B, S);
    let handle = open(dir.path(), K);
    let data = vec![b'A'; 4 * B as usize];
    handle.pwrite(&data, 0).unwrap();

    handle.trim(B, 2 * B).unwrap();

    let band1 = dir.path().join("bands").join("1");
    assert!(!band1.exists(), "band 1 should be unlinked by trim");

    let mut hole = vec![0u8; B as usize];
    handle.pread(&mut hole, B).unwrap();
    assert!(hole.iter().all(|&b| b == 0));

    let mut before = vec![0u8; B as usize];
    handle.pread(&mut before, 0).unwrap();
    assert!(before.iter().all(|&b| b == b'A'));

    let mut after = vec![0u8; 2 * B as usize];
    handle.pread(&mut after, 2 * B).unwrap();
    assert!(after.iter().all(|&b| b == b'A'));
}

#[test]
fn s6_concurrent_readers_and_a_writer_on_a_different_band_do_not_deadlock() {
    let dir = make_bundle(B, S);
    let handle = Arc::new(open(dir.path(), K));
    handle.pwrite(&vec![b'R'; B as usize], 0).unwrap();

    const READERS: usize = 8;
    let barrier = Arc::new(Barrier::new(READERS + 1));

    let mut threads = Vec::new();
    for _ in 0..READERS {
        let handle = Arc::clone(&handle);
        let barrier = Arc::clone(&barrier);
        threads.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..50 {
                let mut buf = vec![0u8; B as usize];
                handle.pread(&mut buf, 0).unwrap();
                assert!(buf.iter().all(|&b| b == b'R'));
            }
        }));
    }

    let writer_handle = Arc::clone(&handle);
    let writer_barrier = Arc::clone(&barrier);
    let writer = thread::spawn(move || {
        writer_barrier.wait();
        for i in 0..50u8 {
            writer_handle.pwrite(&[i; 16], B).unwrap();
        }
    });

    for t in threads {
        t.join().unwrap();
    }
    writer.join().unwrap();
}
