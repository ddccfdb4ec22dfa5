//! End-to-end tests against scratch image files built with [`assoofs::mkfs`].

use std::fs::OpenOptions;

use tempfile::NamedTempFile;

use assoofs::device::FileBlockDevice;
use assoofs::error::Error;
use assoofs::layout::{Mode, BLOCK_SIZE, MAX_OBJECTS};
use assoofs::mkfs::WELCOME_BODY;
use assoofs::Filesystem;

fn fresh_image() -> NamedTempFile {
    let file = NamedTempFile::new().expect("create scratch file");
    file.as_file()
        .set_len(MAX_OBJECTS * BLOCK_SIZE as u64)
        .expect("size scratch file");
    let mut device = FileBlockDevice::new(
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(file.path())
            .expect("reopen scratch file"),
    );
    assoofs::mkfs::format(&mut device).expect("format scratch image");
    file
}

fn mount(file: &NamedTempFile) -> Filesystem<FileBlockDevice> {
    let handle = OpenOptions::new()
        .read(true)
        .write(true)
        .open(file.path())
        .expect("open scratch file");
    Filesystem::mount(FileBlockDevice::new(handle)).expect("mount scratch image")
}

/// Scenario 1: a freshly formatted image contains exactly one root entry,
/// `README.txt`, whose contents are the literal welcome message.
#[test]
fn fresh_image_has_one_welcome_file() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let root = fs.root().unwrap();
    assert!(root.is_dir());
    assert_eq!(root.number(), 1);

    let entries: Vec<_> = fs.iterate(&root).unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "README.txt");
    assert_eq!(entries[0].inode_no, 2);

    let welcome = fs.inode(2).unwrap();
    assert!(welcome.is_reg());
    assert_eq!(welcome.file_size(), WELCOME_BODY.len() as u64);

    let mut buf = [0u8; 60];
    let n = fs.read(&welcome, 0, &mut buf).unwrap();
    assert_eq!(n, 60);
    assert_eq!(&buf[..n], WELCOME_BODY);
}

/// Scenario 2: creating a file makes it immediately visible to lookup, with
/// a zero size, and bumps the superblock's inode count.
#[test]
fn create_then_lookup_finds_new_file() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let mut root = fs.root().unwrap();

    let created = fs.create(&mut root, "hello", Mode::reg(0o644)).unwrap();
    assert!(created.is_reg());
    assert_eq!(created.file_size(), 0);
    assert_eq!(fs.inodes_count(), 3);

    let found = fs.lookup(&root, "hello").unwrap().expect("hello exists");
    assert_eq!(found.number(), created.number());
    assert_eq!(found.file_size(), 0);
}

/// Scenario 3: a write is immediately visible through read, and updates
/// the inode's reported size.
#[test]
fn write_then_read_round_trips_within_a_session() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let mut root = fs.root().unwrap();
    let mut file = fs.create(&mut root, "hello", Mode::reg(0o644)).unwrap();

    let written = fs.write(&mut file, 0, b"ABC").unwrap();
    assert_eq!(written, 3);
    assert_eq!(file.file_size(), 3);

    let mut buf = [0u8; 10];
    let n = fs.read(&file, 0, &mut buf).unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf[..n], b"ABC");
}

/// Scenario 4: a nested directory's file survives an unmount/remount
/// round-trip (P5).
#[test]
fn mkdir_nested_file_survives_remount() {
    let image = fresh_image();
    let (dir_no, file_no) = {
        let mut fs = mount(&image);
        let mut root = fs.root().unwrap();
        let mut dir = fs.mkdir(&mut root, "d", Mode::dir(0o755)).unwrap();
        let mut file = fs.create(&mut dir, "f", Mode::reg(0o644)).unwrap();
        fs.write(&mut file, 0, b"x").unwrap();
        (dir.number(), file.number())
    };

    let mut fs = mount(&image);
    let root = fs.root().unwrap();
    let dir = fs.lookup(&root, "d").unwrap().expect("d exists");
    assert_eq!(dir.number(), dir_no);
    assert!(dir.is_dir());

    let file = fs.lookup(&dir, "f").unwrap().expect("f exists");
    assert_eq!(file.number(), file_no);

    let mut buf = [0u8; 8];
    let n = fs.read(&file, 0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"x");
}

/// P6: 60 creates succeed (root + README already occupy two of the 64
/// object slots, so `inodes_count` reaches 62); the 61st fails with
/// `NoSpace` since `create`/`mkdir` refuse once `inodes_count >= 62`.
#[test]
fn object_limit_is_enforced() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let mut root = fs.root().unwrap();

    for i in 0..60 {
        fs.create(&mut root, &format!("f{i}"), Mode::reg(0o644))
            .unwrap_or_else(|e| panic!("create {i} should succeed, got {e}"));
    }
    assert_eq!(fs.inodes_count(), 62);

    let err = fs
        .create(&mut root, "one-too-many", Mode::reg(0o644))
        .expect_err("61st create should fail");
    assert!(matches!(err, Error::NoSpace));
}

/// P7 / scenario 6: an oversize write is rejected outright and leaves the
/// file's data untouched.
#[test]
fn oversize_write_is_rejected() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let mut root = fs.root().unwrap();
    let mut file = fs.create(&mut root, "big", Mode::reg(0o644)).unwrap();

    let buf = vec![0xAAu8; 5000];
    let err = fs.write(&mut file, 0, &buf).expect_err("oversize write should fail");
    assert!(matches!(err, Error::FileTooLarge));

    let mut readback = [0u8; 16];
    let n = fs.read(&file, 0, &mut readback).unwrap();
    assert_eq!(n, 0);
}

/// Mount rejects an image whose magic number doesn't match.
#[test]
fn mount_rejects_bad_magic() {
    let image = NamedTempFile::new().unwrap();
    image
        .as_file()
        .set_len(MAX_OBJECTS * BLOCK_SIZE as u64)
        .unwrap();
    let handle = OpenOptions::new()
        .read(true)
        .write(true)
        .open(image.path())
        .unwrap();
    let err = Filesystem::mount(FileBlockDevice::new(handle)).expect_err("zeroed image has no magic");
    assert!(matches!(err, Error::BadMagic { .. }));
}

/// A lookup miss returns `Ok(None)` rather than an error.
#[test]
fn lookup_miss_returns_none() {
    let image = fresh_image();
    let mut fs = mount(&image);
    let root = fs.root().unwrap();
    assert!(fs.lookup(&root, "does-not-exist").unwrap().is_none());
}
