//! End-to-end scenarios exercising `memfs-core` the way a bridge would:
//! through `Filesystem`'s public methods only, never reaching into the
//! arena or resolver directly. Mirrors the seed cases enumerated for this
//! engine's testable properties.

use memfs_core::{CallerContext, FType, Filesystem};
use memfs_types::limits::{BLOCK_SIZE, MAX_INODES, TOTAL_BLOCKS};

fn caller(uid: u32, gid: u32) -> CallerContext {
    CallerContext::new(uid, gid, 0o022, vec![])
}

#[test]
fn mkdir_as_owner_reports_directory_bit_and_uid() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);

    fs.mkdir(&who, "/a", 0o700).unwrap();
    let stat = fs.getattr(&who, "/a").unwrap();

    assert_eq!(FType::from_mode(stat.mode), Some(FType::Directory));
    assert_eq!(stat.uid, 1000);
    assert_eq!(stat.permission_bits(), 0o700);
}

#[test]
fn directory_listing_stays_name_sorted_regardless_of_creation_order() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);

    fs.mkdir(&who, "/a", 0o755).unwrap();
    fs.mkdir(&who, "/c", 0o755).unwrap();
    fs.mknod(&who, "/b", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    let handle = fs.opendir(&who, "/").unwrap();
    let names: Vec<String> = fs
        .readdir(handle)
        .unwrap()
        .into_iter()
        .skip(2)
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn mknod_under_a_regular_file_is_not_a_directory() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);

    fs.mkdir(&who, "/a", 0o755).unwrap();
    fs.mknod(&who, "/a/b", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    let err = fs
        .mknod(&who, "/a/b/c", FType::Regular.mode_bits() | 0o644, 0)
        .unwrap_err();
    assert_eq!(err, libc::ENOTDIR);
}

#[test]
fn rmdir_removes_the_whole_subtree_and_rejects_further_lookups() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);

    fs.mkdir(&who, "/a", 0o755).unwrap();
    fs.mknod(&who, "/a/b", FType::Regular.mode_bits() | 0o644, 0).unwrap();
    fs.unlink(&who, "/a/b").unwrap();
    fs.rmdir(&who, "/a").unwrap();

    assert_eq!(fs.getattr(&who, "/a/b").unwrap_err(), libc::ENOENT);
    assert_eq!(fs.getattr(&who, "/a").unwrap_err(), libc::ENOENT);
}

#[test]
fn write_then_truncate_then_read_returns_the_truncated_prefix() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);

    fs.mknod(&who, "/f", FType::Regular.mode_bits() | 0o644, 0).unwrap();
    let handle = fs.open(&who, "/f", libc::O_RDWR).unwrap();
    let written = fs.write(handle, b"hello", 0).unwrap();
    assert_eq!(written, 5);

    fs.truncate(&who, "/f", 2).unwrap();
    let data = fs.read(handle, 10, 0).unwrap();
    assert_eq!(data, b"he");
}

#[test]
fn non_owner_cannot_create_inside_a_private_directory() {
    let owner = caller(1000, 1000);
    let fs = Filesystem::init(&owner);
    fs.mkdir(&owner, "/p", 0o700).unwrap();

    let other = caller(1001, 1001);
    let err = fs
        .mknod(&other, "/p/x", FType::Regular.mode_bits() | 0o644, 0)
        .unwrap_err();
    assert_eq!(err, libc::EACCES);
}

#[test]
fn mkdir_on_root_already_exists() {
    let who = caller(0, 0);
    let fs = Filesystem::init(&who);
    assert_eq!(fs.mkdir(&who, "/", 0o755).unwrap_err(), libc::EEXIST);
}

#[test]
fn rmdir_on_a_nonempty_directory_is_rejected() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mkdir(&who, "/a", 0o755).unwrap();
    fs.mknod(&who, "/a/f", FType::Regular.mode_bits() | 0o644, 0).unwrap();
    assert_eq!(fs.rmdir(&who, "/a").unwrap_err(), libc::ENOTEMPTY);
}

#[test]
fn opening_a_directory_for_read_is_rejected() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mkdir(&who, "/a", 0o755).unwrap();
    assert_eq!(fs.open(&who, "/a", libc::O_RDONLY).unwrap_err(), libc::EISDIR);
}

#[test]
fn a_255_byte_name_is_accepted() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    let name = "x".repeat(255);
    let path = format!("/{name}");
    fs.mknod(&who, &path, FType::Regular.mode_bits() | 0o644, 0).unwrap();
    assert!(fs.getattr(&who, &path).is_ok());
}

#[test]
fn a_file_cannot_grow_past_the_volumes_total_capacity() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mknod(&who, "/f", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    let huge = TOTAL_BLOCKS * BLOCK_SIZE + BLOCK_SIZE;
    assert_eq!(fs.truncate(&who, "/f", huge).unwrap_err(), libc::ENOSPC);
}

#[test]
fn rename_preserves_the_inodes_serial_number() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mknod(&who, "/old", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    let before = fs.getattr(&who, "/old").unwrap();
    fs.rename(&who, "/old", "/new").unwrap();
    let after = fs.getattr(&who, "/new").unwrap();

    assert_eq!(before.ino, after.ino);
    assert_eq!(fs.getattr(&who, "/old").unwrap_err(), libc::ENOENT);
}

#[test]
fn rename_within_the_same_directory_next_to_its_own_old_bracket_stays_ordered() {
    // "m" sits strictly between "a" and "z"; renaming it to "n" (which also
    // sorts between "a" and "z") makes "m" itself the bracket neighbour the
    // resolver would otherwise hand back for the destination name.
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mknod(&who, "/a", FType::Regular.mode_bits() | 0o644, 0).unwrap();
    fs.mknod(&who, "/m", FType::Regular.mode_bits() | 0o644, 0).unwrap();
    fs.mknod(&who, "/z", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    fs.rename(&who, "/m", "/n").unwrap();

    let handle = fs.opendir(&who, "/").unwrap();
    let names: Vec<String> = fs
        .readdir(handle)
        .unwrap()
        .into_iter()
        .skip(2)
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["a", "n", "z"]);
}

#[test]
fn repeated_chmod_with_the_same_mode_is_idempotent() {
    let who = caller(1000, 1000);
    let fs = Filesystem::init(&who);
    fs.mknod(&who, "/f", FType::Regular.mode_bits() | 0o644, 0).unwrap();

    let once = fs.chmod(&who, "/f", 0o600).unwrap();
    let twice = fs.chmod(&who, "/f", 0o600).unwrap();
    assert_eq!(once.permission_bits(), twice.permission_bits());
    assert_eq!(once.permission_bits(), 0o600);
}

#[test]
fn statfs_reports_the_fixed_volume_shape() {
    let who = caller(0, 0);
    let fs = Filesystem::init(&who);
    let snap = fs.statfs();

    assert_eq!(snap.total_inodes, *MAX_INODES);
    assert_eq!(snap.total_blocks, TOTAL_BLOCKS);
    assert_eq!(snap.block_size, BLOCK_SIZE);
    assert!(snap.free_blocks < snap.total_blocks, "root itself costs one block");
}
