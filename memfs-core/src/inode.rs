//! The inode object and the arena that owns every live inode. Every
//! inode lives in one arena keyed by a `u64` serial number; tree
//! pointers are indices into it rather than raw pointers.

use std::collections::{BTreeSet, HashMap};

use memfs_types::limits::{MAX_INODES, ROOT_INO};
use memfs_types::stat::Stat;

/// An in-memory file or directory object. Tree pointers are serial
/// numbers (`u64`) rather than raw pointers or `Rc`s, so a stale handle
/// held by `open`/`opendir` simply fails a liveness check instead of
/// dereferencing freed memory.
#[derive(Debug, Clone)]
pub struct Inode {
    /// POSIX-shaped metadata.
    pub stat: Stat,
    /// Up to 255 bytes, never containing `/`. The root's name is the
    /// literal `"ROOT"` and is never surfaced to callers.
    pub name: String,
    /// Serial number of the containing directory; `None` only for root.
    pub parent: Option<u64>,
    /// Left neighbour in the parent's sorted sibling list.
    pub left: Option<u64>,
    /// Right neighbour in the parent's sorted sibling list.
    pub right: Option<u64>,
    /// First child in name order, if this is a non-empty directory.
    pub first_child: Option<u64>,
    /// Last child in name order, if this is a non-empty directory.
    pub last_child: Option<u64>,
    /// Regular-file data buffer. Always `None` for directories;
    /// `Some(buf)` with `buf.len() == blocks * BLOCK_SIZE` for files,
    /// even when `size == 0`, once `alloc` has been called.
    pub data: Option<Vec<u8>>,
}

impl Inode {
    /// Whether this inode is currently a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.stat.file_type(), memfs_types::FType::Directory)
    }
}

/// Owns every live inode, keyed by stable serial number. Reuses the
/// lowest released serial first, the way a classic `ialloc` scans for the
/// lowest free inode number rather than minting a fresh one.
#[derive(Debug)]
pub struct Arena {
    inodes: HashMap<u64, Inode>,
    free_serials: BTreeSet<u64>,
    high_water: u64,
}

impl Arena {
    /// Construct an arena already containing the given root inode at
    /// [`ROOT_INO`].
    pub fn new(root: Inode) -> Self {
        let mut inodes = HashMap::new();
        inodes.insert(ROOT_INO, root);
        Arena {
            inodes,
            free_serials: BTreeSet::new(),
            high_water: ROOT_INO,
        }
    }

    /// Reserve the next available serial number without installing an
    /// inode at it yet. Returns `None` once the volume's inode capacity
    /// ([`MAX_INODES`]) is exhausted.
    pub fn reserve_serial(&mut self) -> Option<u64> {
        if let Some(&serial) = self.free_serials.iter().next() {
            self.free_serials.remove(&serial);
            return Some(serial);
        }
        if self.high_water + 1 > *MAX_INODES {
            return None;
        }
        self.high_water += 1;
        Some(self.high_water)
    }

    /// Install an inode at a previously reserved serial.
    pub fn install(&mut self, serial: u64, inode: Inode) {
        self.inodes.insert(serial, inode);
    }

    /// Release a serial back to the free pool, after the inode itself has
    /// been removed. The root's serial is never released.
    pub fn release_serial(&mut self, serial: u64) {
        if serial != ROOT_INO {
            self.free_serials.insert(serial);
        }
    }

    /// Borrow the inode at `serial`, if it is currently live.
    pub fn get(&self, serial: u64) -> Option<&Inode> {
        self.inodes.get(&serial)
    }

    /// Mutably borrow the inode at `serial`, if it is currently live.
    pub fn get_mut(&mut self, serial: u64) -> Option<&mut Inode> {
        self.inodes.get_mut(&serial)
    }

    /// Remove and return the inode at `serial`.
    pub fn remove(&mut self, serial: u64) -> Option<Inode> {
        self.inodes.remove(&serial)
    }

    /// Whether `serial` currently names a live inode; used by `open`
    /// handles to detect that their target was unlinked out from under
    /// them, so a stale handle is rejected rather than touching freed
    /// state.
    pub fn is_live(&self, serial: u64) -> bool {
        self.inodes.contains_key(&serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memfs_types::stat::FType;

    fn dir(ino: u64, name: &str) -> Inode {
        Inode {
            stat: Stat {
                ino,
                mode: FType::Directory.mode_bits() | 0o755,
                nlink: 1,
                uid: 0,
                gid: 0,
                rdev: 0,
                size: 0,
                blocks: 0,
                atime: 0,
                mtime: 0,
                ctime: 0,
            },
            name: name.to_string(),
            parent: None,
            left: None,
            right: None,
            first_child: None,
            last_child: None,
            data: None,
        }
    }

    #[test]
    fn fresh_arena_has_only_the_root() {
        let arena = Arena::new(dir(ROOT_INO, "ROOT"));
        assert!(arena.is_live(ROOT_INO));
        assert!(arena.get(ROOT_INO).unwrap().is_dir());
    }

    #[test]
    fn reserve_serial_mints_increasing_numbers_before_any_release() {
        let mut arena = Arena::new(dir(ROOT_INO, "ROOT"));
        let a = arena.reserve_serial().unwrap();
        let b = arena.reserve_serial().unwrap();
        assert!(b > a);
        assert_ne!(a, ROOT_INO);
        assert_ne!(b, ROOT_INO);
    }

    #[test]
    fn released_serial_is_reused_before_minting_a_new_one() {
        let mut arena = Arena::new(dir(ROOT_INO, "ROOT"));
        let a = arena.reserve_serial().unwrap();
        let b = arena.reserve_serial().unwrap();
        arena.release_serial(a);
        let c = arena.reserve_serial().unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn root_serial_is_never_released() {
        let mut arena = Arena::new(dir(ROOT_INO, "ROOT"));
        arena.release_serial(ROOT_INO);
        let next = arena.reserve_serial().unwrap();
        assert_ne!(next, ROOT_INO);
    }

    #[test]
    fn remove_makes_a_serial_no_longer_live() {
        let mut arena = Arena::new(dir(ROOT_INO, "ROOT"));
        let a = arena.reserve_serial().unwrap();
        arena.install(a, dir(a, "a"));
        assert!(arena.is_live(a));
        arena.remove(a);
        assert!(!arena.is_live(a));
    }

    #[test]
    fn reserve_serial_fails_once_capacity_is_exhausted() {
        let mut arena = Arena::new(dir(ROOT_INO, "ROOT"));
        arena.high_water = *MAX_INODES;
        assert!(arena.reserve_serial().is_none());
    }
}
