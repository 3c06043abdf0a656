//! POSIX-shaped inode metadata and the superblock snapshot handed back by
//! `statfs`.

use bit_field::BitField;

/// Bit position of the directory flag within [`Stat::mode`], chosen to sit
/// alongside `libc::S_IFDIR` so `mode & TYPE_MASK` recovers the type bits.
const TYPE_MASK: u32 = libc::S_IFMT as u32;

/// The type of filesystem entry an inode represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FType {
    /// A directory, which may own children.
    Directory,
    /// A regular file, which may own a data buffer.
    Regular,
}

impl FType {
    /// The `S_IFMT` bits corresponding to this type.
    pub fn mode_bits(self) -> u32 {
        match self {
            FType::Directory => libc::S_IFDIR as u32,
            FType::Regular => libc::S_IFREG as u32,
        }
    }

    /// Recover the type encoded in a raw mode word, if it is one this
    /// filesystem supports.
    pub fn from_mode(mode: u32) -> Option<FType> {
        match mode & TYPE_MASK {
            m if m == libc::S_IFDIR as u32 => Some(FType::Directory),
            m if m == libc::S_IFREG as u32 => Some(FType::Regular),
            _ => None,
        }
    }
}

/// Bit-for-bit analogue of a POSIX `struct stat`, restricted to the
/// fields this filesystem actually tracks. `link count` is always `1`
/// (hard links are out of scope); `rdev` is carried but unused, since
/// device nodes are not a supported [`FType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Inode serial number, stable for the inode's lifetime.
    pub ino: u64,
    /// Combined type bits ([`FType::mode_bits`]) and permission bits.
    pub mode: u32,
    /// Hard link count; fixed at `1`.
    pub nlink: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Device id; unused (no special files are supported).
    pub rdev: u64,
    /// Size in bytes.
    pub size: u64,
    /// Number of [`crate::limits::BLOCK_SIZE`]-sized blocks backing this
    /// inode's data.
    pub blocks: u64,
    /// Last access time, second resolution.
    pub atime: i64,
    /// Last modification time, second resolution.
    pub mtime: i64,
    /// Last status-change time, second resolution.
    pub ctime: i64,
}

impl Stat {
    /// The permission bits of `mode`, with the type bits masked out.
    pub fn permission_bits(&self) -> u32 {
        self.mode & !TYPE_MASK
    }

    /// Whether a given rwx bit is set for the given class at `shift`
    /// (0 = owner, 3 = group, 6 = other), using [`BitField`] rather than
    /// hand-rolled shifts so the three permission classes read uniformly.
    fn class_has(&self, shift: u32, bit: u32) -> bool {
        self.mode.get_bit((shift + bit) as usize)
    }

    /// Owner read/write/execute bits.
    pub fn owner_rwx(&self) -> (bool, bool, bool) {
        (
            self.class_has(6, 2),
            self.class_has(6, 1),
            self.class_has(6, 0),
        )
    }

    /// Group read/write/execute bits.
    pub fn group_rwx(&self) -> (bool, bool, bool) {
        (
            self.class_has(3, 2),
            self.class_has(3, 1),
            self.class_has(3, 0),
        )
    }

    /// Other read/write/execute bits.
    pub fn other_rwx(&self) -> (bool, bool, bool) {
        (self.class_has(0, 2), self.class_has(0, 1), self.class_has(0, 0))
    }

    /// The [`FType`] encoded in `mode`.
    pub fn file_type(&self) -> FType {
        FType::from_mode(self.mode).expect("inode mode always carries a supported type")
    }
}

/// Immutable copy of the process-wide quota accounting record, returned
/// to callers of `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlockSnapshot {
    /// Size of one block, in bytes.
    pub block_size: u64,
    /// Total blocks in the volume.
    pub total_blocks: u64,
    /// Blocks not currently committed to any inode or the inode table.
    pub free_blocks: u64,
    /// Blocks available to the calling process; equal to `free_blocks` in
    /// this design (no reserved-for-root pool).
    pub available_blocks: u64,
    /// Total inode slots the volume can address.
    pub total_inodes: u64,
    /// Inode slots currently holding a live inode.
    pub inodes_in_use: u64,
    /// Maximum length of one path component, in bytes.
    pub max_name_length: u64,
}
