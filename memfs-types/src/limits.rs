//! Compile-time volume parameters.
//!
//! These are properties of a specific, fixed volume layout, not
//! something a caller configures at runtime.

use lazy_static::lazy_static;

/// Size of a single block, in bytes.
pub const BLOCK_SIZE: u64 = 4096;

/// Total volume size: 100 MiB expressed in blocks.
pub const TOTAL_BLOCKS: u64 = 100 * 1024 * 1024 / BLOCK_SIZE;

/// Maximum length of a single path component, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Accounting size of a single inode slot, in bytes.
pub const INODE_SLOT_SIZE: u64 = 512;

lazy_static! {
    /// Number of inode slots that fit in one block, derived from
    /// [`BLOCK_SIZE`] and [`INODE_SLOT_SIZE`]. Wrapped in `lazy_static!`
    /// because it is a pure function of the two constants above, not
    /// itself a literal, and every consumer should share one computed
    /// value.
    pub static ref INODES_PER_BLOCK: u64 = BLOCK_SIZE / INODE_SLOT_SIZE;

    /// Upper bound on the number of live inodes the volume can hold.
    pub static ref MAX_INODES: u64 = TOTAL_BLOCKS * *INODES_PER_BLOCK;
}

/// Inode serial number of the root directory. Never reused.
pub const ROOT_INO: u64 = 1;

/// Maximum number of supplementary group ids the bridge will fetch for a
/// caller, matching FUSE's own fixed-size `gid_t list[512]`.
pub const MAX_SUPPLEMENTARY_GROUPS: usize = 512;
