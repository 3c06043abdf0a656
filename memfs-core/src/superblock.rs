//! Superblock accountant: process-wide block and inode-table
//! bookkeeping. A small struct caching the volume's accounting fields,
//! tracking live counts directly rather than reading/writing a
//! `SuperBlock` struct to a backing device, since this filesystem has no
//! backing store.

use memfs_types::error::{FsError, Result};
use memfs_types::limits::{BLOCK_SIZE, INODES_PER_BLOCK, MAX_INODES, MAX_NAME_LENGTH, TOTAL_BLOCKS};
use memfs_types::SuperBlockSnapshot;

/// Tracks free blocks and live inode count. One block is reserved at
/// construction for the root inode's slot in the inode table.
#[derive(Debug)]
pub struct Accountant {
    free_blocks: u64,
    inodes_in_use: u64,
}

impl Accountant {
    /// Build a fresh accountant for a newly mounted volume, with the root
    /// inode already accounted for.
    pub fn new() -> Self {
        Accountant {
            free_blocks: TOTAL_BLOCKS - 1,
            inodes_in_use: 1,
        }
    }

    /// Current free block count.
    pub fn free_blocks(&self) -> u64 {
        self.free_blocks
    }

    /// Current number of live inodes, including the root.
    pub fn inodes_in_use(&self) -> u64 {
        self.inodes_in_use
    }

    /// Record the creation of a new inode, debiting an inode-table block
    /// when the live count currently sits on a block boundary (spec
    /// §4.1). Call before incrementing any other accounting for the new
    /// inode.
    pub fn note_inode_created(&mut self) -> Result<()> {
        if self.inodes_in_use % *INODES_PER_BLOCK == 0 {
            if self.free_blocks == 0 {
                return Err(FsError::NoFreeSpace);
            }
            self.free_blocks -= 1;
        }
        self.inodes_in_use += 1;
        Ok(())
    }

    /// Record the destruction of an inode, crediting an inode-table block
    /// when the live count is about to drop below a block boundary.
    pub fn note_inode_destroyed(&mut self) {
        if self.inodes_in_use % *INODES_PER_BLOCK == 1 {
            self.free_blocks += 1;
        }
        self.inodes_in_use -= 1;
    }

    /// Debit `n` data blocks, failing without mutating state if
    /// insufficient blocks remain.
    pub fn debit_blocks(&mut self, n: u64) -> Result<()> {
        if n > self.free_blocks {
            return Err(FsError::NoFreeSpace);
        }
        self.free_blocks -= n;
        Ok(())
    }

    /// Credit `n` data blocks back to the free pool.
    pub fn credit_blocks(&mut self, n: u64) {
        self.free_blocks += n;
    }

    /// A read-only snapshot suitable for `statfs`.
    pub fn snapshot(&self) -> SuperBlockSnapshot {
        SuperBlockSnapshot {
            block_size: BLOCK_SIZE,
            total_blocks: TOTAL_BLOCKS,
            free_blocks: self.free_blocks,
            available_blocks: self.free_blocks,
            total_inodes: *MAX_INODES,
            inodes_in_use: self.inodes_in_use,
            max_name_length: MAX_NAME_LENGTH as u64,
        }
    }
}

impl Default for Accountant {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memfs_types::limits::INODES_PER_BLOCK;

    #[test]
    fn inode_table_grows_in_whole_block_steps() {
        let mut acc = Accountant::new();
        let before = acc.free_blocks();
        // root already occupies slot 0 of block 0; filling the rest of
        // that block must not debit another block.
        for _ in 1..*INODES_PER_BLOCK {
            acc.note_inode_created().unwrap();
        }
        assert_eq!(acc.free_blocks(), before);
        // the next inode spills into a new inode-table block.
        acc.note_inode_created().unwrap();
        assert_eq!(acc.free_blocks(), before - 1);
    }

    #[test]
    fn inode_table_shrinks_symmetrically() {
        let mut acc = Accountant::new();
        for _ in 1..=*INODES_PER_BLOCK {
            acc.note_inode_created().unwrap();
        }
        let with_full_block = acc.free_blocks();
        acc.note_inode_destroyed();
        assert_eq!(acc.free_blocks(), with_full_block + 1);
    }

    #[test]
    fn block_debit_rolls_back_on_failure() {
        let mut acc = Accountant::new();
        let total = acc.free_blocks();
        assert!(acc.debit_blocks(total + 1).is_err());
        assert_eq!(acc.free_blocks(), total);
    }
}
