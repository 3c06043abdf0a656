//! Data allocator: grows or shrinks a regular file's data buffer in
//! whole blocks, keeping the superblock's free-block count in lockstep
//! and zero-filling newly exposed bytes on grow.

use std::cmp::Ordering;

use memfs_types::error::Result;
use memfs_types::limits::BLOCK_SIZE;

use crate::inode::Inode;
use crate::superblock::Accountant;

fn blocks_for(size: u64) -> u64 {
    (size + BLOCK_SIZE - 1) / BLOCK_SIZE
}

/// Resize `inode`'s data buffer so it can hold `new_size` bytes, debiting
/// or crediting `accountant` for the whole-block delta. Fails without
/// mutating either the buffer or the accountant if insufficient blocks
/// are free.
///
/// Zeroing newly exposed bytes on grow is done against the old logical
/// `size`, not the old buffer capacity: a grow that stays within the
/// already-allocated block does not touch the `Vec`'s length at all, so
/// `resize` alone would leave whatever a previous, larger `size` had
/// written there.
pub fn alloc(accountant: &mut Accountant, inode: &mut Inode, new_size: u64) -> Result<()> {
    let new_block_count = blocks_for(new_size);
    let current_block_count = inode.stat.blocks;
    let old_size = inode.stat.size;

    match new_block_count.cmp(&current_block_count) {
        Ordering::Greater => accountant.debit_blocks(new_block_count - current_block_count)?,
        Ordering::Less => accountant.credit_blocks(current_block_count - new_block_count),
        Ordering::Equal => {}
    }

    let new_capacity = (new_block_count * BLOCK_SIZE) as usize;
    if new_capacity == 0 {
        inode.data = None;
    } else {
        match inode.data.as_mut() {
            Some(buf) => {
                buf.resize(new_capacity, 0);
                if new_size > old_size {
                    buf[old_size as usize..new_size as usize].fill(0);
                }
            }
            None => inode.data = Some(vec![0u8; new_capacity]),
        }
    }

    inode.stat.size = new_size;
    inode.stat.blocks = new_block_count;
    Ok(())
}

/// Free `inode`'s data buffer entirely, crediting its blocks back.
pub fn dealloc(accountant: &mut Accountant, inode: &mut Inode) {
    if inode.stat.blocks > 0 {
        accountant.credit_blocks(inode.stat.blocks);
    }
    inode.data = None;
    inode.stat.size = 0;
    inode.stat.blocks = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use memfs_types::stat::{FType, Stat};

    fn empty_file() -> Inode {
        Inode {
            stat: Stat {
                ino: 2,
                mode: FType::Regular.mode_bits() | 0o644,
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
            name: "f".to_string(),
            parent: None,
            left: None,
            right: None,
            first_child: None,
            last_child: None,
            data: None,
        }
    }

    #[test]
    fn grow_zero_fills_newly_exposed_bytes() {
        let mut acc = Accountant::new();
        let mut file = empty_file();
        let before = acc.free_blocks();

        alloc(&mut acc, &mut file, 10).unwrap();
        assert_eq!(file.stat.blocks, 1);
        assert_eq!(acc.free_blocks(), before - 1);
        assert_eq!(file.data.as_ref().unwrap().len(), BLOCK_SIZE as usize);
        assert!(file.data.as_ref().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn shrink_to_zero_frees_the_buffer_and_credits_blocks() {
        let mut acc = Accountant::new();
        let mut file = empty_file();
        alloc(&mut acc, &mut file, 5000).unwrap();
        let mid = acc.free_blocks();

        alloc(&mut acc, &mut file, 0).unwrap();
        assert!(file.data.is_none());
        assert_eq!(file.stat.blocks, 0);
        assert!(acc.free_blocks() > mid);
    }

    #[test]
    fn regrow_within_the_same_block_zero_fills_from_the_old_size_not_the_old_capacity() {
        let mut acc = Accountant::new();
        let mut file = empty_file();

        alloc(&mut acc, &mut file, 10).unwrap();
        file.data.as_mut().unwrap()[..10].copy_from_slice(b"helloworld");

        // shrinking then regrowing within the same already-allocated block
        // must not leave "loworld" visible in the newly re-exposed range.
        alloc(&mut acc, &mut file, 3).unwrap();
        alloc(&mut acc, &mut file, 8).unwrap();

        let data = file.data.as_ref().unwrap();
        assert_eq!(&data[..3], b"hel");
        assert!(data[3..8].iter().all(|&b| b == 0));
    }

    #[test]
    fn grow_beyond_capacity_fails_and_leaves_state_untouched() {
        let mut acc = Accountant::new();
        let mut file = empty_file();
        let huge = (acc.free_blocks() + 1) * BLOCK_SIZE;
        let before_free = acc.free_blocks();

        assert!(alloc(&mut acc, &mut file, huge).is_err());
        assert_eq!(acc.free_blocks(), before_free);
        assert_eq!(file.stat.blocks, 0);
        assert!(file.data.is_none());
    }

    #[test]
    fn dealloc_credits_blocks_back() {
        let mut acc = Accountant::new();
        let mut file = empty_file();
        alloc(&mut acc, &mut file, 9000).unwrap();
        let with_data = acc.free_blocks();

        dealloc(&mut acc, &mut file);
        assert!(file.data.is_none());
        assert_eq!(file.stat.size, 0);
        assert!(acc.free_blocks() > with_data);
    }
}
