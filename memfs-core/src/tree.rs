//! Tree mutation algebra: insert a node at a known bracket, extract a
//! node from its parent's sibling list, and recursively destroy a
//! subtree. Every sibling-adjacency case is implemented as its own
//! exhaustive branch rather than collapsed into a general-purpose
//! linked-list splice.

use crate::alloc;
use crate::inode::Arena;
use crate::superblock::Accountant;
use memfs_types::limits::ROOT_INO;

/// Splice `new` into `parent`'s sibling list between `left` and `right`.
/// `parent` must already be live; `left`/`right`, when present, must
/// already be children of `parent`. All four sibling-adjacency cases are
/// distinct and exhaustive.
pub fn insert(arena: &mut Arena, parent: u64, left: Option<u64>, right: Option<u64>, new: u64) {
    if let Some(node) = arena.get_mut(new) {
        node.parent = Some(parent);
        node.left = left;
        node.right = right;
    }

    match (left, right) {
        (None, None) => {
            if let Some(p) = arena.get_mut(parent) {
                p.first_child = Some(new);
                p.last_child = Some(new);
            }
        }
        (None, Some(r)) => {
            if let Some(right_node) = arena.get_mut(r) {
                right_node.left = Some(new);
            }
            if let Some(p) = arena.get_mut(parent) {
                p.first_child = Some(new);
            }
        }
        (Some(l), None) => {
            if let Some(left_node) = arena.get_mut(l) {
                left_node.right = Some(new);
            }
            if let Some(p) = arena.get_mut(parent) {
                p.last_child = Some(new);
            }
        }
        (Some(l), Some(r)) => {
            if let Some(left_node) = arena.get_mut(l) {
                left_node.right = Some(new);
            }
            if let Some(right_node) = arena.get_mut(r) {
                right_node.left = Some(new);
            }
        }
    }
}

/// Remove `node` from its parent's sibling list, restoring neighbours'
/// pointers, and detach it from its parent. Idempotent: calling this on
/// an already-detached node (or the root) is a no-op.
pub fn extract(arena: &mut Arena, node: u64) {
    let (parent, left, right) = match arena.get(node) {
        Some(n) => (n.parent, n.left, n.right),
        None => return,
    };
    let Some(parent) = parent else {
        return;
    };

    match (left, right) {
        (None, None) => {
            if let Some(p) = arena.get_mut(parent) {
                p.first_child = None;
                p.last_child = None;
            }
        }
        (None, Some(r)) => {
            if let Some(right_node) = arena.get_mut(r) {
                right_node.left = None;
            }
            if let Some(p) = arena.get_mut(parent) {
                p.first_child = Some(r);
            }
        }
        (Some(l), None) => {
            if let Some(left_node) = arena.get_mut(l) {
                left_node.right = None;
            }
            if let Some(p) = arena.get_mut(parent) {
                p.last_child = Some(l);
            }
        }
        (Some(l), Some(r)) => {
            if let Some(left_node) = arena.get_mut(l) {
                left_node.right = Some(r);
            }
            if let Some(right_node) = arena.get_mut(r) {
                right_node.left = Some(l);
            }
        }
    }

    if let Some(n) = arena.get_mut(node) {
        n.parent = None;
        n.left = None;
        n.right = None;
    }
}

/// Recursively destroy `node`'s entire subtree: every descendant is
/// extracted, its data buffer released (crediting blocks), and its
/// serial released (debiting the inode table if a block is freed),
/// post-order, before `node` itself. Uses an explicit stack rather than
/// native recursion so destruction depth is bounded only by heap size,
/// not call-stack depth.
///
/// The root may never be destroyed through this path; callers must not
/// invoke it with [`ROOT_INO`].
pub fn destroy(arena: &mut Arena, accountant: &mut Accountant, node: u64) {
    debug_assert_ne!(node, ROOT_INO, "the root is never destroyed outside teardown");

    // Post-order via two stacks: push node, then its children, and
    // reverse the resulting visitation order so children pop before
    // their parent.
    let mut to_visit = vec![node];
    let mut post_order = Vec::new();
    while let Some(current) = to_visit.pop() {
        post_order.push(current);
        if let Some(n) = arena.get(current) {
            let mut child = n.first_child;
            while let Some(c) = child {
                to_visit.push(c);
                child = arena.get(c).and_then(|n| n.right);
            }
        }
    }

    for serial in post_order.into_iter().rev() {
        extract(arena, serial);
        if let Some(mut removed) = arena.remove(serial) {
            if removed.data.is_some() {
                alloc::dealloc(accountant, &mut removed);
            }
        }
        accountant.note_inode_destroyed();
        arena.release_serial(serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Inode;
    use memfs_types::stat::{FType, Stat};

    fn make_dir(ino: u64, name: &str) -> Inode {
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

    fn root_arena() -> Arena {
        Arena::new(make_dir(ROOT_INO, "ROOT"))
    }

    #[test]
    fn insert_maintains_order_for_all_four_cases() {
        let mut arena = root_arena();
        let mut accountant = Accountant::new();
        let b = arena.reserve_serial().unwrap();
        arena.install(b, make_dir(b, "b"));
        insert(&mut arena, ROOT_INO, None, None, b);
        assert_eq!(arena.get(ROOT_INO).unwrap().first_child, Some(b));
        assert_eq!(arena.get(ROOT_INO).unwrap().last_child, Some(b));

        let a = arena.reserve_serial().unwrap();
        arena.install(a, make_dir(a, "a"));
        insert(&mut arena, ROOT_INO, None, Some(b), a);
        assert_eq!(arena.get(ROOT_INO).unwrap().first_child, Some(a));
        assert_eq!(arena.get(b).unwrap().left, Some(a));

        let d = arena.reserve_serial().unwrap();
        arena.install(d, make_dir(d, "d"));
        insert(&mut arena, ROOT_INO, Some(b), None, d);
        assert_eq!(arena.get(ROOT_INO).unwrap().last_child, Some(d));
        assert_eq!(arena.get(b).unwrap().right, Some(d));

        let c = arena.reserve_serial().unwrap();
        arena.install(c, make_dir(c, "c"));
        insert(&mut arena, ROOT_INO, Some(b), Some(d), c);
        assert_eq!(arena.get(b).unwrap().right, Some(c));
        assert_eq!(arena.get(d).unwrap().left, Some(c));

        // a, b, c, d now form the full sorted sibling chain.
        let mut names = Vec::new();
        let mut cur = arena.get(ROOT_INO).unwrap().first_child;
        while let Some(s) = cur {
            names.push(arena.get(s).unwrap().name.clone());
            cur = arena.get(s).unwrap().right;
        }
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        let _ = accountant.free_blocks();
    }

    #[test]
    fn extract_is_idempotent() {
        let mut arena = root_arena();
        let a = arena.reserve_serial().unwrap();
        arena.install(a, make_dir(a, "a"));
        insert(&mut arena, ROOT_INO, None, None, a);
        extract(&mut arena, a);
        assert_eq!(arena.get(ROOT_INO).unwrap().first_child, None);
        extract(&mut arena, a); // no-op, must not panic
        assert_eq!(arena.get(a).unwrap().parent, None);
    }

    #[test]
    fn destroy_recursively_frees_descendants() {
        let mut arena = root_arena();
        let mut accountant = Accountant::new();
        let dir = arena.reserve_serial().unwrap();
        arena.install(dir, make_dir(dir, "d"));
        insert(&mut arena, ROOT_INO, None, None, dir);
        accountant.note_inode_created().unwrap();

        let child = arena.reserve_serial().unwrap();
        arena.install(child, make_dir(child, "c"));
        insert(&mut arena, dir, None, None, child);
        accountant.note_inode_created().unwrap();

        destroy(&mut arena, &mut accountant, dir);
        assert!(!arena.is_live(dir));
        assert!(!arena.is_live(child));
        assert_eq!(arena.get(ROOT_INO).unwrap().first_child, None);
    }
}
