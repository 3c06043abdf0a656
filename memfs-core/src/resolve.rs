//! The resolver: walks a slash-delimited absolute path from the root and
//! produces a [`SearchResult`] carrying the located inode (if any), its
//! parent and ordered neighbours, a primary [`Outcome`], and the
//! caller's permission flags on whatever was found.

use std::cmp::Ordering;

use relative_path::{Component, RelativePath};

use memfs_types::limits::ROOT_INO;
use memfs_types::{CallerContext, Outcome, OutcomeFlags};

use crate::inode::Arena;
use crate::perm;

/// The resolver's output record.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The directory that contains, or would contain, the target name.
    pub parent: Option<u64>,
    /// The sibling immediately before the target's name-sorted position.
    pub left: Option<u64>,
    /// The target inode, if it exists.
    pub exact: Option<u64>,
    /// The sibling immediately after the target's name-sorted position.
    pub right: Option<u64>,
    /// The primary outcome of the resolution.
    pub outcome: Outcome,
    /// The caller's rights on `parent` and `exact`, evaluated at resolve
    /// time.
    pub flags: OutcomeFlags,
}

impl SearchResult {
    fn new() -> Self {
        SearchResult {
            parent: None,
            left: None,
            exact: None,
            right: None,
            outcome: Outcome::NoError,
            flags: OutcomeFlags::empty(),
        }
    }
}

/// Resolve `path` (an absolute, `/`-delimited path) against `arena`,
/// evaluating permissions as `caller`.
pub fn find_inode(arena: &Arena, caller: &CallerContext, path: &str) -> SearchResult {
    let mut result = SearchResult::new();

    if path == "/" {
        result.exact = Some(ROOT_INO);
        result.outcome = Outcome::ExactFound;
        populate_flags(&mut result, arena, caller);
        return result;
    }

    let components: Vec<&str> = RelativePath::new(path.trim_start_matches('/'))
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();

    let mut parent = ROOT_INO;
    let last_index = components.len().saturating_sub(1);

    for (i, name) in components.iter().enumerate() {
        let is_last = i == last_index;

        let parent_inode = match arena.get(parent) {
            Some(p) => p,
            None => {
                result.outcome = Outcome::GeneralError;
                return result;
            }
        };
        if !parent_inode.is_dir() {
            result.outcome = Outcome::HeadNotDirectory;
            return result;
        }
        if !caller.is_superuser() && !perm::can_execute(caller, &parent_inode.stat) {
            result.outcome = Outcome::HeadNoPermission;
            return result;
        }

        let (left, exact, right) = child_search(arena, parent, name);
        result.parent = Some(parent);
        result.left = left;
        result.exact = exact;
        result.right = right;

        match (exact, is_last) {
            (Some(_), true) => {
                result.outcome = Outcome::ExactFound;
            }
            (Some(e), false) => {
                parent = e;
                continue;
            }
            (None, true) => {
                result.outcome = Outcome::ExactNotFound;
            }
            (None, false) => {
                result.outcome = Outcome::HeadNotFound;
                return result;
            }
        }
    }

    populate_flags(&mut result, arena, caller);
    result
}

/// Linear scan of `parent`'s sorted sibling list for `name`: stops at the
/// first sibling whose name is `>= name`, bracketing the insertion point
/// if no exact match exists.
fn child_search(arena: &Arena, parent: u64, name: &str) -> (Option<u64>, Option<u64>, Option<u64>) {
    let mut left = None;
    let mut current = arena.get(parent).and_then(|p| p.first_child);
    while let Some(serial) = current {
        let child = arena.get(serial).expect("tree pointer names a live inode");
        match child.name.as_str().cmp(name) {
            Ordering::Less => {
                left = Some(serial);
                current = child.right;
            }
            Ordering::Equal => return (left, Some(serial), child.right),
            Ordering::Greater => return (left, None, Some(serial)),
        }
    }
    (left, None, None)
}

fn populate_flags(result: &mut SearchResult, arena: &Arena, caller: &CallerContext) {
    let mut flags = OutcomeFlags::empty();
    if let Some(parent) = result.parent.and_then(|s| arena.get(s)) {
        flags = flags
            .set_can_read_parent(perm::can_read(caller, &parent.stat))
            .set_can_write_parent(perm::can_write(caller, &parent.stat))
            .set_can_execute_parent(perm::can_execute(caller, &parent.stat));
    }
    if let Some(exact) = result.exact.and_then(|s| arena.get(s)) {
        flags = flags
            .set_is_owner(perm::is_owner(caller, &exact.stat))
            .set_can_read_exact(perm::can_read(caller, &exact.stat))
            .set_can_write_exact(perm::can_write(caller, &exact.stat))
            .set_can_execute_exact(perm::can_execute(caller, &exact.stat));
    }
    result.flags = flags;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Inode;
    use crate::tree;
    use memfs_types::stat::{FType, Stat};

    fn make(ino: u64, name: &str, ftype: FType, mode: u32, uid: u32, gid: u32) -> Inode {
        Inode {
            stat: Stat {
                ino,
                mode: ftype.mode_bits() | mode,
                nlink: 1,
                uid,
                gid,
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

    fn root_owned_by(uid: u32) -> Arena {
        Arena::new(make(ROOT_INO, "ROOT", FType::Directory, 0o755, uid, uid))
    }

    #[test]
    fn root_path_resolves_to_exact_found() {
        let arena = root_owned_by(0);
        let caller = CallerContext::new(0, 0, 0, vec![]);
        let res = find_inode(&arena, &caller, "/");
        assert_eq!(res.outcome, Outcome::ExactFound);
        assert_eq!(res.exact, Some(ROOT_INO));
    }

    #[test]
    fn missing_leaf_reports_exact_not_found_with_bracket() {
        let mut arena = root_owned_by(1000);
        let a = arena.reserve_serial().unwrap();
        arena.install(a, make(a, "a", FType::Directory, 0o755, 1000, 1000));
        tree::insert(&mut arena, ROOT_INO, None, None, a);
        let c = arena.reserve_serial().unwrap();
        arena.install(c, make(c, "c", FType::Directory, 0o755, 1000, 1000));
        tree::insert(&mut arena, ROOT_INO, Some(a), None, c);

        let caller = CallerContext::new(1000, 1000, 0, vec![]);
        let res = find_inode(&arena, &caller, "/b");
        assert_eq!(res.outcome, Outcome::ExactNotFound);
        assert_eq!(res.left, Some(a));
        assert_eq!(res.right, Some(c));
    }

    #[test]
    fn missing_intermediate_component_is_head_not_found() {
        let arena = root_owned_by(0);
        let caller = CallerContext::new(0, 0, 0, vec![]);
        let res = find_inode(&arena, &caller, "/missing/leaf");
        assert_eq!(res.outcome, Outcome::HeadNotFound);
    }

    #[test]
    fn file_in_the_middle_of_a_path_is_head_not_directory() {
        let mut arena = root_owned_by(1000);
        let f = arena.reserve_serial().unwrap();
        arena.install(f, make(f, "f", FType::Regular, 0o644, 1000, 1000));
        tree::insert(&mut arena, ROOT_INO, None, None, f);

        let caller = CallerContext::new(1000, 1000, 0, vec![]);
        let res = find_inode(&arena, &caller, "/f/anything");
        assert_eq!(res.outcome, Outcome::HeadNotDirectory);
    }

    #[test]
    fn unsearchable_parent_denies_non_root_caller() {
        let mut arena = root_owned_by(1000);
        let p = arena.reserve_serial().unwrap();
        arena.install(p, make(p, "p", FType::Directory, 0o700, 1000, 1000));
        tree::insert(&mut arena, ROOT_INO, None, None, p);

        let caller = CallerContext::new(1001, 1001, 0, vec![]);
        let res = find_inode(&arena, &caller, "/p/x");
        assert_eq!(res.outcome, Outcome::HeadNoPermission);
    }

    #[test]
    fn superuser_bypasses_search_permission() {
        let mut arena = root_owned_by(1000);
        let p = arena.reserve_serial().unwrap();
        arena.install(p, make(p, "p", FType::Directory, 0o700, 1000, 1000));
        tree::insert(&mut arena, ROOT_INO, None, None, p);

        let caller = CallerContext::new(0, 0, 0, vec![]);
        let res = find_inode(&arena, &caller, "/p/x");
        assert_eq!(res.outcome, Outcome::ExactNotFound);
    }
}
