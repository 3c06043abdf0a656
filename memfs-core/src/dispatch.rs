//! Operation dispatcher: one method per filesystem operation. Each
//! composes the resolver, the tree operator, the data allocator, and the
//! superblock accountant, then maps the core outcome to a POSIX errno.
//! All state lives behind a single mutex: every method locks it for the
//! operation's full resolve-mutate sequence and releases it on return.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use relative_path::{Component, RelativePath};

use memfs_types::error::FsError;
use memfs_types::limits::ROOT_INO;
use memfs_types::{CallerContext, FType, Outcome, Stat, SuperBlockSnapshot};

use crate::alloc;
use crate::inode::{Arena, Inode};
use crate::resolve::find_inode;
use crate::superblock::Accountant;
use crate::tree;

/// One entry of a `readdir` listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// The entry's inode serial number.
    pub ino: u64,
    /// The entry's name (`.`, `..`, or a child's own name).
    pub name: String,
    /// The entry's type.
    pub file_type: FType,
}

/// Timestamps to apply in a `utimens` call; `None` leaves the
/// corresponding field untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeUpdate {
    /// New access time, if requested.
    pub atime: Option<i64>,
    /// New modification time, if requested.
    pub mtime: Option<i64>,
}

/// Result alias for dispatcher methods: `Ok` on success, `Err(errno)`
/// with a positive POSIX error number otherwise; negation for the
/// bridge's `int` return happens at the FUSE boundary.
pub type OpResult<T> = Result<T, i32>;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Map a terminal resolver outcome (anything other than `ExactFound`/
/// `ExactNotFound`, which callers interpret themselves) to the errno
/// shared by every path-resolving operation.
fn errno_for_outcome(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::ExactNotFound | Outcome::HeadNotFound => libc::ENOENT,
        Outcome::HeadNotDirectory => libc::ENOTDIR,
        Outcome::HeadNoPermission => libc::EACCES,
        Outcome::NoFreeSpace => libc::ENOSPC,
        Outcome::ExactFound | Outcome::NoError | Outcome::GeneralError => libc::EIO,
    }
}

fn tail_component(path: &str) -> Option<String> {
    RelativePath::new(path.trim_start_matches('/'))
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string()),
            _ => None,
        })
        .last()
}

struct State {
    arena: Arena,
    accountant: Accountant,
    handles: HashMap<u64, u64>,
    next_handle: u64,
}

/// The whole filesystem: the inode arena, the superblock accountant, and
/// the open-handle table, guarded by one mutex. Constructed once at
/// mount time via [`Filesystem::init`].
pub struct Filesystem {
    state: Mutex<State>,
}

impl Filesystem {
    /// Mount a fresh, empty volume. Seeds the root directory's ownership
    /// and permission bits from the mounting caller's uid/gid/umask
    /// (`S_IFDIR | (0777 & !umask)`) rather than a hard-coded mode.
    pub fn init(caller: &CallerContext) -> Self {
        let t = now();
        let root = Inode {
            stat: Stat {
                ino: ROOT_INO,
                mode: FType::Directory.mode_bits() | (0o777 & !caller.umask),
                nlink: 1,
                uid: caller.uid,
                gid: caller.gid,
                rdev: 0,
                size: 0,
                blocks: 0,
                atime: t,
                mtime: t,
                ctime: t,
            },
            name: "ROOT".to_string(),
            parent: None,
            left: None,
            right: None,
            first_child: None,
            last_child: None,
            data: None,
        };
        Filesystem {
            state: Mutex::new(State {
                arena: Arena::new(root),
                accountant: Accountant::new(),
                handles: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    /// `getattr(path)`: copy the target's stat block.
    pub fn getattr(&self, caller: &CallerContext, path: &str) -> OpResult<Stat> {
        let state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => Ok(state.arena.get(result.exact.unwrap()).unwrap().stat),
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `mkdir(path, mode)`: create a directory inode at `path`.
    pub fn mkdir(&self, caller: &CallerContext, path: &str, mode: u32) -> OpResult<Stat> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => Err(libc::EEXIST),
            Outcome::ExactNotFound => {
                if !result.flags.can_write_parent() {
                    return Err(libc::EACCES);
                }
                let parent = result.parent.unwrap();
                let name = tail_component(path).ok_or(libc::ENOENT)?;
                create_inode(&mut state, parent, result.left, result.right, name, |ino| {
                    new_inode(ino, FType::Directory, mode, caller)
                })
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `mknod(path, mode, rdev)`: create a regular-file inode at `path`
    /// with a zero-byte data buffer. Only the regular-file type is
    /// supported; this data model carries no special files.
    pub fn mknod(&self, caller: &CallerContext, path: &str, mode: u32, _rdev: u64) -> OpResult<Stat> {
        if FType::from_mode(mode) != Some(FType::Regular) {
            return Err(libc::ENOSYS);
        }
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => Err(libc::EEXIST),
            Outcome::ExactNotFound => {
                if !result.flags.can_write_parent() {
                    return Err(libc::EACCES);
                }
                let parent = result.parent.unwrap();
                let name = tail_component(path).ok_or(libc::ENOENT)?;
                create_inode(&mut state, parent, result.left, result.right, name, |ino| {
                    new_inode(ino, FType::Regular, mode, caller)
                })
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `rmdir(path)`: destroy an empty directory.
    pub fn rmdir(&self, caller: &CallerContext, path: &str) -> OpResult<()> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                let serial = result.exact.unwrap();
                if serial == ROOT_INO {
                    return Err(libc::EIO);
                }
                let node = state.arena.get(serial).unwrap();
                if !node.is_dir() {
                    return Err(libc::ENOTDIR);
                }
                if node.first_child.is_some() {
                    return Err(libc::ENOTEMPTY);
                }
                if !result.flags.can_write_parent() {
                    return Err(libc::EACCES);
                }
                tree::destroy(&mut state.arena, &mut state.accountant, serial);
                Ok(())
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `unlink(path)`: destroy any entry, directory or not, at `path`.
    pub fn unlink(&self, caller: &CallerContext, path: &str) -> OpResult<()> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                let serial = result.exact.unwrap();
                if serial == ROOT_INO {
                    return Err(libc::EIO);
                }
                if !result.flags.can_write_parent() {
                    return Err(libc::EACCES);
                }
                tree::destroy(&mut state.arena, &mut state.accountant, serial);
                Ok(())
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `opendir(path)`: validate and stash a directory handle.
    pub fn opendir(&self, caller: &CallerContext, path: &str) -> OpResult<u64> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                let serial = result.exact.unwrap();
                if !state.arena.get(serial).unwrap().is_dir() {
                    return Err(libc::ENOTDIR);
                }
                if !result.flags.can_read_exact() {
                    return Err(libc::EACCES);
                }
                Ok(stash_handle(&mut state, serial))
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `readdir(handle)`: emit `.`, `..`, then each child in sorted order.
    pub fn readdir(&self, handle: u64) -> OpResult<Vec<DirEntry>> {
        let state = self.state.lock().unwrap();
        let serial = *state.handles.get(&handle).ok_or(libc::EIO)?;
        if !state.arena.is_live(serial) {
            return Err(libc::EIO);
        }
        let node = state.arena.get(serial).unwrap();
        let mut entries = vec![
            DirEntry {
                ino: serial,
                name: ".".to_string(),
                file_type: FType::Directory,
            },
            DirEntry {
                ino: node.parent.unwrap_or(ROOT_INO),
                name: "..".to_string(),
                file_type: FType::Directory,
            },
        ];
        let mut child = node.first_child;
        while let Some(c) = child {
            let child_inode = state.arena.get(c).unwrap();
            entries.push(DirEntry {
                ino: c,
                name: child_inode.name.clone(),
                file_type: child_inode.stat.file_type(),
            });
            child = child_inode.right;
        }
        Ok(entries)
    }

    /// `open(path, flags)`: validate the requested access mode against
    /// the caller's rights and stash a file handle.
    pub fn open(&self, caller: &CallerContext, path: &str, flags: i32) -> OpResult<u64> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                let serial = result.exact.unwrap();
                if state.arena.get(serial).unwrap().is_dir() {
                    return Err(libc::EISDIR);
                }
                let access_mode = flags & libc::O_ACCMODE;
                let rights_ok = match access_mode {
                    libc::O_RDONLY => result.flags.can_read_exact(),
                    libc::O_WRONLY => result.flags.can_write_exact(),
                    libc::O_RDWR => result.flags.can_read_exact() && result.flags.can_write_exact(),
                    _ => false,
                };
                if !rights_ok {
                    return Err(libc::EACCES);
                }
                Ok(stash_handle(&mut state, serial))
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// Release a previously issued file or directory handle. Idempotent.
    pub fn release(&self, handle: u64) {
        let mut state = self.state.lock().unwrap();
        state.handles.remove(&handle);
    }

    /// `utimens(path, times)`: overwrite access/modify timestamps
    /// unconditionally; there is no permission precondition beyond
    /// resolving the path.
    pub fn utimens(&self, caller: &CallerContext, path: &str, times: TimeUpdate) -> OpResult<Stat> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                let serial = result.exact.unwrap();
                let node = state.arena.get_mut(serial).unwrap();
                if let Some(a) = times.atime {
                    node.stat.atime = a;
                }
                if let Some(m) = times.mtime {
                    node.stat.mtime = m;
                }
                node.stat.ctime = now();
                Ok(node.stat)
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `read(handle, size, offset)`: copy up to `size` bytes starting at
    /// `offset` from the handle's target.
    pub fn read(&self, handle: u64, size: usize, offset: u64) -> OpResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let serial = *state.handles.get(&handle).ok_or(libc::EIO)?;
        if !state.arena.is_live(serial) {
            return Err(libc::EIO);
        }
        let node = state.arena.get(serial).unwrap();
        if node.is_dir() {
            return Err(libc::EISDIR);
        }
        let data = match &node.data {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        let size_u64 = node.stat.size;
        if offset >= size_u64 {
            return Ok(Vec::new());
        }
        let start = offset as usize;
        let end = ((offset + size as u64).min(size_u64)) as usize;
        Ok(data[start..end].to_vec())
    }

    /// `write(handle, buf, offset)`: grow the target as needed, then copy
    /// `buf` into place at `offset`.
    pub fn write(&self, handle: u64, buf: &[u8], offset: u64) -> OpResult<u64> {
        let mut state = self.state.lock().unwrap();
        let serial = *state.handles.get(&handle).ok_or(libc::EIO)?;
        if !state.arena.is_live(serial) {
            return Err(libc::EIO);
        }
        let required = offset + buf.len() as u64;
        let current_size = state.arena.get(serial).unwrap().stat.size;
        let target_size = required.max(current_size);

        if target_size > current_size {
            let State { arena, accountant, .. } = &mut *state;
            let node = arena.get_mut(serial).unwrap();
            if let Err(FsError::NoFreeSpace) = alloc::alloc(accountant, node, target_size) {
                return Err(libc::ENOSPC);
            }
        }

        let node = state.arena.get_mut(serial).unwrap();
        let data = node.data.get_or_insert_with(Vec::new);
        let start = offset as usize;
        let end = start + buf.len();
        data[start..end].copy_from_slice(buf);
        node.stat.mtime = now();
        Ok(buf.len() as u64)
    }

    /// `truncate(path, size)`: resize the target's data buffer.
    pub fn truncate(&self, caller: &CallerContext, path: &str, size: u64) -> OpResult<Stat> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                if !result.flags.can_write_exact() {
                    return Err(libc::EACCES);
                }
                let serial = result.exact.unwrap();
                let State { arena, accountant, .. } = &mut *state;
                let node = arena.get_mut(serial).unwrap();
                match alloc::alloc(accountant, node, size) {
                    Ok(()) => {
                        node.stat.mtime = now();
                        Ok(node.stat)
                    }
                    Err(FsError::NoFreeSpace) => Err(libc::ENOSPC),
                    Err(_) => Err(libc::EIO),
                }
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `chmod(path, mode)`: overwrite the target's permission (and
    /// special) bits. Restricted to the inode's owner.
    pub fn chmod(&self, caller: &CallerContext, path: &str, mode: u32) -> OpResult<Stat> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                if !result.flags.is_owner() {
                    return Err(libc::EPERM);
                }
                let serial = result.exact.unwrap();
                let node = state.arena.get_mut(serial).unwrap();
                let type_bits = node.stat.file_type().mode_bits();
                node.stat.mode = type_bits | (mode & 0o7777);
                node.stat.ctime = now();
                Ok(node.stat)
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `chown(path, uid, gid)`: overwrite ownership. Restricted to uid 0.
    pub fn chown(&self, caller: &CallerContext, path: &str, uid: Option<u32>, gid: Option<u32>) -> OpResult<Stat> {
        let mut state = self.state.lock().unwrap();
        let result = find_inode(&state.arena, caller, path);
        match result.outcome {
            Outcome::ExactFound => {
                if !caller.is_superuser() {
                    return Err(libc::EPERM);
                }
                let serial = result.exact.unwrap();
                let node = state.arena.get_mut(serial).unwrap();
                if let Some(u) = uid {
                    node.stat.uid = u;
                }
                if let Some(g) = gid {
                    node.stat.gid = g;
                }
                node.stat.ctime = now();
                Ok(node.stat)
            }
            other => Err(errno_for_outcome(other)),
        }
    }

    /// `rename(old, new)`: move `old`'s inode to `new`'s bracket,
    /// renaming it to `new`'s tail component so sibling-name uniqueness
    /// holds at the old position too.
    pub fn rename(&self, caller: &CallerContext, old: &str, new: &str) -> OpResult<()> {
        let mut state = self.state.lock().unwrap();

        let old_result = find_inode(&state.arena, caller, old);
        match old_result.outcome {
            Outcome::ExactFound => {}
            other => return Err(errno_for_outcome(other)),
        }
        if !old_result.flags.can_write_parent() {
            return Err(libc::EACCES);
        }

        let new_result = find_inode(&state.arena, caller, new);
        match new_result.outcome {
            Outcome::ExactNotFound => {}
            Outcome::ExactFound => return Err(libc::EEXIST),
            other => return Err(errno_for_outcome(other)),
        }
        if !new_result.flags.can_write_parent() {
            return Err(libc::EACCES);
        }

        let old_serial = old_result.exact.unwrap();
        if old_serial == ROOT_INO {
            return Err(libc::EACCES);
        }
        let new_parent = new_result.parent.unwrap();
        let new_name = tail_component(new).ok_or(libc::EINVAL)?;

        // Extract first, then re-resolve the destination bracket: if `new`'s
        // bracket happened to be bounded by `old_serial` itself (an in-place
        // rename within the same directory), the bracket computed above is
        // now stale and would splice the node next to its own detached self.
        tree::extract(&mut state.arena, old_serial);
        if let Some(node) = state.arena.get_mut(old_serial) {
            node.name = new_name;
        }
        let fresh = find_inode(&state.arena, caller, new);
        tree::insert(&mut state.arena, new_parent, fresh.left, fresh.right, old_serial);
        Ok(())
    }

    /// `statfs`: copy the superblock snapshot. Ignores its path argument
    /// entirely — there is only one volume, so every path shares the same
    /// accounting.
    pub fn statfs(&self) -> SuperBlockSnapshot {
        let state = self.state.lock().unwrap();
        state.accountant.snapshot()
    }
}

fn stash_handle(state: &mut State, serial: u64) -> u64 {
    let handle = state.next_handle;
    state.next_handle += 1;
    state.handles.insert(handle, serial);
    handle
}

fn new_inode(ino: u64, ftype: FType, mode: u32, caller: &CallerContext) -> Inode {
    let t = now();
    Inode {
        stat: Stat {
            ino,
            mode: ftype.mode_bits() | (mode & 0o7777),
            nlink: 1,
            uid: caller.uid,
            gid: caller.gid,
            rdev: 0,
            size: 0,
            blocks: 0,
            atime: t,
            mtime: t,
            ctime: t,
        },
        name: String::new(),
        parent: None,
        left: None,
        right: None,
        first_child: None,
        last_child: None,
        data: None,
    }
}

/// Shared create-and-insert sequence for `mkdir`/`mknod`: reserve a
/// serial, debit the inode-table accounting, build the inode via
/// `build`, allocate its (possibly zero-byte) data buffer, and splice it
/// into the bracket the resolver already located. Unwinds the serial
/// reservation if inode-table accounting fails, so a failed creation
/// leaves no partial trace behind.
fn create_inode(
    state: &mut State,
    parent: u64,
    left: Option<u64>,
    right: Option<u64>,
    name: String,
    build: impl FnOnce(u64) -> Inode,
) -> OpResult<Stat> {
    let serial = state.arena.reserve_serial().ok_or(libc::ENOSPC)?;
    if let Err(FsError::NoFreeSpace) = state.accountant.note_inode_created() {
        state.arena.release_serial(serial);
        return Err(libc::ENOSPC);
    }

    let mut inode = build(serial);
    inode.name = name;

    if inode.stat.file_type() == FType::Regular {
        if alloc::alloc(&mut state.accountant, &mut inode, 0).is_err() {
            state.accountant.note_inode_destroyed();
            state.arena.release_serial(serial);
            return Err(libc::ENOSPC);
        }
    }

    let stat = inode.stat;
    state.arena.install(serial, inode);
    tree::insert(&mut state.arena, parent, left, right, serial);
    Ok(stat)
}
