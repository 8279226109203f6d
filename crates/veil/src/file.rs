//! Host file-handle model.
//!
//! An [`OpenFile`] is a live handle with a stable [`HandleId`] and a
//! replaceable operations table. The enumeration filter displaces that
//! table while the handle is open and restores it on release.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use veil_core::error::errno;

/// Identity of an open handle. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A negative errno returned by a host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub i32);

/// Result of a host file operation.
pub type FileResult = std::result::Result<(), Errno>;

/// Why a path could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The object is detached from the namespace.
    #[error("path unresolvable")]
    Unresolvable,

    /// The inode has no directory entry.
    #[error("inode has no alias")]
    NoAlias,

    /// The path does not fit in the resolution buffer.
    #[error("path too long")]
    NameTooLong,
}

impl ResolveError {
    /// The negative errno a hook propagates for this failure.
    pub fn errno(self) -> i32 {
        -match self {
            ResolveError::Unresolvable | ResolveError::NoAlias => errno::ENOENT,
            ResolveError::NameTooLong => errno::ENAMETOOLONG,
        }
    }
}

/// Where an object sits in the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Reachable at this absolute path.
    Path(String),
    /// Unlinked or otherwise unreachable.
    Detached,
    /// An inode with no directory entry.
    Anonymous,
}

impl Location {
    pub fn path(path: impl Into<String>) -> Self {
        Location::Path(path.into())
    }

    /// Compute the path, failing if it would not fit in `path_max` bytes
    /// including a terminator.
    pub fn resolve(&self, path_max: usize) -> Result<&str, ResolveError> {
        match self {
            Location::Path(p) if p.len() < path_max => Ok(p),
            Location::Path(_) => Err(ResolveError::NameTooLong),
            Location::Detached => Err(ResolveError::Unresolvable),
            Location::Anonymous => Err(ResolveError::NoAlias),
        }
    }
}

/// An inode as seen by attribute and permission checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    location: Location,
    private: bool,
}

impl Inode {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            private: false,
        }
    }

    /// An inode internal to the host, never subject to hiding.
    pub fn private(location: Location) -> Self {
        Self {
            location,
            private: true,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

/// One directory entry produced during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    pub offset: i64,
    pub ino: u64,
    pub d_type: u8,
}

/// Enumeration cursor plus the sink that receives entries.
///
/// The actor returns `false` to stop enumeration early.
pub struct DirContext<'a> {
    pub pos: i64,
    pub(crate) actor: &'a mut dyn FnMut(&DirEntry<'_>) -> bool,
}

impl<'a> DirContext<'a> {
    pub fn new(pos: i64, actor: &'a mut dyn FnMut(&DirEntry<'_>) -> bool) -> Self {
        Self { pos, actor }
    }

    /// Hand an entry to the actor.
    pub fn emit(&mut self, entry: &DirEntry<'_>) -> bool {
        (self.actor)(entry)
    }
}

/// The operations table attached to an open handle.
pub trait FileOperations: Send + Sync {
    /// Enumerate directory entries starting at `ctx.pos`, advancing it past
    /// every entry produced.
    fn iterate_shared(&self, file: &OpenFile, ctx: &mut DirContext<'_>) -> FileResult {
        let _ = (file, ctx);
        Err(Errno(-errno::ENOTDIR))
    }

    /// Called once when the last reference to the handle is closed.
    fn release(&self, file: &OpenFile) -> FileResult {
        let _ = file;
        Ok(())
    }
}

/// A live handle.
pub struct OpenFile {
    id: HandleId,
    location: Location,
    is_dir: bool,
    ops: RwLock<Arc<dyn FileOperations>>,
}

impl OpenFile {
    pub fn new(location: Location, is_dir: bool, ops: Arc<dyn FileOperations>) -> Self {
        Self {
            id: HandleId::next(),
            location,
            is_dir,
            ops: RwLock::new(ops),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// The current operations table.
    pub fn ops(&self) -> Arc<dyn FileOperations> {
        Arc::clone(&*self.ops.read())
    }

    /// Install `ops`, returning the table it displaced.
    pub fn replace_ops(&self, ops: Arc<dyn FileOperations>) -> Arc<dyn FileOperations> {
        std::mem::replace(&mut *self.ops.write(), ops)
    }

    /// Whether `ops` is the installed table.
    pub fn has_ops(&self, ops: &Arc<dyn FileOperations>) -> bool {
        Arc::ptr_eq(&*self.ops.read(), ops)
    }

    /// Enumerate through whatever table is installed.
    pub fn iterate(&self, ctx: &mut DirContext<'_>) -> FileResult {
        self.ops().iterate_shared(self, ctx)
    }

    /// Release through whatever table is installed.
    pub fn release(&self) -> FileResult {
        self.ops().release(self)
    }
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFile")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("is_dir", &self.is_dir)
            .finish_non_exhaustive()
    }
}
