//! Test fixtures and helpers.
//!
//! A small simulated host: a directory tree, an address space for control
//! messages, and the open/readdir/close/stat/access/control paths wired
//! through a [`RegistryBackend`] the way a real host would call them.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use veil::{
    DirContext, DirEntry, Errno, FileOperations, FileResult, HookResult, Inode, Invocation,
    Location, OpenFile, RegistryBackend, Veil, VeilConfig,
};
use veil_control::simulated::AddressSpace;
use veil_core::error::errno;
use veil_core::{Command, ControlMessage, Identity, UserAddr, CONTROL_KEY, TOKEN_LEN};

/// Token used by fixtures unless a test picks its own.
pub const FIXTURE_TOKEN: [u8; TOKEN_LEN] = *b"0f8fad5b-d9cb-469f-a165-70867728950e";

/// An unprivileged caller.
pub const USER: Identity = Identity(1000);

/// Encode a control message.
pub fn message(token: [u8; TOKEN_LEN], command: Command) -> [u8; veil_core::MESSAGE_SIZE] {
    ControlMessage::new(token, command).encode()
}

/// Install a test-writer subscriber honouring `RUST_LOG`. Safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A set of absolute paths. Parents are created implicitly.
#[derive(Debug, Clone, Default)]
pub struct SimTree {
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,
}

impl SimTree {
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.dirs.insert("/".into());
        tree
    }

    /// Add a regular file and its parent directories.
    pub fn file(mut self, path: &str) -> Self {
        self.add_parents(path);
        self.files.insert(path.into());
        self
    }

    /// Add a directory and its parents.
    pub fn dir(mut self, path: &str) -> Self {
        self.add_parents(path);
        self.dirs.insert(path.into());
        self
    }

    fn add_parents(&mut self, path: &str) {
        let mut end = path.len();
        while let Some(i) = path[..end].rfind('/') {
            let parent = if i == 0 { "/" } else { &path[..i] };
            self.dirs.insert(parent.into());
            end = i;
            if i == 0 {
                break;
            }
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.files.contains(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    /// Names of the immediate children of `dir`, sorted.
    pub fn children(&self, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };

        self.dirs
            .iter()
            .chain(self.files.iter())
            .filter_map(|p| p.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Directory operations over a fixed list of names, one per position.
pub struct SimDirOps {
    names: Vec<String>,
    releases: AtomicUsize,
}

impl SimDirOps {
    pub fn new(names: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            names,
            releases: AtomicUsize::new(0),
        })
    }

    /// How many times release reached this table.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl FileOperations for SimDirOps {
    fn iterate_shared(&self, _file: &OpenFile, ctx: &mut DirContext<'_>) -> FileResult {
        while let Some(name) = usize::try_from(ctx.pos).ok().and_then(|i| self.names.get(i)) {
            let name = name.as_str();
            let entry = DirEntry {
                name,
                offset: ctx.pos,
                ino: ctx.pos as u64 + 2,
                d_type: 4,
            };
            if !ctx.emit(&entry) {
                break;
            }
            ctx.pos += 1;
        }
        Ok(())
    }

    fn release(&self, _file: &OpenFile) -> FileResult {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Operations for regular files.
pub struct SimFileOps;

impl FileOperations for SimFileOps {}

/// A host that routes every operation through the backend.
pub struct SimHost {
    pub tree: SimTree,
    pub backend: Arc<RegistryBackend>,
    pub memory: AddressSpace,
}

impl SimHost {
    pub fn new(tree: SimTree) -> Self {
        Self {
            tree,
            backend: Arc::new(RegistryBackend::new()),
            memory: AddressSpace::new(),
        }
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<(), Errno> {
        match self.backend.invoke(&invocation) {
            HookResult::Override(code) if code != 0 => Err(Errno(code)),
            _ => Ok(()),
        }
    }

    /// Open `path`. The open hook runs after the object is found.
    pub fn open(&self, caller: Identity, path: &str) -> Result<Arc<OpenFile>, Errno> {
        if !self.tree.exists(path) {
            return Err(Errno(-errno::ENOENT));
        }

        let is_dir = self.tree.is_dir(path);
        let ops: Arc<dyn FileOperations> = if is_dir {
            SimDirOps::new(self.tree.children(path))
        } else {
            Arc::new(SimFileOps)
        };
        let file = Arc::new(OpenFile::new(Location::path(path), is_dir, ops));

        self.intercept(Invocation::FileOpen {
            caller,
            file: &file,
        })?;
        Ok(file)
    }

    /// Read every entry of an open directory from position zero.
    pub fn read_dir(&self, file: &OpenFile) -> Result<Vec<String>, Errno> {
        let mut names = Vec::new();
        let mut sink = |e: &DirEntry<'_>| {
            names.push(e.name.to_string());
            true
        };
        let mut ctx = DirContext::new(0, &mut sink);
        file.iterate(&mut ctx)?;
        Ok(names)
    }

    /// Release the handle, then notify the free hook.
    pub fn close(&self, file: &OpenFile) -> Result<(), Errno> {
        let result = file.release();
        self.backend.invoke(&Invocation::FileRelease { file });
        result
    }

    /// Open, read and close a directory.
    pub fn list(&self, caller: Identity, path: &str) -> Result<Vec<String>, Errno> {
        let file = self.open(caller, path)?;
        let names = self.read_dir(&file);
        self.close(&file)?;
        names
    }

    pub fn stat(&self, caller: Identity, path: &str) -> Result<(), Errno> {
        if !self.tree.exists(path) {
            return Err(Errno(-errno::ENOENT));
        }
        let inode = Inode::new(Location::path(path));
        self.intercept(Invocation::InodeGetattr {
            caller,
            inode: &inode,
        })
    }

    pub fn access(&self, caller: Identity, path: &str) -> Result<(), Errno> {
        if !self.tree.exists(path) {
            return Err(Errno(-errno::ENOENT));
        }
        let inode = Inode::new(Location::path(path));
        self.intercept(Invocation::InodePermission {
            caller,
            inode: &inode,
        })
    }

    /// A generic control call. Unclaimed options fail with `-EINVAL`.
    pub fn control(&self, option: u32, arg: UserAddr) -> i32 {
        let invocation = Invocation::Control {
            option,
            arg,
            memory: &self.memory,
        };
        match self.backend.invoke(&invocation) {
            HookResult::Override(code) => code,
            HookResult::Continue => -errno::EINVAL,
        }
    }

    /// Map a NUL-terminated path into the address space.
    pub fn map_path(&self, path: &str) -> UserAddr {
        self.memory.map_cstr(path)
    }

    /// Map and send a control message under the default control key.
    pub fn send(&self, token: [u8; TOKEN_LEN], command: Command) -> i32 {
        let addr = self.memory.map(&message(token, command));
        self.control(CONTROL_KEY, addr)
    }
}

/// A loaded engine on a simulated host.
pub struct TestFixture {
    pub host: SimHost,
    pub veil: Veil,
    pub token: [u8; TOKEN_LEN],
}

impl TestFixture {
    /// The default tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(VeilConfig::default())
    }

    pub fn with_config(config: VeilConfig) -> Self {
        Self::with_tree(default_tree(), config)
    }

    pub fn with_tree(tree: SimTree, config: VeilConfig) -> Self {
        let host = SimHost::new(tree);
        let veil = match Veil::load(config, host.backend.clone()) {
            Ok(veil) => veil,
            Err(e) => panic!("fixture failed to load: {}", e),
        };
        Self {
            host,
            veil,
            token: FIXTURE_TOKEN,
        }
    }

    /// Send a command with the fixture token.
    pub fn send(&self, command: Command) -> i32 {
        self.host.send(self.token, command)
    }

    pub fn enable(&self) -> i32 {
        self.send(Command::Enable)
    }

    pub fn disable(&self) -> i32 {
        self.send(Command::Disable)
    }

    pub fn hide(&self, path: &str) -> i32 {
        let path = self.host.map_path(path);
        self.send(Command::HiddenAdd { path })
    }

    pub fn unhide(&self, path: &str) -> i32 {
        let path = self.host.map_path(path);
        self.send(Command::HiddenRemove { path })
    }

    pub fn exempt(&self, id: Identity) -> i32 {
        self.send(Command::IdentityAdd(id))
    }

    pub fn unexempt(&self, id: Identity) -> i32 {
        self.send(Command::IdentityRemove(id))
    }

    /// Register the fixture token, turning authentication on.
    pub fn lock(&self) -> i32 {
        self.send(Command::TokenAdd(self.token))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A small tree with a few system paths.
pub fn default_tree() -> SimTree {
    SimTree::new()
        .file("/usr/bin/bash")
        .file("/usr/bin/su")
        .file("/usr/bin/sudo")
        .file("/usr/bin/zsh")
        .file("/etc/passwd")
        .file("/proc/veil")
        .file("/proc/version")
        .dir("/data/secret")
        .file("/data/secret/key")
        .file("/data/notes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_children() {
        let tree = default_tree();
        assert_eq!(tree.children("/usr/bin"), vec!["bash", "su", "sudo", "zsh"]);
        assert_eq!(tree.children("/"), vec!["data", "etc", "proc", "usr"]);
        assert_eq!(tree.children("/data"), vec!["notes", "secret"]);
        assert!(tree.is_dir("/data/secret"));
        assert!(!tree.is_dir("/data/notes"));
        assert!(tree.exists("/usr"));
        assert!(!tree.exists("/usr/bin/ls"));
    }

    #[test]
    fn test_host_without_engine() {
        let host = SimHost::new(default_tree());
        assert_eq!(
            host.list(USER, "/usr/bin").unwrap(),
            vec!["bash", "su", "sudo", "zsh"]
        );
        assert_eq!(host.stat(USER, "/nope"), Err(Errno(-2)));
        assert_eq!(host.access(USER, "/etc/passwd"), Ok(()));
        assert_eq!(host.control(CONTROL_KEY, UserAddr::NULL), -22);
    }

    #[test]
    fn test_fixture_loads_disabled() {
        let fx = TestFixture::new();
        assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Ok(()));
        assert_eq!(fx.hide("/usr/bin/su"), 0);
        assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Ok(()));
        assert_eq!(fx.enable(), 0);
        assert_eq!(fx.host.stat(USER, "/usr/bin/su"), Err(Errno(-2)));
    }
}
