//! Directory enumeration filter.
//!
//! A handle opened on a directory with hidden children is *wrapped*: its
//! operations table is displaced by [`FilteredOps`] and the original table
//! is kept in an interception record keyed by [`HandleId`]. Filtered
//! enumeration drops hidden entries; release restores the original table,
//! destroys the record and chains to the original release.
//!
//! ## Invariants
//!
//! - At most one record per handle.
//! - The table swap and the record insert/remove happen under the same
//!   lock, so a handle is never seen wrapped without a record or
//!   unwrapped with one.
//! - Enumeration never consults the records; only release does. Release
//!   of a wrapped handle with no record is unrecoverable and panics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use veil_core::{join, Result, VeilError};
use veil_store::PolicyLookup;

use crate::file::{DirContext, DirEntry, FileOperations, FileResult, HandleId, OpenFile};

/// What a wrapped handle displaced.
struct InterceptRecord {
    original: Arc<dyn FileOperations>,
}

/// Side table of wrapped handles.
pub struct EnumerationFilter {
    records: Mutex<HashMap<HandleId, InterceptRecord>>,
    policy: Arc<dyn PolicyLookup>,
    path_max: usize,
}

impl EnumerationFilter {
    pub fn new(policy: Arc<dyn PolicyLookup>, path_max: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            policy,
            path_max,
        })
    }

    /// Wrap `file` so enumeration drops hidden entries.
    ///
    /// Fails with `AlreadyExists` if the handle is already wrapped, and with
    /// `OutOfMemory` if the record cannot be allocated; the handle is left
    /// untouched in both cases.
    pub fn wrap(self: &Arc<Self>, file: &OpenFile) -> Result<()> {
        let id = file.id();
        let mut records = self.records.lock();

        if records.contains_key(&id) {
            return Err(VeilError::AlreadyExists(format!("handle {}", id)));
        }
        records
            .try_reserve(1)
            .map_err(|_| VeilError::OutOfMemory("interception record".into()))?;

        let original = file.ops();
        let filtered: Arc<dyn FileOperations> = Arc::new(FilteredOps {
            filter: Arc::clone(self),
            original: Arc::clone(&original),
        });
        file.replace_ops(filtered);
        records.insert(id, InterceptRecord { original });

        debug!(handle = %id, wrapped = records.len(), "handle wrapped");
        Ok(())
    }

    pub fn is_wrapped(&self, id: HandleId) -> bool {
        self.records.lock().contains_key(&id)
    }

    /// Number of live records.
    pub fn wrapped_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Check that no record outlives its handle.
    ///
    /// # Panics
    ///
    /// If a record for `id` still exists: the handle is being freed without
    /// its release having run through the filter.
    pub fn assert_released(&self, id: HandleId) {
        if self.is_wrapped(id) {
            fatal(format!("handle {} freed while still wrapped", id));
        }
    }

    fn unwrap_handle(&self, file: &OpenFile) -> Arc<dyn FileOperations> {
        let id = file.id();
        let mut records = self.records.lock();

        let Some(record) = records.remove(&id) else {
            drop(records);
            fatal(format!("release of handle {} with no record", id));
        };
        file.replace_ops(Arc::clone(&record.original));

        debug!(handle = %id, wrapped = records.len(), "handle unwrapped");
        record.original
    }
}

fn fatal(msg: String) -> ! {
    panic!("{}", VeilError::FatalInvariant(msg))
}

/// Operations installed on a wrapped handle.
///
/// Holds its own reference to the displaced table, so an enumeration that
/// loaded these ops before a concurrent release still completes.
pub struct FilteredOps {
    filter: Arc<EnumerationFilter>,
    original: Arc<dyn FileOperations>,
}

impl FileOperations for FilteredOps {
    fn iterate_shared(&self, file: &OpenFile, ctx: &mut DirContext<'_>) -> FileResult {
        let original = &self.original;

        // Stable for the whole call.
        let dir = match file.location().resolve(self.filter.path_max) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(handle = %file.id(), err = %e, "enumeration unfiltered");
                return original.iterate_shared(file, ctx);
            }
        };

        let policy = &self.filter.policy;
        let DirContext { pos, actor } = ctx;

        let mut filtered = |entry: &DirEntry<'_>| -> bool {
            if policy.is_hidden(&join(dir, entry.name)) {
                trace!(dir, name = entry.name, "entry dropped");
                return true;
            }
            actor(entry)
        };

        let mut inner = DirContext::new(*pos, &mut filtered);
        let result = original.iterate_shared(file, &mut inner);
        *pos = inner.pos;

        result
    }

    fn release(&self, file: &OpenFile) -> FileResult {
        let original = self.filter.unwrap_handle(file);
        original.release(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Errno, Location};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use veil_store::PolicyTables;

    /// Emits a fixed list of names, one per position.
    struct ListOps {
        names: Vec<&'static str>,
        releases: AtomicUsize,
        release_result: FileResult,
    }

    impl ListOps {
        fn new(names: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                names: names.to_vec(),
                releases: AtomicUsize::new(0),
                release_result: Ok(()),
            })
        }
    }

    impl FileOperations for ListOps {
        fn iterate_shared(&self, _file: &OpenFile, ctx: &mut DirContext<'_>) -> FileResult {
            while let Some(&name) = self.names.get(ctx.pos as usize) {
                let entry = DirEntry {
                    name,
                    offset: ctx.pos,
                    ino: ctx.pos as u64 + 100,
                    d_type: 8,
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
            self.release_result
        }
    }

    fn setup() -> (Arc<PolicyTables>, Arc<EnumerationFilter>) {
        let tables = Arc::new(PolicyTables::default());
        tables.add_hidden("/usr/bin/su").unwrap();
        let filter = EnumerationFilter::new(tables.clone(), 4096);
        (tables, filter)
    }

    fn list(file: &OpenFile) -> (Vec<String>, i64) {
        let mut seen = Vec::new();
        let mut sink = |e: &DirEntry<'_>| {
            seen.push(e.name.to_string());
            true
        };
        let mut ctx = DirContext::new(0, &mut sink);
        file.iterate(&mut ctx).unwrap();
        let pos = ctx.pos;
        (seen, pos)
    }

    #[test]
    fn test_filtered_enumeration() {
        let (_tables, filter) = setup();
        let ops = ListOps::new(&["bash", "su", "zsh"]);
        let file = OpenFile::new(Location::path("/usr/bin"), true, ops);

        filter.wrap(&file).unwrap();
        let (names, pos) = list(&file);

        assert_eq!(names, vec!["bash", "zsh"]);
        // Cursor reflects the underlying enumeration, not the forwarded count.
        assert_eq!(pos, 3);
    }

    #[test]
    fn test_no_substring_matching() {
        let (_tables, filter) = setup();
        let ops = ListOps::new(&["su", "sudo", "s", "su.bak"]);
        let file = OpenFile::new(Location::path("/usr/bin"), true, ops);

        filter.wrap(&file).unwrap();
        assert_eq!(list(&file).0, vec!["sudo", "s", "su.bak"]);
    }

    #[test]
    fn test_policy_changes_apply_to_wrapped_handle() {
        let (tables, filter) = setup();
        let ops = ListOps::new(&["bash", "su", "zsh"]);
        let file = OpenFile::new(Location::path("/usr/bin"), true, ops);
        filter.wrap(&file).unwrap();

        tables.add_hidden("/usr/bin/zsh").unwrap();
        assert_eq!(list(&file).0, vec!["bash"]);

        tables.remove_hidden("/usr/bin/su").unwrap();
        assert_eq!(list(&file).0, vec!["bash", "su"]);
    }

    #[test]
    fn test_early_termination_preserved() {
        let (_tables, filter) = setup();
        let ops = ListOps::new(&["a", "su", "b", "c"]);
        let file = OpenFile::new(Location::path("/usr/bin"), true, ops);
        filter.wrap(&file).unwrap();

        let mut seen = Vec::new();
        let mut sink = |e: &DirEntry<'_>| {
            seen.push(e.name.to_string());
            seen.len() < 2
        };
        let mut ctx = DirContext::new(0, &mut sink);
        file.iterate(&mut ctx).unwrap();
        let pos = ctx.pos;

        assert_eq!(seen, vec!["a", "b"]);
        // Stopped at "b"; the underlying cursor did not advance past it.
        assert_eq!(pos, 2);

        // Resuming from the cursor continues where enumeration stopped.
        let mut rest = Vec::new();
        let mut sink = |e: &DirEntry<'_>| {
            rest.push(e.name.to_string());
            true
        };
        let mut ctx = DirContext::new(pos, &mut sink);
        file.iterate(&mut ctx).unwrap();
        assert_eq!(rest, vec!["b", "c"]);
    }

    #[test]
    fn test_unresolvable_dir_is_unfiltered() {
        let (_tables, filter) = setup();
        let ops = ListOps::new(&["bash", "su"]);
        let file = OpenFile::new(Location::Detached, true, ops);
        filter.wrap(&file).unwrap();

        assert_eq!(list(&file).0, vec!["bash", "su"]);
    }

    #[test]
    fn test_release_restores_and_chains() {
        let (_tables, filter) = setup();
        let ops = ListOps::new(&["bash", "su"]);
        let original: Arc<dyn FileOperations> = ops.clone();
        let file = OpenFile::new(Location::path("/usr/bin"), true, Arc::clone(&original));

        filter.wrap(&file).unwrap();
        assert_eq!(filter.wrapped_count(), 1);
        assert!(filter.is_wrapped(file.id()));
        assert!(!file.has_ops(&original));

        file.release().unwrap();
        assert_eq!(filter.wrapped_count(), 0);
        assert!(file.has_ops(&original));
        assert_eq!(ops.releases.load(Ordering::SeqCst), 1);
        filter.assert_released(file.id());

        // Restored table enumerates unfiltered.
        assert_eq!(list(&file).0, vec!["bash", "su"]);
    }

    #[test]
    fn test_release_propagates_original_result() {
        let (_tables, filter) = setup();
        let ops = Arc::new(ListOps {
            names: vec![],
            releases: AtomicUsize::new(0),
            release_result: Err(Errno(-5)),
        });
        let file = OpenFile::new(Location::path("/usr/bin"), true, ops);

        filter.wrap(&file).unwrap();
        assert_eq!(file.release(), Err(Errno(-5)));
        assert_eq!(filter.wrapped_count(), 0);
    }

    #[test]
    fn test_double_wrap_rejected() {
        let (_tables, filter) = setup();
        let file = OpenFile::new(Location::path("/usr/bin"), true, ListOps::new(&[]));

        filter.wrap(&file).unwrap();
        assert!(matches!(
            filter.wrap(&file),
            Err(VeilError::AlreadyExists(_))
        ));
        assert_eq!(filter.wrapped_count(), 1);
    }

    #[test]
    fn test_records_are_per_handle() {
        let (_tables, filter) = setup();
        let a = OpenFile::new(Location::path("/usr/bin"), true, ListOps::new(&["su"]));
        let b = OpenFile::new(Location::path("/usr/bin"), true, ListOps::new(&["su"]));

        filter.wrap(&a).unwrap();
        filter.wrap(&b).unwrap();
        assert_eq!(filter.wrapped_count(), 2);

        a.release().unwrap();
        assert!(!filter.is_wrapped(a.id()));
        assert!(filter.is_wrapped(b.id()));
        assert!(list(&b).0.is_empty());

        b.release().unwrap();
        assert_eq!(filter.wrapped_count(), 0);
    }

    #[test]
    #[should_panic(expected = "fatal invariant violation")]
    fn test_double_release_is_fatal() {
        let (_tables, filter) = setup();
        let file = OpenFile::new(Location::path("/usr/bin"), true, ListOps::new(&[]));
        filter.wrap(&file).unwrap();

        let wrapper = file.ops();
        file.release().unwrap();
        // Stale wrapper reached again after the record is gone.
        let _ = wrapper.release(&file);
    }

    #[test]
    fn test_enumeration_in_flight_survives_release() {
        let (_tables, filter) = setup();
        let file = OpenFile::new(
            Location::path("/usr/bin"),
            true,
            ListOps::new(&["bash", "su", "zsh"]),
        );
        filter.wrap(&file).unwrap();

        // Loaded before release, dispatched after it.
        let in_flight = file.ops();
        file.release().unwrap();
        assert!(!filter.is_wrapped(file.id()));

        let mut seen = Vec::new();
        let mut sink = |e: &DirEntry<'_>| {
            seen.push(e.name.to_string());
            true
        };
        let mut ctx = DirContext::new(0, &mut sink);
        in_flight.iterate_shared(&file, &mut ctx).unwrap();
        assert_eq!(seen, vec!["bash", "zsh"]);
    }

    #[test]
    fn test_concurrent_iterate_and_release() {
        let (_tables, filter) = setup();
        for _ in 0..50 {
            let file = OpenFile::new(
                Location::path("/usr/bin"),
                true,
                ListOps::new(&["bash", "su", "zsh"]),
            );
            filter.wrap(&file).unwrap();
            let barrier = std::sync::Barrier::new(2);

            std::thread::scope(|s| {
                s.spawn(|| {
                    let ops = file.ops();
                    barrier.wait();
                    for _ in 0..20 {
                        let mut seen = Vec::new();
                        let mut sink = |e: &DirEntry<'_>| {
                            seen.push(e.name.to_string());
                            true
                        };
                        let mut ctx = DirContext::new(0, &mut sink);
                        ops.iterate_shared(&file, &mut ctx).unwrap();
                        assert_eq!(seen, vec!["bash", "zsh"]);
                    }
                });
                s.spawn(|| {
                    barrier.wait();
                    file.release().unwrap();
                });
            });
            assert!(!filter.is_wrapped(file.id()));
        }
        assert_eq!(filter.wrapped_count(), 0);
    }

    #[test]
    #[should_panic(expected = "freed while still wrapped")]
    fn test_free_without_release_is_fatal() {
        let (_tables, filter) = setup();
        let file = OpenFile::new(Location::path("/usr/bin"), true, ListOps::new(&[]));
        filter.wrap(&file).unwrap();
        filter.assert_released(file.id());
    }

    #[test]
    fn test_concurrent_wrap_and_iterate() {
        let (_tables, filter) = setup();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let filter = Arc::clone(&filter);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let file = OpenFile::new(
                            Location::path("/usr/bin"),
                            true,
                            ListOps::new(&["bash", "su", "zsh"]),
                        );
                        filter.wrap(&file).unwrap();
                        assert_eq!(list(&file).0, vec!["bash", "zsh"]);
                        file.release().unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(filter.wrapped_count(), 0);
    }
}
