//! Access to caller-controlled memory.
//!
//! Control messages and the path strings they point at live in the caller's
//! address space. Every read goes through [`UserMemory`], which reports an
//! unreadable address as `FaultyAddress` instead of crashing.

use veil_core::{Result, UserAddr, VeilError};

/// Granularity of caller mappings. String copies never read across a page
/// boundary in one call.
pub const PAGE_SIZE: usize = 0x1000;

/// Fault-tolerant reads from a caller's address space.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait UserMemory: Send + Sync {
    /// Copy exactly `buf.len()` bytes starting at `addr`.
    ///
    /// Fails with `FaultyAddress` if any byte in the range is unreadable.
    fn copy_from(&self, addr: UserAddr, buf: &mut [u8]) -> Result<()>;

    /// Copy a NUL-terminated string of at most `max` bytes, terminator
    /// included.
    ///
    /// Reads proceed a page at a time and stop at the first NUL. No NUL
    /// within `max` bytes is `InvalidArgument`, as is a string that is not
    /// UTF-8. An unreadable byte before the NUL is `FaultyAddress` at that
    /// byte.
    fn copy_cstr(&self, addr: UserAddr, max: usize) -> Result<String> {
        let mut out = Vec::new();
        let mut chunk = [0u8; PAGE_SIZE];
        let mut offset = 0;

        while offset < max {
            let at = addr
                .checked_add(offset as u64)
                .ok_or(VeilError::FaultyAddress(addr.0))?;
            let to_boundary = PAGE_SIZE - (at.0 % PAGE_SIZE as u64) as usize;
            let mut len = to_boundary.min(max - offset);

            // A fault inside the page: narrow to the readable prefix.
            loop {
                match self.copy_from(at, &mut chunk[..len]) {
                    Ok(()) => break,
                    Err(e) if len == 1 => return Err(e),
                    Err(_) => len /= 2,
                }
            }

            let read = &chunk[..len];
            let nul = read.iter().position(|&b| b == 0);
            let take = nul.unwrap_or(len);
            out.try_reserve(take)
                .map_err(|_| VeilError::OutOfMemory("path buffer".into()))?;
            out.extend_from_slice(&read[..take]);

            if nul.is_some() {
                return String::from_utf8(out)
                    .map_err(|_| VeilError::InvalidArgument("path is not utf-8".into()));
            }
            offset += len;
        }

        Err(VeilError::InvalidArgument(format!(
            "path exceeds {} bytes",
            max
        )))
    }
}

/// A simulated address space for tests and embedding.
///
/// Regions are mapped at increasing, page-aligned addresses with an unmapped
/// guard page between them. Address zero is never mapped.
pub mod simulated {
    use super::*;
    use std::collections::BTreeMap;

    use parking_lot::RwLock;

    const PAGE: u64 = PAGE_SIZE as u64;

    struct Inner {
        regions: BTreeMap<u64, Vec<u8>>,
        next: u64,
    }

    /// In-memory address space.
    pub struct AddressSpace {
        inner: RwLock<Inner>,
    }

    impl AddressSpace {
        pub fn new() -> Self {
            Self {
                inner: RwLock::new(Inner {
                    regions: BTreeMap::new(),
                    next: PAGE,
                }),
            }
        }

        /// Map a copy of `bytes` and return its base address.
        pub fn map(&self, bytes: &[u8]) -> UserAddr {
            let mut inner = self.inner.write();
            let base = inner.next;
            let pages = (bytes.len() as u64).div_ceil(PAGE).max(1);
            inner.next = base + (pages + 1) * PAGE;
            inner.regions.insert(base, bytes.to_vec());
            UserAddr(base)
        }

        /// Map `s` followed by a NUL terminator.
        pub fn map_cstr(&self, s: &str) -> UserAddr {
            let mut bytes = Vec::with_capacity(s.len() + 1);
            bytes.extend_from_slice(s.as_bytes());
            bytes.push(0);
            self.map(&bytes)
        }

        /// Remove the region starting at `addr`. Returns false if none was mapped.
        pub fn unmap(&self, addr: UserAddr) -> bool {
            self.inner.write().regions.remove(&addr.0).is_some()
        }

        /// Number of mapped regions.
        pub fn region_count(&self) -> usize {
            self.inner.read().regions.len()
        }
    }

    impl Default for AddressSpace {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UserMemory for AddressSpace {
        fn copy_from(&self, addr: UserAddr, buf: &mut [u8]) -> Result<()> {
            let inner = self.inner.read();
            let fault = || VeilError::FaultyAddress(addr.0);

            let (base, region) = inner.regions.range(..=addr.0).next_back().ok_or_else(fault)?;
            let start = usize::try_from(addr.0 - base).map_err(|_| fault())?;
            let end = start.checked_add(buf.len()).ok_or_else(fault)?;
            let src = region.get(start..end).ok_or_else(fault)?;

            buf.copy_from_slice(src);
            Ok(())
        }

        /// Walks the containing region under one read lock. Everything past
        /// a region's end is unmapped, so a missing NUL faults there.
        fn copy_cstr(&self, addr: UserAddr, max: usize) -> Result<String> {
            let too_long = || VeilError::InvalidArgument(format!("path exceeds {} bytes", max));
            if max == 0 {
                return Err(too_long());
            }

            let inner = self.inner.read();
            let fault = VeilError::FaultyAddress;

            let (base, region) = inner
                .regions
                .range(..=addr.0)
                .next_back()
                .ok_or(fault(addr.0))?;
            let start = usize::try_from(addr.0 - base).map_err(|_| fault(addr.0))?;
            let avail = region.get(start..).ok_or(fault(addr.0))?;

            let window = &avail[..avail.len().min(max)];
            match window.iter().position(|&b| b == 0) {
                Some(nul) => {
                    let mut out = Vec::new();
                    out.try_reserve_exact(nul)
                        .map_err(|_| VeilError::OutOfMemory("path buffer".into()))?;
                    out.extend_from_slice(&window[..nul]);
                    String::from_utf8(out)
                        .map_err(|_| VeilError::InvalidArgument("path is not utf-8".into()))
                }
                None if avail.len() < max => Err(fault(addr.0 + avail.len() as u64)),
                None => Err(too_long()),
            }
        }
    }
}
