/*!
 * Simulated Memory
 * Page budget and byte-addressed user address spaces
 */

use super::user::UserProgram;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::limits::PAGE_SIZE;
use crate::core::types::{align_up, UserAddr};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Base of the per-space heap used by user programs for scratch data
pub const HEAP_BASE: UserAddr = 0x1000_0000;

/// Heap size in pages, mapped on first allocation
pub const HEAP_PAGES: usize = 4;

/// Pages charged for an empty space (its page tables)
const SPACE_OVERHEAD_PAGES: usize = 1;

/// Shared physical page budget
///
/// Every address space reserves its pages here; creation and copying fail
/// with out-of-memory once the budget is spent.
#[derive(Debug)]
pub struct SimMemory {
    capacity: usize,
    used: AtomicUsize,
    live_spaces: AtomicUsize,
    next_space_id: AtomicU64,
}

impl SimMemory {
    #[must_use]
    pub fn new(capacity_pages: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity_pages,
            used: AtomicUsize::new(0),
            live_spaces: AtomicUsize::new(0),
            next_space_id: AtomicU64::new(1),
        })
    }

    /// Reserve `pages` atomically or fail without side effects
    fn reserve(&self, pages: usize) -> KernelResult<()> {
        loop {
            let current = self.used.load(Ordering::SeqCst);
            if current + pages > self.capacity {
                return Err(KernelError::OutOfMemory(format!(
                    "{pages} pages requested, {} of {} free",
                    self.capacity - current,
                    self.capacity
                )));
            }
            if self
                .used
                .compare_exchange(current, current + pages, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn release(&self, pages: usize) {
        self.used.fetch_sub(pages, Ordering::SeqCst);
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn used_pages(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    /// Spaces created or copied and not yet destroyed
    #[must_use]
    pub fn live_spaces(&self) -> usize {
        self.live_spaces.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Region {
    base: UserAddr,
    bytes: Vec<u8>,
}

impl Region {
    fn end(&self) -> UserAddr {
        self.base + self.bytes.len() as u64
    }

    fn contains(&self, addr: UserAddr, len: usize) -> bool {
        addr >= self.base
            && addr
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.end())
    }
}

#[derive(Clone, Default)]
struct SpaceInner {
    regions: Vec<Region>,
    /// Programs bound to code addresses
    code: BTreeMap<UserAddr, UserProgram>,
    heap_next: Option<UserAddr>,
    pages: usize,
}

impl SpaceInner {
    fn region(&self, addr: UserAddr, len: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr, len))
    }

    fn region_mut(&mut self, addr: UserAddr, len: usize) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(addr, len))
    }
}

/// A user address space backed by host memory
///
/// Regions are byte vectors; any access outside them is a fault. Interior
/// locking lets the kernel copy out through a shared reference, as it would
/// through a page table.
pub struct SimSpace {
    id: u64,
    inner: Mutex<SpaceInner>,
    memory: Arc<SimMemory>,
}

impl SimSpace {
    pub(crate) fn new(memory: &Arc<SimMemory>) -> KernelResult<Self> {
        memory.reserve(SPACE_OVERHEAD_PAGES)?;
        Ok(Self::register(
            memory,
            SpaceInner {
                pages: SPACE_OVERHEAD_PAGES,
                ..SpaceInner::default()
            },
        ))
    }

    /// Deep copy charged against the same budget
    pub(crate) fn duplicate(&self) -> KernelResult<Self> {
        let inner = self.inner.lock().clone();
        self.memory.reserve(inner.pages)?;
        Ok(Self::register(&self.memory, inner))
    }

    fn register(memory: &Arc<SimMemory>, inner: SpaceInner) -> Self {
        memory.live_spaces.fetch_add(1, Ordering::SeqCst);
        Self {
            id: memory.next_space_id.fetch_add(1, Ordering::SeqCst),
            inner: Mutex::new(inner),
            memory: Arc::clone(memory),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pages charged to this space
    #[must_use]
    pub fn pages(&self) -> usize {
        self.inner.lock().pages
    }

    /// Map `pages` zeroed pages at page-aligned `base`
    pub fn map(&self, base: UserAddr, pages: usize) -> KernelResult<()> {
        if base % PAGE_SIZE as u64 != 0 || pages == 0 {
            return Err(KernelError::InvalidArgument(format!(
                "bad mapping of {pages} pages at {base:#x}"
            )));
        }
        let len = pages * PAGE_SIZE;
        let end = base
            .checked_add(len as u64)
            .ok_or(KernelError::BadAddress(base))?;

        let mut inner = self.inner.lock();
        if inner.regions.iter().any(|r| base < r.end() && r.base < end) {
            return Err(KernelError::InvalidArgument(format!(
                "mapping at {base:#x} overlaps an existing region"
            )));
        }
        self.memory.reserve(pages)?;
        inner.regions.push(Region {
            base,
            bytes: vec![0; len],
        });
        inner.pages += pages;
        Ok(())
    }

    pub fn read(&self, addr: UserAddr, dst: &mut [u8]) -> KernelResult<()> {
        let inner = self.inner.lock();
        let region = inner
            .region(addr, dst.len())
            .ok_or(KernelError::BadAddress(addr))?;
        let offset = (addr - region.base) as usize;
        dst.copy_from_slice(&region.bytes[offset..offset + dst.len()]);
        Ok(())
    }

    pub fn write(&self, addr: UserAddr, src: &[u8]) -> KernelResult<()> {
        let mut inner = self.inner.lock();
        let region = inner
            .region_mut(addr, src.len())
            .ok_or(KernelError::BadAddress(addr))?;
        let offset = (addr - region.base) as usize;
        region.bytes[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Read a NUL-terminated string of at most `max` bytes including the NUL
    pub fn read_cstr(&self, addr: UserAddr, max: usize) -> KernelResult<Vec<u8>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for i in 0..max {
            let at = addr
                .checked_add(i as u64)
                .ok_or(KernelError::BadAddress(addr))?;
            let region = inner.region(at, 1).ok_or(KernelError::BadAddress(at))?;
            let byte = region.bytes[(at - region.base) as usize];
            if byte == 0 {
                return Ok(out);
            }
            out.push(byte);
        }
        Err(KernelError::NameTooLong { limit: max })
    }

    /// Bind `program` as the code found at `addr`
    pub fn bind(&self, addr: UserAddr, program: UserProgram) {
        self.inner.lock().code.insert(addr, program);
    }

    /// Remove the code bound at `addr`
    pub fn unbind(&self, addr: UserAddr) -> Option<UserProgram> {
        self.inner.lock().code.remove(&addr)
    }

    /// Number of code bindings in this space
    #[must_use]
    pub fn bound_programs(&self) -> usize {
        self.inner.lock().code.len()
    }

    /// Code bound at `addr`, if any
    #[must_use]
    pub fn program_at(&self, addr: UserAddr) -> Option<UserProgram> {
        self.inner.lock().code.get(&addr).cloned()
    }

    /// Carve `len` bytes out of the heap, 8-byte aligned
    pub fn alloc(&self, len: usize) -> KernelResult<UserAddr> {
        let next = self.inner.lock().heap_next;
        let next = match next {
            Some(next) => next,
            None => {
                self.map(HEAP_BASE, HEAP_PAGES)?;
                HEAP_BASE
            }
        };

        let end = next + align_up(len.max(1), 8) as u64;
        if end > HEAP_BASE + (HEAP_PAGES * PAGE_SIZE) as u64 {
            return Err(KernelError::OutOfMemory("user heap exhausted".into()));
        }
        self.inner.lock().heap_next = Some(end);
        Ok(next)
    }

    /// Allocate and fill a NUL-terminated copy of `bytes`
    pub fn alloc_cstr(&self, bytes: &[u8]) -> KernelResult<UserAddr> {
        let addr = self.alloc(bytes.len() + 1)?;
        self.write(addr, bytes)?;
        self.write(addr + bytes.len() as u64, &[0])?;
        Ok(addr)
    }
}

impl Drop for SimSpace {
    fn drop(&mut self) {
        self.memory.release(self.inner.get_mut().pages);
        self.memory.live_spaces.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for SimSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SimSpace")
            .field("id", &self.id)
            .field("regions", &inner.regions.len())
            .field("pages", &inner.pages)
            .field("code", &inner.code.keys().collect::<Vec<_>>())
            .finish()
    }
}
