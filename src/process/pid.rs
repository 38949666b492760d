/*!
 * Pid Allocation
 * Rotating allocator over a bounded pid range
 */

use crate::core::types::Pid;

/// Hands out pids in increasing order, wrapping at the top of the range
///
/// The allocator keeps no record of what is in use; the table passes a
/// predicate so a pid is skipped for as long as any record still carries it.
#[derive(Debug, Clone)]
pub struct PidAllocator {
    min: u32,
    max: u32,
    next: u32,
}

impl PidAllocator {
    #[must_use]
    pub fn new(min: u32, max: u32) -> Self {
        debug_assert!(min <= max);
        Self {
            min,
            max,
            next: min,
        }
    }

    /// Number of pids in the range
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.max - self.min) + 1
    }

    /// Next free pid, or `None` if every pid in the range is taken
    pub fn allocate(&mut self, in_use: impl Fn(Pid) -> bool) -> Option<Pid> {
        for _ in 0..self.capacity() {
            let candidate = Pid(self.next);
            self.next = if self.next == self.max {
                self.min
            } else {
                self.next + 1
            };
            if !in_use(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
