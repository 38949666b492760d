/*!
 * Core Types
 * Common types used across the kernel
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// User-space virtual address
pub type UserAddr = u64;

/// The null user pointer
pub const USER_NULL: UserAddr = 0;

/// Size of a user-space pointer in bytes
pub const USER_PTR_SIZE: usize = std::mem::size_of::<UserAddr>();

/// Signal number (only used to encode fatal-fault terminations)
pub type Signal = u8;

/// Process identifier
///
/// Valid user pids are positive and start at [`crate::core::limits::PID_MIN`].
/// Pid 1 is reserved for the kernel itself and is only ever seen as the parent
/// of bootstrap processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl Pid {
    /// Parent of every process the kernel starts directly
    pub const KERNEL: Pid = Pid(1);

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_kernel(self) -> bool {
        self.0 == Self::KERNEL.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Pid> for u64 {
    fn from(pid: Pid) -> Self {
        u64::from(pid.0)
    }
}

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
