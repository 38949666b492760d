/*!
 * Trap Frame
 * Saved user register state at the moment of a trap
 */

use crate::core::errors::KernelResult;
use crate::core::limits::INSTRUCTION_SIZE;
use crate::core::types::UserAddr;
use serde::{Deserialize, Serialize};

/// Register indices within [`TrapFrame::regs`]
pub mod reg {
    pub const V0: usize = 2;
    pub const V1: usize = 3;
    pub const A0: usize = 4;
    pub const A1: usize = 5;
    pub const A2: usize = 6;
    pub const A3: usize = 7;
    pub const SP: usize = 29;
}

/// Saved user-mode execution context
///
/// The frame is plain data: duplicating it byte for byte is how fork gives the
/// child the parent's register state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrapFrame {
    pub regs: [u64; 32],
    pub epc: u64,
    pub status: u64,
}

impl TrapFrame {
    /// Frame for a brand new image: `a0 = argc`, `a1 = argv`, stack at `sp`
    #[must_use]
    pub fn for_entry(argc: usize, argv: UserAddr, sp: UserAddr, entry: UserAddr) -> Self {
        let mut frame = Self::default();
        frame.regs[reg::A0] = argc as u64;
        frame.regs[reg::A1] = argv;
        frame.regs[reg::SP] = sp;
        frame.epc = entry;
        frame
    }

    #[inline]
    #[must_use]
    pub const fn syscall_number(&self) -> u64 {
        self.regs[reg::V0]
    }

    /// Syscall argument `n` (0..=3)
    #[inline]
    #[must_use]
    pub const fn arg(&self, n: usize) -> u64 {
        self.regs[reg::A0 + n]
    }

    #[inline]
    #[must_use]
    pub const fn sp(&self) -> UserAddr {
        self.regs[reg::SP]
    }

    /// Store a syscall outcome: `v0` holds the value or errno, `a3` flags an error
    pub fn set_result(&mut self, result: KernelResult<u64>) {
        match result {
            Ok(value) => {
                self.regs[reg::V0] = value;
                self.regs[reg::A3] = 0;
            }
            Err(e) => {
                self.regs[reg::V0] = e.errno().code() as u64;
                self.regs[reg::A3] = 1;
            }
        }
    }

    /// Move past the trapping instruction so the syscall is not re-executed
    #[inline]
    pub fn advance(&mut self) {
        self.epc += INSTRUCTION_SIZE;
    }

    /// True when the last syscall reported an error
    #[inline]
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.regs[reg::A3] != 0
    }

    #[inline]
    #[must_use]
    pub const fn return_value(&self) -> u64 {
        self.regs[reg::V0]
    }
}
