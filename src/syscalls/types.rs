/*!
 * Syscall Types
 * Call numbers and the decoded form of a trap
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::UserAddr;
use crate::platform::{reg, TrapFrame};
use serde::{Deserialize, Serialize};

/// System call numbers, passed in `v0`
pub mod numbers {
    pub const SYS_FORK: u64 = 0;
    pub const SYS_EXECV: u64 = 2;
    pub const SYS_EXIT: u64 = 3;
    pub const SYS_WAITPID: u64 = 4;
    pub const SYS_GETPID: u64 = 5;
}

use numbers::*;

/// System call types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Syscall {
    Fork,
    Execv {
        path: UserAddr,
        argv: UserAddr,
    },
    Exit {
        code: i32,
    },
    Waitpid {
        pid: i32,
        status: UserAddr,
        options: u64,
    },
    Getpid,
}

impl Syscall {
    /// Decode the call the user placed in `frame`
    pub fn decode(frame: &TrapFrame) -> KernelResult<Self> {
        let call = match frame.syscall_number() {
            SYS_FORK => Self::Fork,
            SYS_EXECV => Self::Execv {
                path: frame.arg(0),
                argv: frame.arg(1),
            },
            SYS_EXIT => Self::Exit {
                code: frame.arg(0) as i32,
            },
            SYS_WAITPID => Self::Waitpid {
                pid: frame.arg(0) as i32,
                status: frame.arg(1),
                options: frame.arg(2),
            },
            SYS_GETPID => Self::Getpid,
            other => return Err(KernelError::NoSys(other)),
        };
        Ok(call)
    }

    /// Place the call in `frame` the way user code does before trapping
    pub fn encode(self, frame: &mut TrapFrame) {
        frame.regs[reg::V0] = self.number();
        match self {
            Self::Fork | Self::Getpid => {}
            Self::Execv { path, argv } => {
                frame.regs[reg::A0] = path;
                frame.regs[reg::A1] = argv;
            }
            Self::Exit { code } => frame.regs[reg::A0] = code as i64 as u64,
            Self::Waitpid {
                pid,
                status,
                options,
            } => {
                frame.regs[reg::A0] = pid as i64 as u64;
                frame.regs[reg::A1] = status;
                frame.regs[reg::A2] = options;
            }
        }
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        match self {
            Self::Fork => SYS_FORK,
            Self::Execv { .. } => SYS_EXECV,
            Self::Exit { .. } => SYS_EXIT,
            Self::Waitpid { .. } => SYS_WAITPID,
            Self::Getpid => SYS_GETPID,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::Execv { .. } => "execv",
            Self::Exit { .. } => "exit",
            Self::Waitpid { .. } => "waitpid",
            Self::Getpid => "getpid",
        }
    }
}
