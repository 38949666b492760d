/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{Pid, UserAddr};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error numbers visible to user mode
///
/// Numbering follows the Linux ABI so encoded results can be read by
/// ordinary tooling. Pid exhaustion reports `EAGAIN`, as `fork(2)` does.
#[repr(i32)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Errno {
    ENOENT = 2,
    ESRCH = 3,
    EIO = 5,
    E2BIG = 7,
    ENOEXEC = 8,
    ECHILD = 10,
    ENPROC = 11,
    ENOMEM = 12,
    EFAULT = 14,
    EINVAL = 22,
    ENAMETOOLONG = 36,
    ENOSYS = 38,
}

impl Errno {
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map a raw code back to an errno, if it is one the kernel produces
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let errno = match code {
            2 => Self::ENOENT,
            3 => Self::ESRCH,
            5 => Self::EIO,
            7 => Self::E2BIG,
            8 => Self::ENOEXEC,
            10 => Self::ECHILD,
            11 => Self::ENPROC,
            12 => Self::ENOMEM,
            14 => Self::EFAULT,
            22 => Self::EINVAL,
            36 => Self::ENAMETOOLONG,
            38 => Self::ENOSYS,
            _ => return None,
        };
        Some(errno)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum KernelError {
    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(kernel::out_of_memory),
        help("The memory collaborator refused the allocation. Free address spaces and retry.")
    )]
    OutOfMemory(String),

    #[error("No process slot available: {0}")]
    #[diagnostic(
        code(process::limit_reached),
        help("The pid space or the process table is full. Reap zombies to free slots.")
    )]
    ProcessLimit(String),

    #[error("Process {0} not found")]
    #[diagnostic(
        code(process::not_found),
        help("The process may have been reaped or never existed. Check PID validity.")
    )]
    NoSuchProcess(Pid),

    #[error("Process {target} is not a child of {caller}")]
    #[diagnostic(
        code(process::not_child),
        help("A process may only wait for its own children.")
    )]
    NotChild { caller: Pid, target: Pid },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(kernel::invalid_argument))]
    InvalidArgument(String),

    #[error("Bad user address {0:#x}")]
    #[diagnostic(
        code(kernel::bad_address),
        help("The pointer does not lie inside a mapped region of the caller's address space.")
    )]
    BadAddress(UserAddr),

    #[error("Name too long: limit is {limit} bytes")]
    #[diagnostic(code(kernel::name_too_long))]
    NameTooLong { limit: usize },

    #[error("Argument list too long: {0}")]
    #[diagnostic(code(exec::too_big))]
    ArgListTooLong(String),

    #[error("No such file: {0}")]
    #[diagnostic(code(vfs::not_found))]
    NotFound(String),

    #[error("Not an executable image: {0}")]
    #[diagnostic(
        code(exec::bad_image),
        help("The loader rejected the file. Check that it is a valid executable.")
    )]
    NotExecutable(String),

    #[error("Thread creation failed: {0}")]
    #[diagnostic(code(process::thread_creation_failed))]
    ThreadCreation(String),

    #[error("Unknown system call {0}")]
    #[diagnostic(code(syscall::unknown))]
    NoSys(u64),

    #[error("I/O error: {0}")]
    #[diagnostic(code(kernel::io_error))]
    Io(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(kernel::configuration_error),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(String),
}

impl KernelError {
    /// The errno this error is reported as at the syscall boundary
    #[must_use]
    pub const fn errno(&self) -> Errno {
        match self {
            KernelError::OutOfMemory(_) | KernelError::ThreadCreation(_) => Errno::ENOMEM,
            KernelError::ProcessLimit(_) => Errno::ENPROC,
            KernelError::NoSuchProcess(_) => Errno::ESRCH,
            KernelError::NotChild { .. } => Errno::ECHILD,
            KernelError::InvalidArgument(_) | KernelError::Configuration(_) => Errno::EINVAL,
            KernelError::BadAddress(_) => Errno::EFAULT,
            KernelError::NameTooLong { .. } => Errno::ENAMETOOLONG,
            KernelError::ArgListTooLong(_) => Errno::E2BIG,
            KernelError::NotFound(_) => Errno::ENOENT,
            KernelError::NotExecutable(_) => Errno::ENOEXEC,
            KernelError::NoSys(_) => Errno::ENOSYS,
            KernelError::Io(_) => Errno::EIO,
        }
    }
}

impl From<std::io::Error> for KernelError {
    fn from(err: std::io::Error) -> Self {
        KernelError::Io(err.to_string())
    }
}

/// Result type for kernel operations
///
/// # Must Use
/// Kernel operations can fail and must be handled to prevent leaked resources
pub type KernelResult<T> = Result<T, KernelError>;
