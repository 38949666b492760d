/*!
 * Process Lifecycle Kernel Library
 * Process table and the fork/exec/exit/waitpid/getpid services of a teaching kernel
 */

pub mod core;
pub mod kernel;
pub mod monitoring;
pub mod platform;
pub mod process;
pub mod sim;
pub mod syscalls;

// Re-exports
pub use crate::core::{Errno, KernelConfig, KernelError, KernelResult, Pid, UserAddr};
pub use kernel::Kernel;
pub use monitoring::init_tracing;
pub use platform::{Platform, TrapFrame};
pub use process::{ExitStatus, ProcessInfo, ProcessState, ProcessTable, UserThread};
pub use sim::{SimImage, SimPlatform, UserEnv};
pub use syscalls::Syscall;
