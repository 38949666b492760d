/*!
 * System Limits and Constants
 *
 * Centralized location for process-lifecycle limits and magic numbers.
 * Values here are defaults; [`crate::core::config::KernelConfig`] can override
 * the tunable ones at boot.
 */

// =============================================================================
// PROCESS IDENTIFIERS
// =============================================================================

/// Lowest pid handed to a user process
/// Pid 0 is the child side of fork and pid 1 is the kernel sentinel
pub const PID_MIN: u32 = 2;

/// Highest pid handed to a user process
pub const PID_MAX: u32 = 32767;

/// Default cap on records in the process table (live processes plus zombies)
pub const DEFAULT_MAX_PROCESSES: usize = 256;

// =============================================================================
// EXEC ARGUMENT LIMITS
// =============================================================================

/// Total bytes of argument strings, NUL terminators included
pub const ARG_MAX: usize = 64 * 1024;

/// Maximum number of entries in an argument vector
pub const MAX_ARGS: usize = 64;

/// Maximum executable path length, NUL terminator included
pub const PATH_MAX: usize = 1024;

/// Alignment of both regions of the initial user stack
pub const STACK_ALIGN: usize = 8;

// =============================================================================
// USER ADDRESS SPACE
// =============================================================================

/// Page size used by address-space accounting
pub const PAGE_SIZE: usize = 4096;

/// Top of the user stack (exclusive)
pub const USER_STACK_TOP: u64 = 0x8000_0000;

/// Default user stack size in pages
pub const USER_STACK_PAGES: usize = 18;

/// Width of one trapping instruction; epc advances by this after a syscall
pub const INSTRUCTION_SIZE: u64 = 4;

// =============================================================================
// SIGNALS
// =============================================================================

/// Fatal memory fault
pub const SIGSEGV: u8 = 11;

/// Illegal instruction
pub const SIGILL: u8 = 4;
