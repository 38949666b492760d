/*!
 * Process Module
 * Process table, records and the fork/exec/exit/wait services
 */

pub mod argv;
pub mod exec;
pub mod exit;
pub mod fork;
pub mod pid;
pub mod table;
pub mod thread;
pub mod types;
pub mod wait;

// Re-export for convenience
pub use argv::ArgvLayout;
pub use pid::PidAllocator;
pub use table::{ExitOutcome, ProcessTable};
pub use thread::{ThreadStart, UserThread};
pub use types::{
    wexitstatus, wifexited, wifsignaled, wtermsig, ExitStatus, ProcessInfo, ProcessRecord,
    ProcessState,
};
pub use wait::WAIT_NO_OPTIONS;
