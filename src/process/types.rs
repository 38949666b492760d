/*!
 * Process Types
 * Process records, exit status and wait-status encoding
 */

use crate::core::types::{Pid, Signal};
use parking_lot::Condvar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Called exit with this code
    Exited(i32),
    /// Killed by the kernel after a fatal fault
    Signaled(Signal),
}

impl ExitStatus {
    /// Encode as the status word `waitpid` copies out
    ///
    /// Normal exit keeps the low 8 bits of the code in bits 8..16; signal death
    /// stores the signal in the low 7 bits.
    #[inline]
    #[must_use]
    pub const fn encode(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => (code & 0xff) << 8,
            ExitStatus::Signaled(sig) => (sig & 0x7f) as i32,
        }
    }
}

/// True if the encoded status describes a normal exit
#[inline]
#[must_use]
pub const fn wifexited(status: i32) -> bool {
    status & 0x7f == 0
}

/// Exit code of a normally exited process
#[inline]
#[must_use]
pub const fn wexitstatus(status: i32) -> i32 {
    (status >> 8) & 0xff
}

/// True if the encoded status describes death by signal
#[inline]
#[must_use]
pub const fn wifsignaled(status: i32) -> bool {
    status & 0x7f != 0
}

/// Signal that killed the process
#[inline]
#[must_use]
pub const fn wtermsig(status: i32) -> i32 {
    status & 0x7f
}

/// Kernel-owned metadata for one user process
///
/// Records live only inside [`super::table::ProcessTable`] and are only touched
/// with the table lock held.
#[derive(Debug)]
pub struct ProcessRecord {
    pub pid: Pid,
    /// `None` once the parent has exited and the process is detached
    pub parent: Option<Pid>,
    pub name: String,
    pub exit_status: Option<ExitStatus>,
    /// Waited on by the parent, notified once by the exiting process
    pub exited: Arc<Condvar>,
}

impl ProcessRecord {
    #[must_use]
    pub fn new(pid: Pid, parent: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            parent: Some(parent),
            name: name.into(),
            exit_status: None,
            exited: Arc::new(Condvar::new()),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_zombie(&self) -> bool {
        self.exit_status.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_child_of(&self, pid: Pid) -> bool {
        self.parent == Some(pid)
    }

    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            parent: self.parent,
            name: self.name.clone(),
            state: if self.is_zombie() {
                ProcessState::Zombie
            } else {
                ProcessState::Running
            },
            exit_status: self.exit_status,
        }
    }
}

/// Externally visible process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Has not exited yet
    Running,
    /// Exited, waiting to be reaped by its parent
    Zombie,
}

/// Snapshot of a process record, safe to hand out without the table lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
    pub name: String,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<ExitStatus>,
}
