/*!
 * Wait Service
 * waitpid and getpid
 */

use super::thread::UserThread;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{Pid, UserAddr, USER_NULL};
use crate::kernel::Kernel;
use crate::platform::{Platform, UserMemory};
use tracing::debug;

/// The only accepted `waitpid` options value
pub const WAIT_NO_OPTIONS: u64 = 0;

impl<P: Platform> Kernel<P> {
    /// Block until child `pid` exits, store its encoded status and reap it
    ///
    /// A null `status` skips the copy-out. If the copy-out faults the child
    /// stays a zombie and can be waited for again.
    pub fn waitpid(
        &self,
        thread: &UserThread<P::Space>,
        pid: i32,
        status: UserAddr,
        options: u64,
    ) -> KernelResult<Pid> {
        let caller = thread.pid();

        if options != WAIT_NO_OPTIONS {
            return Err(KernelError::InvalidArgument(format!(
                "unsupported waitpid options {options:#x}"
            )));
        }
        if pid <= 0 {
            return Err(KernelError::InvalidArgument(format!(
                "waitpid target {pid} does not name a single process"
            )));
        }
        let target = Pid(pid as u32);

        let exit_status = self.table.wait_for_exit(caller, target)?;
        if status != USER_NULL {
            let encoded = exit_status.encode().to_le_bytes();
            self.platform
                .copyout(thread.active_space(), &encoded, status)?;
        }
        self.table.reap(caller, target)?;

        debug!(pid = %caller, child = %target, status = ?exit_status, "waitpid");
        Ok(target)
    }

    /// Pid of the process running on `thread`
    ///
    /// Panics if the caller has no record; a running process always has one.
    pub fn getpid(&self, thread: &UserThread<P::Space>) -> Pid {
        let pid = thread.pid();
        assert!(
            self.table.contains(pid),
            "running process {pid} missing from the process table"
        );
        pid
    }
}
