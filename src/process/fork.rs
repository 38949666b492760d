/*!
 * Process Creation
 * fork: duplicate the caller into a new child process
 */

use super::thread::{ThreadStart, UserThread};
use crate::core::errors::KernelResult;
use crate::core::types::Pid;
use crate::kernel::Kernel;
use crate::platform::{AddressSpaces, Platform, TrapFrame};
use std::sync::Arc;
use tracing::{info, warn};

impl<P: Platform> Kernel<P> {
    /// Create a child of the process running on `thread`
    ///
    /// `frame` is the caller's state at the trap. The child starts from a copy
    /// of it that returns 0 past the trapping instruction. On any failure the
    /// record and the copied space are gone before the error is returned.
    pub fn fork(self: &Arc<Self>, thread: &UserThread<P::Space>, frame: &TrapFrame) -> KernelResult<Pid> {
        let parent = thread.pid();

        let child = self.table.register(parent, thread.name()).map_err(|e| {
            warn!(parent = %parent, error = %e, "fork: no process slot");
            e
        })?;

        let space = match self.platform.copy(thread.active_space()) {
            Ok(space) => space,
            Err(e) => {
                self.table.unregister(child);
                warn!(parent = %parent, error = %e, "fork: address space copy failed");
                return Err(e);
            }
        };

        let mut child_frame = *frame;
        child_frame.set_result(Ok(0));
        child_frame.advance();

        self.start_thread(ThreadStart {
            thread: UserThread::new(child, thread.name(), Some(space)),
            frame: child_frame,
        })?;

        info!(parent = %parent, child = %child, name = thread.name(), "fork");
        Ok(child)
    }
}
