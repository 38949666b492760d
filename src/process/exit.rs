/*!
 * Process Termination
 */

use super::thread::UserThread;
use super::types::ExitStatus;
use crate::core::types::Signal;
use crate::kernel::Kernel;
use crate::platform::{AddressSpaces, Platform, Threads};
use tracing::{info, warn};

impl<P: Platform> Kernel<P> {
    /// Terminate the process running on `thread`
    ///
    /// The status is published (and the parent woken) before the address
    /// space is released; the record stays behind as a zombie until the parent
    /// reaps it.
    pub fn exit(&self, thread: &mut UserThread<P::Space>, status: ExitStatus) -> ! {
        let pid = thread.pid();

        let outcome = self.table.record_exit(pid, status);
        info!(
            pid = %pid,
            status = ?status,
            reaped_children = outcome.reaped_children.len(),
            detached_children = outcome.detached_children.len(),
            "process exited"
        );

        if let Some(space) = thread.take_space() {
            self.platform.destroy(space);
        }
        self.table.retire(pid);

        self.platform.exit_thread()
    }

    /// Kill the process running on `thread` after a fatal fault
    pub fn kill_current(&self, thread: &mut UserThread<P::Space>, signal: Signal) -> ! {
        warn!(pid = %thread.pid(), signal, "killing process");
        self.exit(thread, ExitStatus::Signaled(signal))
    }
}
