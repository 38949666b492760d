/*!
 * Syscall Dispatch
 * Trap entry for user processes
 */

use super::types::Syscall;
use crate::core::errors::KernelResult;
use crate::kernel::Kernel;
use crate::monitoring::SyscallSpan;
use crate::platform::{Platform, TrapFrame};
use crate::process::thread::UserThread;
use crate::process::types::ExitStatus;
use std::sync::Arc;
use tracing::{debug, warn};

impl<P: Platform> Kernel<P> {
    /// Handle the system call described by `frame`
    ///
    /// On return `frame` holds the result (`v0`, with `a3` set on error) and
    /// `epc` points past the trap. `exit` and a successful `execv` do not
    /// return here.
    pub fn syscall(self: &Arc<Self>, thread: &mut UserThread<P::Space>, frame: &mut TrapFrame) {
        let pid = thread.pid();

        let result: KernelResult<u64> = match Syscall::decode(frame) {
            Err(e) => {
                warn!(pid = %pid, number = frame.syscall_number(), "unknown system call");
                Err(e)
            }
            Ok(Syscall::Exit { code }) => {
                debug!(pid = %pid, code, "sys_exit");
                self.exit(thread, ExitStatus::Exited(code))
            }
            Ok(Syscall::Execv { path, argv }) => {
                debug!(pid = %pid, path, argv, "sys_execv");
                match self.execv(thread, path, argv) {
                    Ok(never) => match never {},
                    Err(e) => Err(e),
                }
            }
            Ok(call) => {
                let span = SyscallSpan::new(call.name(), pid);
                let result = match call {
                    Syscall::Fork => self.fork(thread, frame).map(u64::from),
                    Syscall::Waitpid {
                        pid: target,
                        status,
                        options,
                    } => self
                        .waitpid(thread, target, status, options)
                        .map(u64::from),
                    Syscall::Getpid => Ok(u64::from(self.getpid(thread))),
                    Syscall::Exit { .. } | Syscall::Execv { .. } => {
                        unreachable!("handled above")
                    }
                };
                span.record_result(&result);
                result
            }
        };

        frame.set_result(result);
        frame.advance();
    }
}
