/*!
 * Simulated User Mode
 *
 * User programs are Rust closures bound to code addresses in a space. The
 * mode switch looks up the closure at `epc` and runs it with a [`UserEnv`],
 * which is the only way back into the kernel: every call fills a trap frame
 * and traps through [`Kernel::syscall`], exactly like compiled user code.
 */

use super::memory::SimSpace;
use super::threads::ThreadExited;
use super::SimPlatform;
use crate::core::errors::{Errno, KernelError, KernelResult};
use crate::core::limits::{ARG_MAX, INSTRUCTION_SIZE, SIGSEGV};
use crate::core::types::{Pid, UserAddr, USER_NULL, USER_PTR_SIZE};
use crate::kernel::Kernel;
use crate::platform::{reg, TrapFrame};
use crate::process::thread::UserThread;
use crate::syscalls::Syscall;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Code of a user program; the return value is its exit code
pub type UserProgram = Arc<dyn Fn(&mut UserEnv<'_>) -> i32 + Send + Sync>;

/// Result of a system call as user code sees it
pub type SysResult<T> = Result<T, Errno>;

/// User-mode view of a running process
pub struct UserEnv<'a> {
    kernel: &'a Arc<Kernel<SimPlatform>>,
    thread: &'a mut UserThread<SimSpace>,
    frame: TrapFrame,
    entry: TrapFrame,
    status_slot: Option<UserAddr>,
    in_kernel: bool,
}

impl<'a> UserEnv<'a> {
    fn new(
        kernel: &'a Arc<Kernel<SimPlatform>>,
        thread: &'a mut UserThread<SimSpace>,
        frame: TrapFrame,
    ) -> Self {
        Self {
            kernel,
            thread,
            frame,
            entry: frame,
            status_slot: None,
            in_kernel: false,
        }
    }

    /// Register state the program was entered with
    #[must_use]
    pub fn entry_frame(&self) -> &TrapFrame {
        &self.entry
    }

    /// Current register state
    #[must_use]
    pub fn frame(&self) -> &TrapFrame {
        &self.frame
    }

    fn space(&self) -> &SimSpace {
        self.thread.active_space()
    }

    /// Arguments from `a0`/`a1` at entry, read out of user memory
    ///
    /// Fails if a pointer faults or the array is not NULL-terminated.
    pub fn try_args(&self) -> KernelResult<Vec<Vec<u8>>> {
        let argc = self.entry.regs[reg::A0] as usize;
        let argv = self.entry.regs[reg::A1];
        let space = self.space();

        let mut args = Vec::with_capacity(argc);
        for index in 0..=argc {
            let slot = argv + (index * USER_PTR_SIZE) as u64;
            let mut raw = [0u8; USER_PTR_SIZE];
            space.read(slot, &mut raw)?;
            let ptr = UserAddr::from_le_bytes(raw);

            if index == argc {
                if ptr != USER_NULL {
                    return Err(KernelError::InvalidArgument(
                        "argv is not NULL-terminated".into(),
                    ));
                }
                break;
            }
            args.push(space.read_cstr(ptr, ARG_MAX)?);
        }
        Ok(args)
    }

    /// Arguments as strings; a malformed argument block is a fatal fault
    pub fn args(&self) -> Vec<String> {
        match self.try_args() {
            Ok(args) => args
                .into_iter()
                .map(|a| String::from_utf8_lossy(&a).into_owned())
                .collect(),
            Err(e) => panic!("segmentation fault reading arguments: {e}"),
        }
    }

    /// Copy `bytes` into the heap of this process
    pub fn alloc_bytes(&self, bytes: &[u8]) -> SysResult<UserAddr> {
        let space = self.space();
        let addr = space.alloc(bytes.len()).map_err(|e| e.errno())?;
        space.write(addr, bytes).map_err(|e| e.errno())?;
        Ok(addr)
    }

    /// Copy `s` into the heap with a terminating NUL
    pub fn alloc_cstr(&self, s: &str) -> SysResult<UserAddr> {
        self.space()
            .alloc_cstr(s.as_bytes())
            .map_err(|e| e.errno())
    }

    /// Build a NULL-terminated pointer array in the heap
    pub fn alloc_argv(&self, args: &[&str]) -> SysResult<UserAddr> {
        let mut bytes = Vec::with_capacity((args.len() + 1) * USER_PTR_SIZE);
        for arg in args {
            bytes.extend_from_slice(&self.alloc_cstr(arg)?.to_le_bytes());
        }
        bytes.extend_from_slice(&USER_NULL.to_le_bytes());
        self.alloc_bytes(&bytes)
    }

    pub fn read(&self, addr: UserAddr, len: usize) -> SysResult<Vec<u8>> {
        let mut buf = vec![0; len];
        self.space().read(addr, &mut buf).map_err(|e| e.errno())?;
        Ok(buf)
    }

    /// Issue `call` and return `v0`, or the errno when `a3` is set
    pub fn syscall(&mut self, call: Syscall) -> SysResult<u64> {
        call.encode(&mut self.frame);
        self.trap()
    }

    /// Trap with whatever is currently in the registers
    pub fn syscall_raw(&mut self, number: u64, args: [u64; 4]) -> SysResult<u64> {
        self.frame.regs[reg::V0] = number;
        self.frame.regs[reg::A0..=reg::A3].copy_from_slice(&args);
        self.trap()
    }

    fn trap(&mut self) -> SysResult<u64> {
        self.in_kernel = true;
        self.kernel.syscall(self.thread, &mut self.frame);
        self.in_kernel = false;

        if self.frame.failed() {
            let code = self.frame.return_value() as i32;
            Err(Errno::from_code(code).unwrap_or(Errno::EIO))
        } else {
            Ok(self.frame.return_value())
        }
    }

    /// Fork; `child` runs in the new process and its return value is the child's exit code
    pub fn fork<F>(&mut self, child: F) -> SysResult<Pid>
    where
        F: Fn(&mut UserEnv<'_>) -> i32 + Send + Sync + 'static,
    {
        // The child resumes after the trap instruction
        let resume = self.frame.epc + INSTRUCTION_SIZE;
        self.space().bind(resume, Arc::new(child));
        let result = self.syscall(Syscall::Fork);
        // Only the child's copy of the space runs that code
        self.space().unbind(resume);
        result.map(|pid| Pid(pid as u32))
    }

    /// Code bindings in the current space
    #[must_use]
    pub fn bound_programs(&self) -> usize {
        self.space().bound_programs()
    }

    /// Replace this program with `path`; returns only on failure
    pub fn execv(&mut self, path: &str, args: &[&str]) -> Errno {
        let path = match self.alloc_cstr(path) {
            Ok(addr) => addr,
            Err(errno) => return errno,
        };
        let argv = match self.alloc_argv(args) {
            Ok(addr) => addr,
            Err(errno) => return errno,
        };
        self.execv_raw(path, argv)
    }

    /// execv with caller-built pointers
    pub fn execv_raw(&mut self, path: UserAddr, argv: UserAddr) -> Errno {
        match self.syscall(Syscall::Execv { path, argv }) {
            Ok(_) => panic!("execv returned success"),
            Err(errno) => errno,
        }
    }

    pub fn exit(&mut self, code: i32) -> ! {
        let _ = self.syscall(Syscall::Exit { code });
        panic!("exit returned")
    }

    /// Wait for `pid` and return the encoded wait status
    pub fn waitpid(&mut self, pid: Pid) -> SysResult<i32> {
        let slot = match self.status_slot {
            Some(slot) => slot,
            None => {
                let slot = self.alloc_bytes(&[0; 8])?;
                self.status_slot = Some(slot);
                slot
            }
        };

        self.waitpid_raw(pid.as_u32() as i32, slot, 0)?;
        let raw = self.read(slot, 4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn waitpid_raw(&mut self, pid: i32, status: UserAddr, options: u64) -> SysResult<Pid> {
        self.syscall(Syscall::Waitpid {
            pid,
            status,
            options,
        })
        .map(|pid| Pid(pid as u32))
    }

    pub fn getpid(&mut self) -> Pid {
        match self.syscall(Syscall::Getpid) {
            Ok(pid) => Pid(pid as u32),
            Err(errno) => panic!("getpid failed with {errno}"),
        }
    }
}

/// Run the program bound at `frame.epc` on `thread` until the process exits
pub(super) fn enter_user(
    kernel: &Arc<Kernel<SimPlatform>>,
    thread: &mut UserThread<SimSpace>,
    frame: TrapFrame,
) -> ! {
    let program = match thread.active_space().program_at(frame.epc) {
        Some(program) => program,
        None => {
            warn!(pid = %thread.pid(), epc = frame.epc, "no code at entry point");
            kernel.kill_current(thread, SIGSEGV)
        }
    };
    debug!(pid = %thread.pid(), epc = frame.epc, "entering user mode");

    let (outcome, in_kernel) = {
        let mut env = UserEnv::new(kernel, thread, frame);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let code = program(&mut env);
            env.exit(code);
        }));
        (outcome, env.in_kernel)
    };

    let payload = match outcome {
        Ok(()) => panic!("user program returned past exit"),
        Err(payload) => payload,
    };
    if in_kernel || payload.is::<ThreadExited>() {
        panic::resume_unwind(payload);
    }

    warn!(pid = %thread.pid(), "user program faulted");
    kernel.kill_current(thread, SIGSEGV)
}
