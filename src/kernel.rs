/*!
 * Kernel
 * Owns the process table and the platform; entry point for every lifecycle operation
 *
 * The lifecycle services are implemented as `impl Kernel` blocks in
 * `process::{fork, exec, exit, wait}`; the trap path lives in `syscalls`.
 */

use crate::core::config::KernelConfig;
use crate::core::errors::KernelResult;
use crate::core::types::{Pid, UserAddr};
use crate::platform::{AddressSpaces, Platform, SpawnError, Threads, TrapFrame};
use crate::process::table::ProcessTable;
use crate::process::thread::{ThreadStart, UserThread};
use crate::process::types::{ExitStatus, ProcessInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Kernel<P: Platform> {
    pub(crate) table: ProcessTable,
    pub(crate) platform: P,
    pub(crate) config: KernelConfig,
}

impl<P: Platform> Kernel<P> {
    /// Boot a kernel on `platform`
    pub fn new(platform: P, config: KernelConfig) -> KernelResult<Arc<Self>> {
        config.validate()?;
        info!(
            pid_min = config.pid_min,
            pid_max = config.pid_max,
            max_processes = config.max_processes,
            "process lifecycle kernel initialized"
        );
        Ok(Arc::new(Self {
            table: ProcessTable::new(&config),
            platform,
            config,
        }))
    }

    #[inline]
    #[must_use]
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    #[inline]
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Start `path` as a new process whose parent is the kernel
    ///
    /// The image is loaded and its argument block built before the thread
    /// exists; any failure leaves no record behind.
    pub fn spawn_program<A: AsRef<[u8]>>(self: &Arc<Self>, path: &str, args: &[A]) -> KernelResult<Pid> {
        let name = program_name(path);
        let pid = self.table.register(Pid::KERNEL, &name)?;

        let image = match self.prepare_image(path, args) {
            Ok(image) => image,
            Err(e) => {
                self.table.unregister(pid);
                warn!(path, error = %e, "failed to start program");
                return Err(e);
            }
        };

        let start = ThreadStart {
            frame: image.entry_frame(),
            thread: UserThread::new(pid, name, Some(image.space)),
        };
        self.start_thread(start)?;

        info!(pid = %pid, path, "started program");
        Ok(pid)
    }

    /// Wait for a process the kernel started and reap it
    pub fn wait_child(&self, pid: Pid) -> KernelResult<ExitStatus> {
        self.table.wait_for_exit(Pid::KERNEL, pid)?;
        self.table.reap(Pid::KERNEL, pid)
    }

    /// Block until every user process has exited
    pub fn wait_quiescent(&self, timeout: Option<Duration>) -> bool {
        self.table.wait_quiescent(timeout)
    }

    /// Snapshot of the process table
    #[must_use]
    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.table.snapshot()
    }

    /// Hand `start` to the scheduler; on failure the record and space are torn down
    pub(crate) fn start_thread(self: &Arc<Self>, start: ThreadStart<P::Space>) -> KernelResult<()> {
        let pid = start.thread.pid();
        let name = format!("pid-{pid}");
        let kernel = Arc::clone(self);

        match self.platform.spawn(
            &name,
            start,
            Box::new(move |start: ThreadStart<P::Space>| {
                kernel.thread_entry(start);
            }),
        ) {
            Ok(()) => Ok(()),
            Err(SpawnError { error, mut start }) => {
                if let Some(space) = start.thread.take_space() {
                    self.platform.destroy(space);
                }
                self.table.unregister(pid);
                warn!(pid = %pid, error = %error, "thread creation failed");
                Err(error)
            }
        }
    }

    /// First code run by every new user thread
    fn thread_entry(self: &Arc<Self>, start: ThreadStart<P::Space>) -> ! {
        let ThreadStart { mut thread, frame } = start;
        self.platform.activate(thread.active_space());
        P::enter_user(self, &mut thread, frame)
    }
}

/// Loaded image waiting to be installed
pub(crate) struct PreparedImage<S> {
    pub space: S,
    pub entry: UserAddr,
    pub argc: usize,
    pub stack_pointer: UserAddr,
}

impl<S> PreparedImage<S> {
    pub fn entry_frame(&self) -> TrapFrame {
        TrapFrame::for_entry(self.argc, self.stack_pointer, self.stack_pointer, self.entry)
    }
}

/// Last path component, used as the process name
pub(crate) fn program_name(path: &str) -> String {
    path.rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(path)
        .to_string()
}
