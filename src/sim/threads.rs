/*!
 * Simulated Threads
 * One host thread per user process
 */

use crate::core::errors::KernelError;
use crate::platform::{SpawnError, Trampoline};
use crate::process::thread::ThreadStart;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::error;

/// Unwind payload that ends a user thread
pub(crate) struct ThreadExited;

type SpawnHook = Box<dyn FnOnce() + Send>;

/// Host-thread backed thread management
#[derive(Default)]
pub struct SimThreads {
    handles: Mutex<Vec<JoinHandle<()>>>,
    failures: AtomicUsize,
    spawned: AtomicUsize,
    hook: Mutex<Option<SpawnHook>>,
}

impl fmt::Debug for SimThreads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimThreads")
            .field("running", &self.handles.lock().len())
            .field("failures", &self.failures)
            .field("spawned", &self.spawned)
            .field("hooked", &self.hook.lock().is_some())
            .finish()
    }
}

impl SimThreads {
    /// Make the next `count` spawns fail
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Run `hook` on the spawning thread at the start of the next spawn
    pub fn before_next_spawn<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// Threads successfully started so far
    #[must_use]
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub(crate) fn spawn<S: Send + 'static>(
        &self,
        name: &str,
        start: ThreadStart<S>,
        trampoline: Trampoline<S>,
    ) -> Result<(), SpawnError<S>> {
        let hook = self.hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        if self.take_failure() {
            return Err(SpawnError {
                error: KernelError::ThreadCreation("injected failure".into()),
                start,
            });
        }

        // The bundle stays reachable here until the thread takes it
        let slot = Arc::new(Mutex::new(Some(start)));
        let theirs = Arc::clone(&slot);

        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            if let Some(start) = theirs.lock().take() {
                run(trampoline, start);
            }
        });

        match spawned {
            Ok(handle) => {
                self.handles.lock().push(handle);
                self.spawned.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => match slot.lock().take() {
                Some(start) => Err(SpawnError {
                    error: KernelError::ThreadCreation(e.to_string()),
                    start,
                }),
                None => panic!("thread {name} failed to spawn after starting"),
            },
        }
    }

    pub(crate) fn exit_thread(&self) -> ! {
        panic::resume_unwind(Box::new(ThreadExited))
    }

    /// Join every thread started so far, including ones started while joining
    pub fn join_all(&self) {
        loop {
            let handles = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

/// Thread body: run the trampoline until the thread exits
fn run<S>(trampoline: Trampoline<S>, start: ThreadStart<S>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || trampoline(start)));
    if let Err(payload) = outcome {
        if !payload.is::<ThreadExited>() {
            let name = thread::current().name().unwrap_or("?").to_string();
            error!(thread = %name, "kernel panic on user thread, halting");
            std::process::abort();
        }
    }
}
