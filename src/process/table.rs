/*!
 * Process Table
 *
 * Global registry of process records behind a single lock. Every read or
 * write of a record happens inside one of the methods below, so no caller
 * ever holds a reference to a record across a blocking point.
 *
 * # Lock discipline
 *
 * - One `parking_lot::Mutex` guards the whole table
 * - Each record carries its own condvar; only the parent waits on it
 * - A second condvar signals quiescence (no live user processes left)
 * - Guards are scoped, so every return path releases the lock exactly once
 */

use super::pid::PidAllocator;
use super::types::{ExitStatus, ProcessInfo, ProcessRecord};
use crate::core::config::KernelConfig;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::Pid;
use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct TableInner {
    records: AHashMap<Pid, ProcessRecord>,
    pids: PidAllocator,
    /// Processes that have not yet finished exiting
    live: usize,
    max_processes: usize,
}

/// What `record_exit` did besides storing the status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Zombie children removed because nobody can wait for them any more
    pub reaped_children: Vec<Pid>,
    /// Live children that no longer have a parent
    pub detached_children: Vec<Pid>,
}

pub struct ProcessTable {
    inner: Mutex<TableInner>,
    quiescent: Condvar,
}

impl ProcessTable {
    #[must_use]
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                records: AHashMap::new(),
                pids: PidAllocator::new(config.pid_min, config.pid_max),
                live: 0,
                max_processes: config.max_processes,
            }),
            quiescent: Condvar::new(),
        }
    }

    /// Allocate a pid and insert a fresh record whose parent is `parent`
    pub fn register(&self, parent: Pid, name: &str) -> KernelResult<Pid> {
        let mut inner = self.inner.lock();

        if inner.records.len() >= inner.max_processes {
            return Err(KernelError::ProcessLimit(format!(
                "process table holds {} records",
                inner.records.len()
            )));
        }

        let TableInner { records, pids, .. } = &mut *inner;
        let pid = pids
            .allocate(|candidate| records.contains_key(&candidate))
            .ok_or_else(|| KernelError::ProcessLimit("pid space exhausted".into()))?;

        records.insert(pid, ProcessRecord::new(pid, parent, name));
        inner.live += 1;
        debug!(pid = %pid, parent = %parent, "registered process");
        Ok(pid)
    }

    /// Undo a `register` whose process never ran
    pub fn unregister(&self, pid: Pid) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.records.remove(&pid) {
            debug_assert!(record.exit_status.is_none());
            debug!(pid = %pid, "unregistered process");
            self.release_live(&mut inner);
        }
    }

    /// Snapshot of one record
    #[must_use]
    pub fn lookup(&self, pid: Pid) -> Option<ProcessInfo> {
        self.inner.lock().records.get(&pid).map(ProcessRecord::info)
    }

    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.inner.lock().records.contains_key(&pid)
    }

    /// Rename a process (exec replaces the image name)
    pub fn rename(&self, pid: Pid, name: &str) {
        if let Some(record) = self.inner.lock().records.get_mut(&pid) {
            record.name = name.to_string();
        }
    }

    /// Store the exit status of `pid` and wake its parent
    ///
    /// Children of the exiting process are reaped if they already exited and
    /// detached otherwise. Panics if `pid` is missing or already exited: both
    /// mean the exit path ran twice.
    pub fn record_exit(&self, pid: Pid, status: ExitStatus) -> ExitOutcome {
        let mut inner = self.inner.lock();

        let record = match inner.records.get_mut(&pid) {
            Some(record) => record,
            None => panic!("exit of unknown process {pid}"),
        };
        assert!(
            record.exit_status.is_none(),
            "process {pid} exited twice"
        );
        record.exit_status = Some(status);
        record.exited.notify_all();

        let mut outcome = ExitOutcome::default();
        for child in inner.records.values_mut().filter(|r| r.is_child_of(pid)) {
            if child.is_zombie() {
                outcome.reaped_children.push(child.pid);
            } else {
                child.parent = None;
                outcome.detached_children.push(child.pid);
            }
        }
        for child in &outcome.reaped_children {
            inner.records.remove(child);
        }

        outcome
    }

    /// Final bookkeeping once an exiting process has released its resources
    ///
    /// Drops a detached process's record (nobody will wait for it) and wakes
    /// quiescence waiters when the last live process is gone. Returns true in
    /// that case.
    pub fn retire(&self, pid: Pid) -> bool {
        let mut inner = self.inner.lock();

        let detached = inner
            .records
            .get(&pid)
            .is_some_and(|record| record.parent.is_none() && record.is_zombie());
        if detached {
            inner.records.remove(&pid);
            debug!(pid = %pid, "removed detached process at exit");
        }

        self.release_live(&mut inner)
    }

    /// Drop one live process, waking quiescence waiters when none are left
    fn release_live(&self, inner: &mut TableInner) -> bool {
        inner.live -= 1;
        if inner.live == 0 {
            self.quiescent.notify_all();
            info!("no user processes left");
            return true;
        }
        false
    }

    /// Block until `target`, a child of `caller`, has exited
    ///
    /// Returns the status without consuming it; see [`Self::reap`].
    pub fn wait_for_exit(&self, caller: Pid, target: Pid) -> KernelResult<ExitStatus> {
        let mut inner = self.inner.lock();

        loop {
            let record = inner
                .records
                .get(&target)
                .ok_or(KernelError::NoSuchProcess(target))?;
            if !record.is_child_of(caller) {
                return Err(KernelError::NotChild { caller, target });
            }
            if let Some(status) = record.exit_status {
                return Ok(status);
            }

            let exited = record.exited.clone();
            exited.wait(&mut inner);
        }
    }

    /// Remove an exited child of `caller`, returning its status
    pub fn reap(&self, caller: Pid, target: Pid) -> KernelResult<ExitStatus> {
        let mut inner = self.inner.lock();

        let record = inner
            .records
            .get(&target)
            .ok_or(KernelError::NoSuchProcess(target))?;
        if !record.is_child_of(caller) {
            return Err(KernelError::NotChild { caller, target });
        }
        let status = record.exit_status.ok_or_else(|| {
            KernelError::InvalidArgument(format!("process {target} has not exited"))
        })?;

        inner.records.remove(&target);
        debug!(pid = %target, parent = %caller, "reaped process");
        Ok(status)
    }

    /// Block until no user process is live; `None` waits forever
    ///
    /// Returns false if the timeout expired first.
    pub fn wait_quiescent(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock();

        while inner.live > 0 {
            match deadline {
                Some(deadline) => {
                    if self.quiescent.wait_until(&mut inner, deadline).timed_out() {
                        return inner.live == 0;
                    }
                }
                None => self.quiescent.wait(&mut inner),
            }
        }
        true
    }

    /// Processes that have not finished exiting
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.lock().live
    }

    /// Records in the table, zombies included
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records ordered by pid
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcessInfo> {
        let mut rows: Vec<_> = self
            .inner
            .lock()
            .records
            .values()
            .map(ProcessRecord::info)
            .collect();
        rows.sort_by_key(|row| row.pid);
        rows
    }

    /// True while some thread holds the table lock
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
