/*!
 * User Threads
 * Kernel-side state of the single thread running a user process
 */

use crate::core::types::Pid;
use crate::platform::TrapFrame;

/// The running thread of a user process
///
/// Owns the process's address space. The process table only holds metadata,
/// so the space travels with the thread: fork hands a copy to the child's
/// thread, exec swaps it, exit destroys it.
#[derive(Debug)]
pub struct UserThread<S> {
    pid: Pid,
    name: String,
    space: Option<S>,
}

impl<S> UserThread<S> {
    #[must_use]
    pub fn new(pid: Pid, name: impl Into<String>, space: Option<S>) -> Self {
        Self {
            pid,
            name: name.into(),
            space,
        }
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    #[must_use]
    pub fn space(&self) -> Option<&S> {
        self.space.as_ref()
    }

    /// Space of a running process, which always has one
    ///
    /// Panics if the space is missing: only exit takes it away, and nothing
    /// runs on the thread after that.
    #[must_use]
    pub fn active_space(&self) -> &S {
        match self.space.as_ref() {
            Some(space) => space,
            None => panic!("process {} has no address space", self.pid),
        }
    }

    #[inline]
    #[must_use]
    pub fn space_mut(&mut self) -> Option<&mut S> {
        self.space.as_mut()
    }

    /// Install `space`, handing back the one it replaces
    pub fn replace_space(&mut self, space: S) -> Option<S> {
        self.space.replace(space)
    }

    /// Detach the address space from the thread
    pub fn take_space(&mut self) -> Option<S> {
        self.space.take()
    }
}

/// Everything a new thread needs before it can drop to user mode
#[derive(Debug)]
pub struct ThreadStart<S> {
    pub thread: UserThread<S>,
    pub frame: TrapFrame,
}
