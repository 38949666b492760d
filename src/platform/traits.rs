/*!
 * Platform Traits
 * Contracts of the subsystems the lifecycle services delegate to
 */

use super::trapframe::TrapFrame;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::UserAddr;
use crate::kernel::Kernel;
use crate::process::thread::{ThreadStart, UserThread};
use std::sync::Arc;

/// Address-space creation, duplication and teardown
pub trait AddressSpaces: Send + Sync {
    type Space: Send + 'static;

    /// Empty address space with nothing mapped
    fn create(&self) -> KernelResult<Self::Space>;

    /// Full logical copy of `src`
    fn copy(&self, src: &Self::Space) -> KernelResult<Self::Space>;

    /// Release every resource held by `space`
    fn destroy(&self, space: Self::Space);

    /// Make `space` the one the current CPU translates through
    fn activate(&self, space: &Self::Space);

    /// Map the user stack and return its top (exclusive)
    fn define_stack(&self, space: &mut Self::Space) -> KernelResult<UserAddr>;
}

/// Bounded, fault-reporting copies between user and kernel memory
pub trait UserMemory: AddressSpaces {
    /// Fill `dst` from user address `src`
    fn copyin(&self, space: &Self::Space, src: UserAddr, dst: &mut [u8]) -> KernelResult<()>;

    /// Write `src` to user address `dst`
    fn copyout(&self, space: &Self::Space, src: &[u8], dst: UserAddr) -> KernelResult<()>;

    /// Copy a NUL-terminated string of at most `max` bytes, terminator included
    ///
    /// The returned bytes exclude the terminator. A string without a NUL in its
    /// first `max` bytes is [`KernelError::NameTooLong`].
    fn copyinstr(&self, space: &Self::Space, src: UserAddr, max: usize) -> KernelResult<Vec<u8>>;
}

/// Virtual file system, as far as exec needs it
pub trait FileSystem: Send + Sync {
    type Vnode: Send;

    fn open(&self, path: &str) -> KernelResult<Self::Vnode>;

    fn close(&self, vnode: Self::Vnode);
}

/// Executable loader
pub trait ElfLoader: AddressSpaces + FileSystem {
    /// Map the image behind `vnode` into `space`, returning its entry point
    fn load_elf(&self, vnode: &Self::Vnode, space: &mut Self::Space) -> KernelResult<UserAddr>;
}

/// Code a new thread runs first
pub type Trampoline<S> = Box<dyn FnOnce(ThreadStart<S>) + Send + 'static>;

/// Thread creation failure; hands the start bundle back for teardown
#[derive(Debug)]
pub struct SpawnError<S> {
    pub error: KernelError,
    pub start: ThreadStart<S>,
}

/// Kernel thread management
pub trait Threads: AddressSpaces {
    /// Create a schedulable thread that runs `trampoline(start)`
    fn spawn(
        &self,
        name: &str,
        start: ThreadStart<Self::Space>,
        trampoline: Trampoline<Self::Space>,
    ) -> Result<(), SpawnError<Self::Space>>;

    /// End the calling thread
    fn exit_thread(&self) -> !;
}

/// The complete set of collaborators a kernel runs on
pub trait Platform: UserMemory + ElfLoader + Threads + Sized + 'static {
    /// Drop to user mode with `frame` on the calling thread; never returns
    ///
    /// User code running on `thread` traps back in through
    /// [`Kernel::syscall`].
    fn enter_user(
        kernel: &Arc<Kernel<Self>>,
        thread: &mut UserThread<Self::Space>,
        frame: TrapFrame,
    ) -> !;
}
