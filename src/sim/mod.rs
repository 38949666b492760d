/*!
 * Simulated Platform
 *
 * Host-backed implementations of every collaborator the lifecycle services
 * need: paged address spaces, an executable registry, a loader, host threads
 * and a mode switch that runs user programs written as Rust closures.
 */

mod fs;
mod memory;
pub mod programs;
mod threads;
mod user;

pub use fs::{SimFs, SimImage, SimVnode, DEFAULT_ENTRY};
pub use memory::{SimMemory, SimSpace, HEAP_BASE, HEAP_PAGES};
pub use threads::SimThreads;
pub use user::{SysResult, UserEnv, UserProgram};

use crate::core::errors::{KernelError, KernelResult};
use crate::core::limits::{PAGE_SIZE, USER_STACK_PAGES, USER_STACK_TOP};
use crate::core::types::UserAddr;
use crate::kernel::Kernel;
use crate::platform::{
    AddressSpaces, ElfLoader, FileSystem, Platform, SpawnError, Threads, Trampoline, TrapFrame,
    UserMemory,
};
use crate::process::thread::{ThreadStart, UserThread};
use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default physical memory, in pages
pub const DEFAULT_MEMORY_PAGES: usize = 16 * 1024;

thread_local! {
    static ACTIVE_SPACE: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Id of the space last activated on the calling thread
#[must_use]
pub fn active_space_id() -> Option<u64> {
    ACTIVE_SPACE.with(Cell::get)
}

/// A complete simulated machine
#[derive(Debug)]
pub struct SimPlatform {
    memory: Arc<SimMemory>,
    fs: SimFs,
    threads: SimThreads,
    stack_pages: usize,
    activations: AtomicUsize,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::with_memory(DEFAULT_MEMORY_PAGES)
    }

    /// Machine with `pages` pages of physical memory
    #[must_use]
    pub fn with_memory(pages: usize) -> Self {
        Self {
            memory: SimMemory::new(pages),
            fs: SimFs::new(),
            threads: SimThreads::default(),
            stack_pages: USER_STACK_PAGES,
            activations: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_stack_pages(mut self, pages: usize) -> Self {
        self.stack_pages = pages;
        self
    }

    /// Install an executable
    pub fn install(&self, path: impl AsRef<Path>, image: SimImage) {
        self.fs.install(path, image);
    }

    /// Install a program at the default entry point
    pub fn install_program<F>(&self, path: impl AsRef<Path>, program: F)
    where
        F: Fn(&mut UserEnv<'_>) -> i32 + Send + Sync + 'static,
    {
        self.fs.install(path, SimImage::new(program));
    }

    #[must_use]
    pub fn memory(&self) -> &Arc<SimMemory> {
        &self.memory
    }

    #[must_use]
    pub fn fs(&self) -> &SimFs {
        &self.fs
    }

    #[must_use]
    pub fn threads(&self) -> &SimThreads {
        &self.threads
    }

    /// Number of address-space switches performed
    #[must_use]
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }
}

impl AddressSpaces for SimPlatform {
    type Space = SimSpace;

    fn create(&self) -> KernelResult<SimSpace> {
        SimSpace::new(&self.memory)
    }

    fn copy(&self, src: &SimSpace) -> KernelResult<SimSpace> {
        src.duplicate()
    }

    fn destroy(&self, space: SimSpace) {
        drop(space);
    }

    fn activate(&self, space: &SimSpace) {
        ACTIVE_SPACE.with(|active| active.set(Some(space.id())));
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn define_stack(&self, space: &mut SimSpace) -> KernelResult<UserAddr> {
        let size = (self.stack_pages * PAGE_SIZE) as u64;
        space.map(USER_STACK_TOP - size, self.stack_pages)?;
        Ok(USER_STACK_TOP)
    }
}

impl UserMemory for SimPlatform {
    fn copyin(&self, space: &SimSpace, src: UserAddr, dst: &mut [u8]) -> KernelResult<()> {
        space.read(src, dst)
    }

    fn copyout(&self, space: &SimSpace, src: &[u8], dst: UserAddr) -> KernelResult<()> {
        space.write(dst, src)
    }

    fn copyinstr(&self, space: &SimSpace, src: UserAddr, max: usize) -> KernelResult<Vec<u8>> {
        space.read_cstr(src, max)
    }
}

impl FileSystem for SimPlatform {
    type Vnode = SimVnode;

    fn open(&self, path: &str) -> KernelResult<SimVnode> {
        self.fs.open(path)
    }

    fn close(&self, vnode: SimVnode) {
        self.fs.close(vnode);
    }
}

impl ElfLoader for SimPlatform {
    fn load_elf(&self, vnode: &SimVnode, space: &mut SimSpace) -> KernelResult<UserAddr> {
        let program = vnode
            .image
            .program
            .clone()
            .ok_or_else(|| KernelError::NotExecutable(vnode.path.display().to_string()))?;

        let entry = vnode.image.entry;
        let page = entry - entry % PAGE_SIZE as u64;
        space.map(page, 1)?;
        space.bind(entry, program);
        Ok(entry)
    }
}

impl Threads for SimPlatform {
    fn spawn(
        &self,
        name: &str,
        start: ThreadStart<SimSpace>,
        trampoline: Trampoline<SimSpace>,
    ) -> Result<(), SpawnError<SimSpace>> {
        self.threads.spawn(name, start, trampoline)
    }

    fn exit_thread(&self) -> ! {
        self.threads.exit_thread()
    }
}

impl Platform for SimPlatform {
    fn enter_user(
        kernel: &Arc<Kernel<Self>>,
        thread: &mut UserThread<SimSpace>,
        frame: TrapFrame,
    ) -> ! {
        user::enter_user(kernel, thread, frame)
    }
}
