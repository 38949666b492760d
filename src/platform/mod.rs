/*!
 * Platform Module
 * Trap frames and the collaborator contracts the kernel is built against
 */

pub mod traits;
pub mod trapframe;

pub use traits::{
    AddressSpaces, ElfLoader, FileSystem, Platform, SpawnError, Threads, Trampoline, UserMemory,
};
pub use trapframe::{reg, TrapFrame};
