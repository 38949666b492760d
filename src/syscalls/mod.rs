/*!
 * Syscalls Module
 * Trap decoding and dispatch into the lifecycle services
 */

mod dispatch;
pub mod types;

pub use types::{numbers, Syscall};
