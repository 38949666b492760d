/*!
 * Argument Block Layout
 *
 * Pure computation of the initial user stack for a new image. Nothing here
 * touches an address space; exec writes the result out through the
 * copy-out collaborator.
 *
 * ```text
 *   stack_top  ┌──────────────────────────────┐
 *              │ "prog\0a\0bb\0" + padding    │  string region (8-byte multiple)
 * strings_base ├──────────────────────────────┤
 *              │ argv[0] .. argv[n-1], NULL   │  pointer region
 *   argv_base  └──────────────────────────────┘  = initial stack pointer
 * ```
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::limits::STACK_ALIGN;
use crate::core::types::{align_up, UserAddr, USER_NULL, USER_PTR_SIZE};

/// Byte image of the argument block and where it lands in user memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgvLayout {
    /// All strings back to back, NUL-terminated, zero-padded to alignment
    pub strings: Vec<u8>,
    /// One user pointer per argument followed by a null pointer
    pub pointers: Vec<UserAddr>,
    pub strings_base: UserAddr,
    pub argv_base: UserAddr,
}

impl ArgvLayout {
    /// Lay out `args` directly below `stack_top`
    pub fn build<A: AsRef<[u8]>>(args: &[A], stack_top: UserAddr) -> KernelResult<Self> {
        if stack_top % STACK_ALIGN as u64 != 0 {
            return Err(KernelError::InvalidArgument(format!(
                "stack top {stack_top:#x} is not {STACK_ALIGN}-byte aligned"
            )));
        }

        let raw_len: usize = args.iter().map(|a| a.as_ref().len() + 1).sum();
        let strings_len = align_up(raw_len, STACK_ALIGN);
        let pointers_len = align_up((args.len() + 1) * USER_PTR_SIZE, STACK_ALIGN);

        let total = (strings_len + pointers_len) as u64;
        if total > stack_top {
            return Err(KernelError::ArgListTooLong(format!(
                "{total} bytes of arguments do not fit below {stack_top:#x}"
            )));
        }

        let strings_base = stack_top - strings_len as u64;
        let argv_base = strings_base - pointers_len as u64;

        let mut strings = Vec::with_capacity(strings_len);
        let mut pointers = Vec::with_capacity(args.len() + 1);
        for arg in args {
            let bytes = arg.as_ref();
            if bytes.contains(&0) {
                return Err(KernelError::InvalidArgument(
                    "argument contains an interior NUL".into(),
                ));
            }
            pointers.push(strings_base + strings.len() as u64);
            strings.extend_from_slice(bytes);
            strings.push(0);
        }
        strings.resize(strings_len, 0);
        pointers.push(USER_NULL);

        Ok(Self {
            strings,
            pointers,
            strings_base,
            argv_base,
        })
    }

    /// Number of arguments, excluding the trailing null
    #[inline]
    #[must_use]
    pub fn argc(&self) -> usize {
        self.pointers.len() - 1
    }

    /// Stack pointer handed to user mode
    #[inline]
    #[must_use]
    pub const fn stack_pointer(&self) -> UserAddr {
        self.argv_base
    }

    /// Pointer region as it appears in user memory
    #[must_use]
    pub fn pointer_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self
            .pointers
            .iter()
            .flat_map(|p| p.to_le_bytes())
            .collect();
        bytes.resize((self.strings_base - self.argv_base) as usize, 0);
        bytes
    }
}
