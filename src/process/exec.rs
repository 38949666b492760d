/*!
 * Image Replacement
 *
 * `execv` copies the path and argument vector out of the caller's space,
 * builds the complete new image in a fresh address space and only then
 * switches to it. Every failure before the switch leaves the caller running
 * its old image with an error in `v0`.
 */

use super::argv::ArgvLayout;
use super::thread::UserThread;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{UserAddr, USER_NULL, USER_PTR_SIZE};
use crate::kernel::{program_name, Kernel, PreparedImage};
use crate::platform::{AddressSpaces, ElfLoader, FileSystem, Platform, UserMemory};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl<P: Platform> Kernel<P> {
    /// Replace the image of the process running on `thread`
    ///
    /// `path` points at a NUL-terminated string and `argv` at a NULL-terminated
    /// array of string pointers, both in the caller's space. Only returns on
    /// failure.
    pub fn execv(
        self: &Arc<Self>,
        thread: &mut UserThread<P::Space>,
        path: UserAddr,
        argv: UserAddr,
    ) -> KernelResult<Infallible> {
        let pid = thread.pid();

        let (path, args) = {
            let space = thread.active_space();
            let path = self.copyin_path(space, path)?;
            let args = self.copyin_args(space, argv)?;
            (path, args)
        };
        debug!(pid = %pid, path = %path, argc = args.len(), "exec arguments copied in");

        let image = self.prepare_image(&path, &args).map_err(|e| {
            warn!(pid = %pid, path = %path, error = %e, "exec failed, keeping current image");
            e
        })?;
        let frame = image.entry_frame();

        let old = thread.replace_space(image.space);
        self.platform.activate(thread.active_space());
        if let Some(old) = old {
            self.platform.destroy(old);
        }

        let name = program_name(&path);
        self.table.rename(pid, &name);
        thread.set_name(name);

        info!(pid = %pid, path = %path, argc = image.argc, entry = image.entry, "exec");
        P::enter_user(self, thread, frame)
    }

    /// Load `path` into a new address space with `args` on its stack
    ///
    /// The space is destroyed again if any step fails, so the caller never
    /// sees a half-built image.
    pub(crate) fn prepare_image<A: AsRef<[u8]>>(
        &self,
        path: &str,
        args: &[A],
    ) -> KernelResult<PreparedImage<P::Space>> {
        self.check_arg_limits(args)?;

        let vnode = self.platform.open(path)?;
        let mut space = match self.platform.create() {
            Ok(space) => space,
            Err(e) => {
                self.platform.close(vnode);
                return Err(e);
            }
        };

        let loaded = self.load_image(&vnode, &mut space, args);
        self.platform.close(vnode);

        match loaded {
            Ok((entry, layout)) => Ok(PreparedImage {
                space,
                entry,
                argc: layout.argc(),
                stack_pointer: layout.stack_pointer(),
            }),
            Err(e) => {
                self.platform.destroy(space);
                Err(e)
            }
        }
    }

    fn load_image<A: AsRef<[u8]>>(
        &self,
        vnode: &P::Vnode,
        space: &mut P::Space,
        args: &[A],
    ) -> KernelResult<(UserAddr, ArgvLayout)> {
        let entry = self.platform.load_elf(vnode, space)?;
        let stack_top = self.platform.define_stack(space)?;

        let layout = ArgvLayout::build(args, stack_top)?;
        self.platform
            .copyout(space, &layout.strings, layout.strings_base)?;
        self.platform
            .copyout(space, &layout.pointer_bytes(), layout.argv_base)?;

        Ok((entry, layout))
    }

    fn check_arg_limits<A: AsRef<[u8]>>(&self, args: &[A]) -> KernelResult<()> {
        if args.len() > self.config.max_args {
            return Err(KernelError::ArgListTooLong(format!(
                "{} arguments, limit is {}",
                args.len(),
                self.config.max_args
            )));
        }
        let total: usize = args.iter().map(|a| a.as_ref().len() + 1).sum();
        if total > self.config.arg_max {
            return Err(KernelError::ArgListTooLong(format!(
                "{total} bytes of arguments, limit is {}",
                self.config.arg_max
            )));
        }
        Ok(())
    }

    fn copyin_path(&self, space: &P::Space, path: UserAddr) -> KernelResult<String> {
        if path == USER_NULL {
            return Err(KernelError::BadAddress(path));
        }
        let bytes = self.platform.copyinstr(space, path, self.config.path_max)?;
        if bytes.is_empty() {
            return Err(KernelError::InvalidArgument("empty executable path".into()));
        }
        String::from_utf8(bytes)
            .map_err(|_| KernelError::InvalidArgument("executable path is not UTF-8".into()))
    }

    /// Copy the argument vector, bounded by `max_args` entries and `arg_max` bytes
    fn copyin_args(&self, space: &P::Space, argv: UserAddr) -> KernelResult<Vec<Vec<u8>>> {
        if argv == USER_NULL {
            return Err(KernelError::BadAddress(argv));
        }

        let mut args = Vec::new();
        let mut total = 0usize;
        let mut slot = argv;
        loop {
            let mut raw = [0u8; USER_PTR_SIZE];
            self.platform.copyin(space, slot, &mut raw)?;
            let ptr = UserAddr::from_le_bytes(raw);
            if ptr == USER_NULL {
                return Ok(args);
            }

            if args.len() == self.config.max_args {
                return Err(KernelError::ArgListTooLong(format!(
                    "more than {} arguments",
                    self.config.max_args
                )));
            }
            let remaining = self.config.arg_max - total;
            if remaining == 0 {
                return Err(KernelError::ArgListTooLong(format!(
                    "arguments exceed {} bytes",
                    self.config.arg_max
                )));
            }

            let arg = self
                .platform
                .copyinstr(space, ptr, remaining)
                .map_err(|e| match e {
                    KernelError::NameTooLong { .. } => KernelError::ArgListTooLong(format!(
                        "arguments exceed {} bytes",
                        self.config.arg_max
                    )),
                    other => other,
                })?;
            total += arg.len() + 1;
            args.push(arg);

            slot = slot
                .checked_add(USER_PTR_SIZE as u64)
                .ok_or(KernelError::BadAddress(slot))?;
        }
    }
}
