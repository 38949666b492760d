/*!
 * Simulated File System
 * Volatile registry of executable images
 */

use super::user::{UserEnv, UserProgram};
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::UserAddr;
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default load address of an image's entry point
pub const DEFAULT_ENTRY: UserAddr = 0x40_0000;

/// An executable file
#[derive(Clone)]
pub struct SimImage {
    pub entry: UserAddr,
    /// `None` marks a file the loader cannot parse
    pub program: Option<UserProgram>,
}

impl SimImage {
    pub fn new<F>(program: F) -> Self
    where
        F: Fn(&mut UserEnv<'_>) -> i32 + Send + Sync + 'static,
    {
        Self {
            entry: DEFAULT_ENTRY,
            program: Some(Arc::new(program)),
        }
    }

    /// A file that exists but is not a valid executable
    #[must_use]
    pub fn corrupt() -> Self {
        Self {
            entry: DEFAULT_ENTRY,
            program: None,
        }
    }

    #[must_use]
    pub fn with_entry(mut self, entry: UserAddr) -> Self {
        self.entry = entry;
        self
    }
}

impl fmt::Debug for SimImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimImage")
            .field("entry", &format_args!("{:#x}", self.entry))
            .field("valid", &self.program.is_some())
            .finish()
    }
}

/// An open executable
#[derive(Debug)]
pub struct SimVnode {
    pub path: PathBuf,
    pub image: SimImage,
}

/// In-memory file system holding executables by absolute path
#[derive(Debug, Default)]
pub struct SimFs {
    files: DashMap<PathBuf, SimImage, RandomState>,
    open_files: AtomicUsize,
}

impl SimFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize path (make absolute and clean)
    fn normalize(path: &Path) -> PathBuf {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new("/").join(path)
        };
        PathBuf::from(path_clean::clean(&path))
    }

    /// Install or replace the image at `path`
    pub fn install(&self, path: impl AsRef<Path>, image: SimImage) {
        self.files.insert(Self::normalize(path.as_ref()), image);
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.files.remove(&Self::normalize(path.as_ref())).is_some()
    }

    pub fn open(&self, path: &str) -> KernelResult<SimVnode> {
        let path = Self::normalize(Path::new(path));
        let image = self
            .files
            .get(&path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| KernelError::NotFound(path.display().to_string()))?;

        self.open_files.fetch_add(1, Ordering::SeqCst);
        Ok(SimVnode { path, image })
    }

    pub fn close(&self, vnode: SimVnode) {
        drop(vnode);
        self.open_files.fetch_sub(1, Ordering::SeqCst);
    }

    /// Files opened and not yet closed
    #[must_use]
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::SeqCst)
    }
}
