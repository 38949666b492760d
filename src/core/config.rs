/*!
 * Kernel Configuration
 * Boot-time tunables with defaults from `core::limits`
 */

use super::errors::{KernelError, KernelResult};
use super::limits;
use super::types::{align_up, USER_PTR_SIZE};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tunable limits for the process lifecycle services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KernelConfig {
    /// First pid handed to a user process
    pub pid_min: u32,
    /// Last pid handed to a user process
    pub pid_max: u32,
    /// Cap on records in the process table, zombies included
    pub max_processes: usize,
    /// Maximum argument vector length for exec
    pub max_args: usize,
    /// Maximum total bytes of argument strings for exec
    pub arg_max: usize,
    /// Maximum executable path length
    pub path_max: usize,
    /// Pages reserved for a fresh user stack
    pub user_stack_pages: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pid_min: limits::PID_MIN,
            pid_max: limits::PID_MAX,
            max_processes: limits::DEFAULT_MAX_PROCESSES,
            max_args: limits::MAX_ARGS,
            arg_max: limits::ARG_MAX,
            path_max: limits::PATH_MAX,
            user_stack_pages: limits::USER_STACK_PAGES,
        }
    }
}

impl KernelConfig {
    #[inline]
    #[must_use]
    pub fn with_pid_range(mut self, pid_min: u32, pid_max: u32) -> Self {
        self.pid_min = pid_min;
        self.pid_max = pid_max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_arg_max(mut self, arg_max: usize) -> Self {
        self.arg_max = arg_max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_path_max(mut self, path_max: usize) -> Self {
        self.path_max = path_max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_user_stack_pages(mut self, pages: usize) -> Self {
        self.user_stack_pages = pages;
        self
    }

    /// Build a configuration from defaults overridden by environment variables
    ///
    /// Environment variables:
    /// - KERNEL_PID_MAX: highest pid handed out
    /// - KERNEL_MAX_PROCESSES: process table capacity
    /// - KERNEL_MAX_ARGS: exec argument count limit
    /// - KERNEL_ARG_MAX: exec argument byte limit
    /// - KERNEL_PATH_MAX: exec path length limit
    /// - KERNEL_USER_STACK_PAGES: pages mapped for a new user stack
    pub fn from_env() -> KernelResult<Self> {
        let mut config = Self::default();

        if let Some(v) = env_value("KERNEL_PID_MAX")? {
            config.pid_max = v;
        }
        if let Some(v) = env_value("KERNEL_MAX_PROCESSES")? {
            config.max_processes = v;
        }
        if let Some(v) = env_value("KERNEL_MAX_ARGS")? {
            config.max_args = v;
        }
        if let Some(v) = env_value("KERNEL_ARG_MAX")? {
            config.arg_max = v;
        }
        if let Some(v) = env_value("KERNEL_PATH_MAX")? {
            config.path_max = v;
        }
        if let Some(v) = env_value("KERNEL_USER_STACK_PAGES")? {
            config.user_stack_pages = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the services cannot honour
    pub fn validate(&self) -> KernelResult<()> {
        if self.pid_min <= crate::core::types::Pid::KERNEL.as_u32() {
            return Err(KernelError::Configuration(format!(
                "pid_min must be above the kernel pid, got {}",
                self.pid_min
            )));
        }
        if self.pid_max < self.pid_min {
            return Err(KernelError::Configuration(format!(
                "empty pid range {}..={}",
                self.pid_min, self.pid_max
            )));
        }
        if self.pid_max > i32::MAX as u32 {
            return Err(KernelError::Configuration(format!(
                "pid_max {} does not fit a signed pid",
                self.pid_max
            )));
        }
        if self.max_processes == 0 {
            return Err(KernelError::Configuration(
                "max_processes must be positive".into(),
            ));
        }
        if self.path_max < 2 || self.arg_max == 0 || self.max_args == 0 {
            return Err(KernelError::Configuration(
                "exec limits must leave room for at least one argument".into(),
            ));
        }
        if self.user_stack_pages * limits::PAGE_SIZE < self.argument_block_max() {
            return Err(KernelError::Configuration(format!(
                "{} stack pages cannot hold a {} byte argument block",
                self.user_stack_pages,
                self.argument_block_max()
            )));
        }
        Ok(())
    }

    /// Largest initial argument block exec can build: padded strings plus
    /// `max_args` pointers and the terminating null
    #[must_use]
    pub fn argument_block_max(&self) -> usize {
        align_up(self.arg_max, limits::STACK_ALIGN)
            + align_up((self.max_args + 1) * USER_PTR_SIZE, limits::STACK_ALIGN)
    }
}

fn env_value<T: FromStr>(key: &str) -> KernelResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KernelError::Configuration(format!("{key}: cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}
