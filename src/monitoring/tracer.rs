/*!
 * Tracing
 * Structured tracing for syscalls using the tracing crate
 *
 * Features:
 * - Per-syscall spans with a correlation id
 * - JSON-formatted logs for structured parsing
 * - Slow-call warnings
 */

use crate::core::errors::KernelResult;
use crate::core::types::Pid;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Calls slower than this are reported at warn level
pub const SLOW_SYSCALL: Duration = Duration::from_millis(10);

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Next syscall correlation id
pub fn next_trace_id() -> u64 {
    NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Span covering one returning syscall
pub struct SyscallSpan {
    span: Span,
    start: Instant,
    syscall: &'static str,
    trace_id: u64,
}

impl SyscallSpan {
    pub fn new(syscall: &'static str, pid: Pid) -> Self {
        let trace_id = next_trace_id();

        let span = span!(
            Level::DEBUG,
            "syscall",
            trace_id,
            syscall,
            pid = pid.as_u32(),
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            errno = tracing::field::Empty,
        );
        debug!(parent: &span, syscall, pid = %pid, "syscall started");

        Self {
            span,
            start: Instant::now(),
            syscall,
            trace_id,
        }
    }

    #[must_use]
    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Record the outcome on the span
    pub fn record_result(&self, result: &KernelResult<u64>) {
        match result {
            Ok(value) => {
                self.span.record("result", *value);
            }
            Err(e) => {
                self.span.record("result", "error");
                self.span.record("errno", e.errno().code());
            }
        }
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_SYSCALL {
            warn!(
                parent: &self.span,
                trace_id = self.trace_id,
                syscall = self.syscall,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow syscall detected"
            );
        } else {
            debug!(
                parent: &self.span,
                trace_id = self.trace_id,
                syscall = self.syscall,
                duration_us = duration.as_micros() as u64,
                "syscall completed"
            );
        }
    }
}
