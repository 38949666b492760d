/*!
 * Process Lifecycle Kernel - Main Entry Point
 *
 * Boots a simulated machine with a small base system, runs init to
 * completion and prints the final process table.
 */

use miette::{IntoDiagnostic, Result};
use proc_kernel::sim::programs::{self, INIT};
use proc_kernel::{init_tracing, Kernel, KernelConfig, SimPlatform};
use tracing::info;

fn main() -> Result<()> {
    // Initialize structured tracing
    init_tracing();

    info!("Process lifecycle kernel starting...");
    let config = KernelConfig::from_env()?;

    info!("Initializing simulated platform...");
    let platform = SimPlatform::new().with_stack_pages(config.user_stack_pages);
    programs::install_base_system(&platform);

    let kernel = Kernel::new(platform, config)?;

    info!(path = INIT, "Starting init");
    let init = kernel.spawn_program(INIT, &[INIT])?;
    let status = kernel.wait_child(init)?;
    info!(pid = %init, status = ?status, "init exited");

    kernel.wait_quiescent(None);
    kernel.platform().threads().join_all();

    let memory = kernel.platform().memory();
    info!(
        used_pages = memory.used_pages(),
        live_spaces = memory.live_spaces(),
        "Kernel halted"
    );

    let table = serde_json::to_string_pretty(&kernel.processes()).into_diagnostic()?;
    println!("{table}");
    Ok(())
}
