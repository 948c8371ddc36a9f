//! Host side of the boot chain: assembles the four stage images, stores and
//! reloads them, places them in the machine model and reports what a boot
//! did.

pub mod chain;
pub use chain::BootChain;

pub mod config;
pub use config::{LaunchConfig, DEFAULT_MAX_STEPS};

pub mod error;
pub use error::LaunchError;

pub mod loader;
pub use loader::boot_machine;

pub mod report;
pub use report::BootReport;

pub mod trace;
pub use trace::BootTrace;

use vm::{RunOutcome, VM};

/// Runs a prepared machine under a [`BootTrace`] and summarises the result.
pub fn run_chain(chain: &BootChain, vm: &mut VM, config: &LaunchConfig) -> (RunOutcome, BootReport) {
    let mut trace = BootTrace::new(*chain.layout(), &vm.cpu);
    let outcome = vm.run_traced(config.max_steps, &mut trace);
    let report = BootReport::new(chain, vm, outcome, &trace, config);
    (outcome, report)
}
