use types::Stage;
use vm::{Console, VM};

use crate::{BootChain, LaunchConfig, LaunchError};

/// Bus region names.
pub const ROM: &str = "firmware";
pub const DRAM: &str = "dram";

/// Builds the machine the chain runs on: the firmware window and DRAM are
/// mapped, every image is placed at its load address and the hart is left
/// at the reset vector.
pub fn boot_machine(chain: &BootChain, config: &LaunchConfig) -> Result<VM, LaunchError> {
    let layout = chain.layout();
    let mut vm = VM::new(Console::with_echo(config.echo_console));
    vm.map(ROM, layout.firmware.base, layout.firmware.size)?;
    vm.map(DRAM, layout.dram.base, layout.dram.size)?;

    for image in chain.images() {
        vm.load_image(image.base, image.to_flat_binary())?;
    }

    vm.set_hart_id(config.hart_id);
    vm.cpu.verbose = config.verbose;
    vm.set_pc(layout.entry(Stage::Firmware));
    log::info!(
        "machine ready: hart {} at {:#x}, {} images",
        config.hart_id,
        vm.cpu.pc,
        chain.images().len()
    );
    Ok(vm)
}
