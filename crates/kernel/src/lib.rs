//! The placeholder kernel at the end of the boot chain.
//!
//! Receives control from Stage 2 with `a0 = a1 = 0`, reloads the stack,
//! announces itself on the firmware console, arms the machine external and
//! timer interrupts, opens the global interrupt gate and parks in a `wfi`
//! loop. It installs no trap handler of its own: any interrupt it takes
//! lands in the firmware sink.

use assembler::{AsmError, BootImage, Program};
use types::csr::{self, InterruptBits, Mstatus};
use types::{BootLayout, Stage};
use vm::registers::Register;

pub const ENTRY: &str = "kernel_entry";
pub const IDLE: &str = "kernel_idle";

pub fn build(layout: &BootLayout) -> Result<BootImage, AsmError> {
    let mut p = Program::new();

    p.label(ENTRY)?.li(Register::Sp, layout.stack_top);
    for &ch in Stage::Kernel.banner() {
        p.console_putchar(ch);
    }

    // Arm the sources before opening the global gate.
    p.li(Register::T0, InterruptBits::KERNEL_SOURCES.bits())
        .csrs(csr::MIE, Register::T0)
        .li(Register::T0, Mstatus::MIE.bits())
        .csrs(csr::MSTATUS, Register::T0);

    p.label(IDLE)?.wfi().j(IDLE);

    p.finish(Stage::Kernel, layout.entry(Stage::Kernel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm::{Console, RunOutcome, VM};

    fn boot_kernel() -> (VM, BootImage) {
        let layout = BootLayout::DEFAULT;
        let image = build(&layout).unwrap();
        let mut vm = VM::new(Console::new());
        vm.map("dram", layout.dram.base, layout.dram.size).unwrap();
        vm.load_image(image.base, image.to_flat_binary()).unwrap();
        vm.set_pc(image.entry());
        (vm, image)
    }

    #[test]
    fn prints_banner_and_idles_with_interrupts_armed() {
        let (mut vm, image) = boot_kernel();
        let outcome = vm.run(1_000);
        assert_eq!(outcome, RunOutcome::Idle { pc: image.symbol(IDLE).unwrap() + 4 });
        assert_eq!(vm.console.as_string(), "K");
        assert_eq!(vm.cpu.csrs.mie(), 0x880);
        assert!(vm.cpu.csrs.interrupts_enabled());
        assert_eq!(vm.cpu.regs[2], BootLayout::DEFAULT.stack_top);
    }

    #[test]
    fn entry_symbol_is_load_address() {
        let image = build(&BootLayout::DEFAULT).unwrap();
        assert_eq!(image.symbol(ENTRY), Some(0x8020_0000));
    }
}
