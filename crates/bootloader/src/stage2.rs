//! Stage 2: banner, delay and kernel hand-off.
//!
//! Prints its banner through the firmware console, spins for
//! `delay_iterations` decrements, zeroes `a0`/`a1` and jumps to the kernel.
//! The hart id received from Stage 1 is not forwarded.

use assembler::{AsmError, BootImage, Program};
use types::{ArgRegister, BootLayout, HandoffArgs, Stage};
use vm::registers::Register;

pub const ENTRY: &str = "stage2_entry";
pub const CONSOLE: &str = "stage2_sbi_call";
pub const DELAY_LOOP: &str = "stage2_delay";
pub const KERNEL_JUMP: &str = "stage2_kernel_jump";
/// Unreachable fallback printing `E` forever if the kernel jump returns.
pub const ERROR_HALT: &str = "error_halt";

pub fn build(layout: &BootLayout) -> Result<BootImage, AsmError> {
    let handoff = HandoffArgs::for_kernel();
    let mut p = Program::new();

    p.label(ENTRY)?.li(Register::Sp, layout.stack_top);

    p.label(CONSOLE)?;
    for &ch in Stage::Stage2.banner() {
        p.console_putchar(ch);
    }

    p.li(Register::T0, layout.delay_iterations);
    p.label(DELAY_LOOP)?
        .addi(Register::T0, Register::T0, -1)
        .bnez(Register::T0, DELAY_LOOP);

    p.label(KERNEL_JUMP)?
        .li(ArgRegister::HartId.into(), handoff.hart_id)
        .li(ArgRegister::DeviceTree.into(), handoff.device_tree)
        .li(Register::T0, layout.entry(Stage::Kernel))
        .jr(Register::T0);

    p.label(ERROR_HALT)?.console_putchar(b'E').j(ERROR_HALT);

    p.finish(Stage::Stage2, layout.entry(Stage::Stage2))
}
