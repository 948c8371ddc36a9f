//! Reset-vector firmware.
//!
//! Runs first after power-on. It installs the one and only trap handler,
//! a terminal `j .` sink, so that any fault later in the chain parks the
//! hart at a known address instead of jumping into undefined memory.

use assembler::{AsmError, BootImage, Program};
use types::{csr, BootLayout, Stage};
use vm::registers::Register;

use crate::START_SYMBOL;

pub const TRAP_HANDLER: &str = "trap_handler";

pub fn build(layout: &BootLayout) -> Result<BootImage, AsmError> {
    let mut p = Program::new();

    p.label(START_SYMBOL)?
        .la(Register::T0, TRAP_HANDLER)
        .csrw(csr::MTVEC, Register::T0)
        .csrw(csr::SATP, Register::Zero)
        .li(Register::Sp, layout.stack_top)
        .li(Register::T0, layout.entry(Stage::Stage1))
        .jr(Register::T0);

    // mtvec direct mode needs a 4-byte aligned base.
    p.align(4);
    p.label(TRAP_HANDLER)?.j(TRAP_HANDLER);

    p.finish(Stage::Firmware, layout.entry(Stage::Firmware))
}
