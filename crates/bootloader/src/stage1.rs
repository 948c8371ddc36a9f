//! Stage 1: minimal environment setup.
//!
//! Leaves the hart with a known stack, interrupts masked, and the hand-off
//! registers loaded (`a0` = hart id read from `mhartid`, `a1` = no device
//! tree) before jumping to Stage 2.

use assembler::{AsmError, BootImage, Program};
use types::csr::{self, Mstatus};
use types::{ArgRegister, BootLayout, HandoffArgs, Stage};
use vm::registers::Register;

pub const ENTRY: &str = "stage1_entry";

pub fn build(layout: &BootLayout) -> Result<BootImage, AsmError> {
    // The hart id is only known at run time; it comes from mhartid.
    let handoff = HandoffArgs::from_stage1(0);
    let mut p = Program::new();
    p.label(ENTRY)?
        .li(Register::Sp, layout.stack_top)
        .csrci(csr::MSTATUS, Mstatus::MIE.bits() as u8)
        .csrr(ArgRegister::HartId.into(), csr::MHARTID)
        .li(ArgRegister::DeviceTree.into(), handoff.device_tree)
        .li(Register::T0, layout.entry(Stage::Stage2))
        .jr(Register::T0);

    p.finish(Stage::Stage1, layout.entry(Stage::Stage1))
}
