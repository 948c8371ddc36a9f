//! A small RV64I + Zicsr machine-mode hart, its bus and firmware console.
//!
//! The boot stages are executed here instead of on real hardware, so the
//! model implements exactly what they rely on: trap delivery through
//! `mtvec`, the machine interrupt CSRs, `wfi` parking and the firmware
//! console call.

pub mod console;
pub mod cpu;
pub mod csr;
pub mod decoder;
pub mod instruction;
pub mod isa;
pub mod memory;
pub mod registers;
pub mod sys_call;
pub mod trap;
pub mod vm;

pub use console::Console;
pub use cpu::{HartState, Step, CPU};
pub use csr::{CsrAccess, CsrFile};
pub use decoder::decode_full;
pub use instruction::Instruction;
pub use memory::{Bus, BusError};
pub use registers::Register;
pub use sys_call::{EcallHandler, EcallOutcome, FirmwareConsole};
pub use trap::Trap;
pub use vm::{NoTrace, RunOutcome, Tracer, VM};
