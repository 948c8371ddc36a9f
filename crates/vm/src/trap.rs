use std::fmt;

use types::trap::{exception, interrupt, MCAUSE_INTERRUPT};

/// A synchronous exception or an asynchronous interrupt taken by the hart.
///
/// Each variant carries the value that ends up in `mtval`: the faulting
/// address for fetch/load/store problems, the instruction word for illegal
/// instructions, the pc for breakpoints and zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    InstructionAddressMisaligned(u64),
    InstructionAccessFault(u64),
    IllegalInstruction(u64),
    Breakpoint(u64),
    LoadAddressMisaligned(u64),
    LoadAccessFault(u64),
    StoreAddressMisaligned(u64),
    StoreAccessFault(u64),
    /// `ecall` that the platform did not service.
    EcallFromMachine,
    /// Interrupt with its `mip` bit position as code.
    Interrupt(u64),
}

impl Trap {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Trap::Interrupt(_))
    }

    /// Exception or interrupt code without the interrupt bit.
    pub fn code(&self) -> u64 {
        match *self {
            Trap::InstructionAddressMisaligned(_) => exception::INSTRUCTION_ADDRESS_MISALIGNED,
            Trap::InstructionAccessFault(_) => exception::INSTRUCTION_ACCESS_FAULT,
            Trap::IllegalInstruction(_) => exception::ILLEGAL_INSTRUCTION,
            Trap::Breakpoint(_) => exception::BREAKPOINT,
            Trap::LoadAddressMisaligned(_) => exception::LOAD_ADDRESS_MISALIGNED,
            Trap::LoadAccessFault(_) => exception::LOAD_ACCESS_FAULT,
            Trap::StoreAddressMisaligned(_) => exception::STORE_ADDRESS_MISALIGNED,
            Trap::StoreAccessFault(_) => exception::STORE_ACCESS_FAULT,
            Trap::EcallFromMachine => exception::ECALL_FROM_M,
            Trap::Interrupt(code) => code,
        }
    }

    /// Value written to `mcause`.
    pub fn cause(&self) -> u64 {
        if self.is_interrupt() {
            MCAUSE_INTERRUPT | self.code()
        } else {
            self.code()
        }
    }

    /// Value written to `mtval`.
    pub fn tval(&self) -> u64 {
        match *self {
            Trap::InstructionAddressMisaligned(v)
            | Trap::InstructionAccessFault(v)
            | Trap::IllegalInstruction(v)
            | Trap::Breakpoint(v)
            | Trap::LoadAddressMisaligned(v)
            | Trap::LoadAccessFault(v)
            | Trap::StoreAddressMisaligned(v)
            | Trap::StoreAccessFault(v) => v,
            Trap::EcallFromMachine | Trap::Interrupt(_) => 0,
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Trap::InstructionAddressMisaligned(a) => write!(f, "instruction address misaligned ({a:#x})"),
            Trap::InstructionAccessFault(a) => write!(f, "instruction access fault ({a:#x})"),
            Trap::IllegalInstruction(w) => write!(f, "illegal instruction ({w:#010x})"),
            Trap::Breakpoint(pc) => write!(f, "breakpoint ({pc:#x})"),
            Trap::LoadAddressMisaligned(a) => write!(f, "load address misaligned ({a:#x})"),
            Trap::LoadAccessFault(a) => write!(f, "load access fault ({a:#x})"),
            Trap::StoreAddressMisaligned(a) => write!(f, "store address misaligned ({a:#x})"),
            Trap::StoreAccessFault(a) => write!(f, "store access fault ({a:#x})"),
            Trap::EcallFromMachine => write!(f, "environment call from M-mode"),
            Trap::Interrupt(interrupt::MACHINE_SOFTWARE) => write!(f, "machine software interrupt"),
            Trap::Interrupt(interrupt::MACHINE_TIMER) => write!(f, "machine timer interrupt"),
            Trap::Interrupt(interrupt::MACHINE_EXTERNAL) => write!(f, "machine external interrupt"),
            Trap::Interrupt(code) => write!(f, "interrupt {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_cause_has_top_bit() {
        assert_eq!(Trap::Interrupt(interrupt::MACHINE_TIMER).cause(), (1 << 63) | 7);
        assert_eq!(Trap::EcallFromMachine.cause(), 11);
        assert_eq!(Trap::LoadAccessFault(0x10).tval(), 0x10);
    }
}
