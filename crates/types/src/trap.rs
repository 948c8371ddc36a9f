//! Trap causes and the single global trap sink.
//!
//! The chain installs exactly one trap handler, in the firmware, and never
//! replaces it. [`TrapSink`] records that lifecycle: it starts
//! `Uninitialized`, moves to `ActiveSink` once, and has no way back.

use core::fmt;

/// Synchronous exception codes (`mcause` with the interrupt bit clear).
pub mod exception {
    pub const INSTRUCTION_ADDRESS_MISALIGNED: u64 = 0;
    pub const INSTRUCTION_ACCESS_FAULT: u64 = 1;
    pub const ILLEGAL_INSTRUCTION: u64 = 2;
    pub const BREAKPOINT: u64 = 3;
    pub const LOAD_ADDRESS_MISALIGNED: u64 = 4;
    pub const LOAD_ACCESS_FAULT: u64 = 5;
    pub const STORE_ADDRESS_MISALIGNED: u64 = 6;
    pub const STORE_ACCESS_FAULT: u64 = 7;
    pub const ECALL_FROM_M: u64 = 11;
}

/// Interrupt codes (`mcause` with the interrupt bit set).
pub mod interrupt {
    pub const MACHINE_SOFTWARE: u64 = 3;
    pub const MACHINE_TIMER: u64 = 7;
    pub const MACHINE_EXTERNAL: u64 = 11;
}

/// Top bit of `mcause` marks interrupts.
pub const MCAUSE_INTERRUPT: u64 = 1 << 63;

/// Lifecycle of the global trap handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrapSink {
    /// No trap vector installed yet: a trap here lands somewhere undefined.
    #[default]
    Uninitialized,
    /// The terminal handler at `vector` is installed.
    ActiveSink { vector: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapSinkError {
    /// A second installation was attempted.
    AlreadyInstalled { current: u64, attempted: u64 },
    /// The vector is not 4-byte aligned (direct mode requires it).
    MisalignedVector(u64),
}

impl fmt::Display for TrapSinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapSinkError::AlreadyInstalled { current, attempted } => write!(
                f,
                "trap sink already installed at {current:#x}, refusing {attempted:#x}"
            ),
            TrapSinkError::MisalignedVector(v) => write!(f, "trap vector {v:#x} is not 4-byte aligned"),
        }
    }
}

impl core::error::Error for TrapSinkError {}

impl TrapSink {
    /// Installs the sink. Only valid from `Uninitialized`.
    pub fn install(&mut self, vector: u64) -> Result<(), TrapSinkError> {
        if vector & 0b11 != 0 {
            return Err(TrapSinkError::MisalignedVector(vector));
        }
        match *self {
            TrapSink::Uninitialized => {
                *self = TrapSink::ActiveSink { vector };
                Ok(())
            }
            TrapSink::ActiveSink { vector: current } => Err(TrapSinkError::AlreadyInstalled {
                current,
                attempted: vector,
            }),
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, TrapSink::ActiveSink { .. })
    }

    pub const fn vector(&self) -> Option<u64> {
        match self {
            TrapSink::Uninitialized => None,
            TrapSink::ActiveSink { vector } => Some(*vector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_exactly_once() {
        let mut sink = TrapSink::default();
        assert!(!sink.is_active());
        sink.install(0x1020).unwrap();
        assert_eq!(sink.vector(), Some(0x1020));
        assert_eq!(
            sink.install(0x2000),
            Err(TrapSinkError::AlreadyInstalled { current: 0x1020, attempted: 0x2000 })
        );
        assert_eq!(sink.vector(), Some(0x1020));
    }

    #[test]
    fn rejects_misaligned_vector() {
        let mut sink = TrapSink::default();
        assert_eq!(sink.install(0x1022), Err(TrapSinkError::MisalignedVector(0x1022)));
        assert_eq!(sink, TrapSink::Uninitialized);
    }
}
