//! Machine-mode control and status registers touched by the boot chain.

use bitflags::bitflags;

pub const SATP: u16 = 0x180;
pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MIP: u16 = 0x344;
pub const MHARTID: u16 = 0xf14;

/// Returns the conventional assembler name of a CSR.
pub const fn name(csr: u16) -> Option<&'static str> {
    Some(match csr {
        SATP => "satp",
        MSTATUS => "mstatus",
        MISA => "misa",
        MIE => "mie",
        MTVEC => "mtvec",
        MSCRATCH => "mscratch",
        MEPC => "mepc",
        MCAUSE => "mcause",
        MTVAL => "mtval",
        MIP => "mip",
        MHARTID => "mhartid",
        _ => return None,
    })
}

/// CSRs in the `0xc00..` and `0xf00..` ranges have bits 11:10 set and are read-only.
pub const fn is_read_only(csr: u16) -> bool {
    (csr >> 10) & 0b11 == 0b11
}

bitflags! {
    /// The `mstatus` fields this machine implements.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Mstatus: u64 {
        /// Global machine interrupt enable.
        const MIE = 1 << 3;
        /// Interrupt enable saved on trap entry.
        const MPIE = 1 << 7;
        /// Previous privilege mode, two bits.
        const MPP = 0b11 << 11;
    }
}

bitflags! {
    /// Bit layout shared by `mie` and `mip`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct InterruptBits: u64 {
        /// Machine software interrupt.
        const MSI = 1 << 3;
        /// Machine timer interrupt.
        const MTI = 1 << 7;
        /// Machine external interrupt.
        const MEI = 1 << 11;
    }
}

impl InterruptBits {
    /// Sources the kernel arms before opening the global gate.
    pub const KERNEL_SOURCES: InterruptBits = InterruptBits::MEI.union(InterruptBits::MTI);
}

/// `satp` value for bare (untranslated) addressing.
pub const SATP_BARE: u64 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hart_id_is_read_only_and_mtvec_is_not() {
        assert!(is_read_only(MHARTID));
        assert!(!is_read_only(MTVEC));
        assert!(!is_read_only(SATP));
    }

    #[test]
    fn kernel_sources_are_external_and_timer() {
        assert_eq!(InterruptBits::KERNEL_SOURCES.bits(), 0x880);
    }
}
