use std::fmt;

use types::csr::{self, InterruptBits, Mstatus};

/// Why a CSR instruction could not complete. The CPU turns both cases into an
/// illegal-instruction trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrAccess {
    Unknown(u16),
    ReadOnly(u16),
}

impl fmt::Display for CsrAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsrAccess::Unknown(c) => write!(f, "unimplemented csr {c:#x}"),
            CsrAccess::ReadOnly(c) => write!(f, "write to read-only csr {c:#x}"),
        }
    }
}

impl std::error::Error for CsrAccess {}

/// `misa` for RV64I: MXL=2 in the top bits, extension `I`.
pub const MISA_RV64I: u64 = (2 << 62) | (1 << 8);

/// Machine-mode CSR state of one hart.
///
/// Writes follow the WARL rules of a machine that only implements M-mode:
/// unimplemented `mstatus` fields read as fixed values, `mip` only lets
/// software touch the software-interrupt bit, and `satp` refuses every
/// translation mode except bare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrFile {
    mstatus: u64,
    mie: u64,
    mip: u64,
    mtvec: u64,
    mepc: u64,
    mcause: u64,
    mtval: u64,
    mscratch: u64,
    satp: u64,
    mhartid: u64,
}

impl Default for CsrFile {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CsrFile {
    pub fn new(hart_id: u64) -> Self {
        Self {
            mstatus: 0,
            mie: 0,
            mip: 0,
            mtvec: 0,
            mepc: 0,
            mcause: 0,
            mtval: 0,
            mscratch: 0,
            satp: 0,
            mhartid: hart_id,
        }
    }

    pub fn read(&self, addr: u16) -> Result<u64, CsrAccess> {
        Ok(match addr {
            csr::MSTATUS => self.mstatus | Mstatus::MPP.bits(),
            csr::MISA => MISA_RV64I,
            csr::MIE => self.mie,
            csr::MIP => self.mip,
            csr::MTVEC => self.mtvec,
            csr::MEPC => self.mepc,
            csr::MCAUSE => self.mcause,
            csr::MTVAL => self.mtval,
            csr::MSCRATCH => self.mscratch,
            csr::SATP => self.satp,
            csr::MHARTID => self.mhartid,
            _ => return Err(CsrAccess::Unknown(addr)),
        })
    }

    /// Architectural write with WARL legalisation.
    pub fn write(&mut self, addr: u16, value: u64) -> Result<(), CsrAccess> {
        if csr::name(addr).is_none() {
            return Err(CsrAccess::Unknown(addr));
        }
        if csr::is_read_only(addr) {
            return Err(CsrAccess::ReadOnly(addr));
        }
        match addr {
            csr::MSTATUS => self.mstatus = value & (Mstatus::MIE | Mstatus::MPIE).bits(),
            csr::MISA => {}
            csr::MIE => self.mie = value & InterruptBits::all().bits(),
            csr::MIP => {
                let sw = InterruptBits::MSI.bits();
                self.mip = (self.mip & !sw) | (value & sw);
            }
            csr::MTVEC => {
                let mode = match value & 0b11 {
                    m @ (0 | 1) => m,
                    _ => self.mtvec & 0b11,
                };
                self.mtvec = (value & !0b11) | mode;
            }
            csr::MEPC => self.mepc = value & !0b11,
            csr::MCAUSE => self.mcause = value,
            csr::MTVAL => self.mtval = value,
            csr::MSCRATCH => self.mscratch = value,
            csr::SATP => {
                // Only bare mode (MODE = 0) is implemented.
                if value >> 60 == 0 {
                    self.satp = value;
                }
            }
            _ => return Err(CsrAccess::Unknown(addr)),
        }
        Ok(())
    }

    /// Stores a raw value, bypassing WARL and read-only checks. Used to
    /// model state left behind by an earlier boot.
    pub fn poke(&mut self, addr: u16, value: u64) -> Result<(), CsrAccess> {
        match addr {
            csr::MSTATUS => self.mstatus = value & !Mstatus::MPP.bits(),
            csr::MIE => self.mie = value,
            csr::MIP => self.mip = value,
            csr::MTVEC => self.mtvec = value,
            csr::MEPC => self.mepc = value,
            csr::MCAUSE => self.mcause = value,
            csr::MTVAL => self.mtval = value,
            csr::MSCRATCH => self.mscratch = value,
            csr::SATP => self.satp = value,
            csr::MHARTID => self.mhartid = value,
            _ => return Err(CsrAccess::Unknown(addr)),
        }
        Ok(())
    }

    pub fn mstatus(&self) -> Mstatus {
        Mstatus::from_bits_truncate(self.mstatus)
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.mstatus().contains(Mstatus::MIE)
    }

    pub fn mie(&self) -> u64 {
        self.mie
    }

    pub fn mip(&self) -> u64 {
        self.mip
    }

    pub fn mtvec(&self) -> u64 {
        self.mtvec
    }

    pub fn mepc(&self) -> u64 {
        self.mepc
    }

    pub fn mcause(&self) -> u64 {
        self.mcause
    }

    pub fn mtval(&self) -> u64 {
        self.mtval
    }

    pub fn satp(&self) -> u64 {
        self.satp
    }

    pub fn hart_id(&self) -> u64 {
        self.mhartid
    }

    /// Platform side of `mip`: devices raise and lower their own lines.
    pub fn set_pending(&mut self, bits: InterruptBits) {
        self.mip |= bits.bits();
    }

    /// Trap entry bookkeeping: save the interrupt enable and close the gate.
    pub(crate) fn enter_trap(&mut self, epc: u64, cause: u64, tval: u64) {
        self.mepc = epc & !0b11;
        self.mcause = cause;
        self.mtval = tval;
        let mut status = self.mstatus();
        status.set(Mstatus::MPIE, status.contains(Mstatus::MIE));
        status.remove(Mstatus::MIE);
        self.mstatus = (status - Mstatus::MPP).bits();
    }

    /// `mret` bookkeeping: restore the interrupt enable and return `mepc`.
    pub(crate) fn leave_trap(&mut self) -> u64 {
        let mut status = self.mstatus();
        status.set(Mstatus::MIE, status.contains(Mstatus::MPIE));
        status.insert(Mstatus::MPIE);
        self.mstatus = (status - Mstatus::MPP).bits();
        self.mepc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satp_only_accepts_bare_mode() {
        let mut csrs = CsrFile::default();
        csrs.write(csr::SATP, 8 << 60).unwrap();
        assert_eq!(csrs.satp(), 0);
        csrs.poke(csr::SATP, 8 << 60).unwrap();
        csrs.write(csr::SATP, 0).unwrap();
        assert_eq!(csrs.satp(), 0);
    }

    #[test]
    fn hart_id_is_read_only() {
        let mut csrs = CsrFile::new(3);
        assert_eq!(csrs.write(csr::MHARTID, 1), Err(CsrAccess::ReadOnly(csr::MHARTID)));
        assert_eq!(csrs.read(csr::MHARTID), Ok(3));
    }

    #[test]
    fn mip_only_exposes_software_bit() {
        let mut csrs = CsrFile::default();
        csrs.write(csr::MIP, 0xfff).unwrap();
        assert_eq!(csrs.mip(), InterruptBits::MSI.bits());
    }

    #[test]
    fn mstatus_reports_machine_mode_as_previous_privilege() {
        let mut csrs = CsrFile::default();
        csrs.write(csr::MSTATUS, u64::MAX).unwrap();
        assert_eq!(csrs.read(csr::MSTATUS), Ok(0x1888));
    }

    #[test]
    fn mtvec_rejects_reserved_modes() {
        let mut csrs = CsrFile::default();
        csrs.write(csr::MTVEC, 0x1003).unwrap();
        assert_eq!(csrs.mtvec(), 0x1000);
        csrs.write(csr::MTVEC, 0x2001).unwrap();
        assert_eq!(csrs.mtvec(), 0x2001);
    }

    #[test]
    fn unknown_csr_is_rejected() {
        let csrs = CsrFile::default();
        assert_eq!(csrs.read(0x7c0), Err(CsrAccess::Unknown(0x7c0)));
    }
}
