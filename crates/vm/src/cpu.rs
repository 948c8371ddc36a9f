use types::csr::InterruptBits;
use types::trap::interrupt;

use crate::csr::{CsrAccess, CsrFile};
use crate::decoder::decode_full;
use crate::instruction::Instruction;
use crate::memory::Bus;
use crate::registers::abi_name;
use crate::sys_call::{EcallHandler, EcallOutcome};
use crate::trap::Trap;

/// Run state of the hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HartState {
    Running,
    /// Parked in `wfi` until an enabled interrupt becomes pending.
    WaitingForInterrupt,
}

/// What happened during one call to [`CPU::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction at `pc` completed.
    Retired { pc: u64, instruction: Instruction },
    /// A trap was taken with `pc` as the faulting (or interrupted) address.
    Trapped { pc: u64, trap: Trap },
    /// The hart is parked in `wfi` and nothing woke it.
    Waiting,
}

/// A single RV64I hart running in machine mode.
///
/// The model follows the classic interpreter loop: check for a deliverable
/// interrupt, fetch the 32-bit word at `pc`, decode it and execute it. Any
/// exception raised along the way is delivered through `mtvec` exactly like
/// hardware would, so software sees the same `mepc`/`mcause`/`mtval` values.
///
/// REGISTERS: `regs[0]` is hardwired to zero. Every write goes through
/// `write_reg`, which drops writes to x0.
///
/// INTERRUPTS: a pending and enabled interrupt (`mip & mie`) wakes a hart
/// parked in `wfi` even while `mstatus.MIE` is clear; it is only *taken*
/// once `mstatus.MIE` is set. Priority is external, then software, then
/// timer.
#[derive(Debug)]
pub struct CPU {
    pub pc: u64,
    pub regs: [u64; 32],
    pub csrs: CsrFile,
    pub state: HartState,
    /// Log every retired instruction and every trap.
    pub verbose: bool,
    pub ecall_handler: Box<dyn EcallHandler>,
    /// Instructions retired since reset.
    pub retired: u64,
}

impl CPU {
    pub fn new(ecall_handler: Box<dyn EcallHandler>) -> Self {
        Self {
            pc: 0,
            regs: [0; 32],
            csrs: CsrFile::default(),
            state: HartState::Running,
            verbose: false,
            ecall_handler,
            retired: 0,
        }
    }

    /// Executes one fetch/decode/execute cycle, or delivers an interrupt.
    pub fn step(&mut self, bus: &mut Bus) -> Step {
        if let Some(code) = self.pending_interrupt() {
            self.state = HartState::Running;
            if self.csrs.interrupts_enabled() {
                let pc = self.pc;
                let trap = Trap::Interrupt(code);
                self.take_trap(trap, pc);
                return Step::Trapped { pc, trap };
            }
        }
        if self.state == HartState::WaitingForInterrupt {
            return Step::Waiting;
        }

        let pc = self.pc;
        let instruction = match self.fetch(bus) {
            Ok(instruction) => instruction,
            Err(trap) => {
                self.take_trap(trap, pc);
                return Step::Trapped { pc, trap };
            }
        };

        if self.verbose {
            log::trace!("PC = {:#010x}, Instr = {}", pc, instruction.pretty_print());
        }

        match self.execute(instruction, bus) {
            Ok(next_pc) => {
                self.pc = next_pc;
                self.retired += 1;
                Step::Retired { pc, instruction }
            }
            Err(trap) => {
                self.take_trap(trap, pc);
                Step::Trapped { pc, trap }
            }
        }
    }

    /// Fetches and decodes the word at `pc`.
    pub fn fetch(&self, bus: &Bus) -> Result<Instruction, Trap> {
        if self.pc & 0b11 != 0 {
            return Err(Trap::InstructionAddressMisaligned(self.pc));
        }
        let word = bus.fetch(self.pc).ok_or(Trap::InstructionAccessFault(self.pc))?;
        decode_full(word).ok_or(Trap::IllegalInstruction(word as u64))
    }

    /// Highest-priority interrupt that is both pending and enabled in `mie`,
    /// regardless of the global `mstatus.MIE` gate.
    pub fn pending_interrupt(&self) -> Option<u64> {
        let ready = InterruptBits::from_bits_truncate(self.csrs.mip() & self.csrs.mie());
        [
            (InterruptBits::MEI, interrupt::MACHINE_EXTERNAL),
            (InterruptBits::MSI, interrupt::MACHINE_SOFTWARE),
            (InterruptBits::MTI, interrupt::MACHINE_TIMER),
        ]
        .into_iter()
        .find(|(bit, _)| ready.contains(*bit))
        .map(|(_, code)| code)
    }

    /// An interrupt that would be taken right now.
    pub fn deliverable_interrupt(&self) -> Option<u64> {
        self.pending_interrupt().filter(|_| self.csrs.interrupts_enabled())
    }

    /// Delivers `trap` as if it were raised by the instruction at `epc`.
    pub fn take_trap(&mut self, trap: Trap, epc: u64) {
        self.csrs.enter_trap(epc, trap.cause(), trap.tval());
        let mtvec = self.csrs.mtvec();
        let base = mtvec & !0b11;
        let vectored = mtvec & 0b11 == 1;
        self.pc = match trap {
            Trap::Interrupt(code) if vectored => base.wrapping_add(4 * code),
            _ => base,
        };
        self.state = HartState::Running;
        if self.verbose {
            log::debug!("TRAP at {:#010x}: {} -> {:#010x}", epc, trap, self.pc);
        }
    }

    fn write_reg(&mut self, rd: usize, value: u64) {
        if rd != 0 {
            self.regs[rd] = value;
        }
    }

    fn reg(&self, r: usize) -> u64 {
        self.regs[r]
    }

    /// Executes a decoded instruction and returns the next pc.
    pub fn execute(&mut self, instruction: Instruction, bus: &mut Bus) -> Result<u64, Trap> {
        let pc = self.pc;
        let next = pc.wrapping_add(4);
        let rel = |offset: i32| pc.wrapping_add(offset as i64 as u64);

        match instruction {
            Instruction::Lui { rd, imm } => {
                self.write_reg(rd, (imm.wrapping_shl(12)) as i64 as u64);
            }
            Instruction::Auipc { rd, imm } => {
                self.write_reg(rd, rel(imm.wrapping_shl(12)));
            }
            Instruction::Jal { rd, offset } => {
                let target = jump_target(rel(offset))?;
                self.write_reg(rd, next);
                return Ok(target);
            }
            Instruction::Jalr { rd, rs1, offset } => {
                let target = self.reg(rs1).wrapping_add(offset as i64 as u64) & !1;
                let target = jump_target(target)?;
                self.write_reg(rd, next);
                return Ok(target);
            }
            Instruction::Beq { rs1, rs2, offset } => {
                return self.branch(self.reg(rs1) == self.reg(rs2), rel(offset), next);
            }
            Instruction::Bne { rs1, rs2, offset } => {
                return self.branch(self.reg(rs1) != self.reg(rs2), rel(offset), next);
            }
            Instruction::Blt { rs1, rs2, offset } => {
                let taken = (self.reg(rs1) as i64) < (self.reg(rs2) as i64);
                return self.branch(taken, rel(offset), next);
            }
            Instruction::Bge { rs1, rs2, offset } => {
                let taken = (self.reg(rs1) as i64) >= (self.reg(rs2) as i64);
                return self.branch(taken, rel(offset), next);
            }
            Instruction::Bltu { rs1, rs2, offset } => {
                return self.branch(self.reg(rs1) < self.reg(rs2), rel(offset), next);
            }
            Instruction::Bgeu { rs1, rs2, offset } => {
                return self.branch(self.reg(rs1) >= self.reg(rs2), rel(offset), next);
            }

            Instruction::Ld { rd, rs1, offset } => {
                let value = self.load(bus, rs1, offset, 8)?;
                self.write_reg(rd, value);
            }
            Instruction::Lw { rd, rs1, offset } => {
                let value = self.load(bus, rs1, offset, 4)?;
                self.write_reg(rd, value as u32 as i32 as i64 as u64);
            }
            Instruction::Lwu { rd, rs1, offset } => {
                let value = self.load(bus, rs1, offset, 4)?;
                self.write_reg(rd, value);
            }
            Instruction::Lbu { rd, rs1, offset } => {
                let value = self.load(bus, rs1, offset, 1)?;
                self.write_reg(rd, value);
            }
            Instruction::Sd { rs1, rs2, offset } => self.store(bus, rs1, rs2, offset, 8)?,
            Instruction::Sw { rs1, rs2, offset } => self.store(bus, rs1, rs2, offset, 4)?,
            Instruction::Sb { rs1, rs2, offset } => self.store(bus, rs1, rs2, offset, 1)?,

            Instruction::Addi { rd, rs1, imm } => {
                self.write_reg(rd, self.reg(rs1).wrapping_add(imm as i64 as u64));
            }
            Instruction::Slti { rd, rs1, imm } => {
                self.write_reg(rd, ((self.reg(rs1) as i64) < imm as i64) as u64);
            }
            Instruction::Sltiu { rd, rs1, imm } => {
                self.write_reg(rd, (self.reg(rs1) < imm as i64 as u64) as u64);
            }
            Instruction::Xori { rd, rs1, imm } => self.write_reg(rd, self.reg(rs1) ^ imm as i64 as u64),
            Instruction::Ori { rd, rs1, imm } => self.write_reg(rd, self.reg(rs1) | imm as i64 as u64),
            Instruction::Andi { rd, rs1, imm } => self.write_reg(rd, self.reg(rs1) & imm as i64 as u64),
            Instruction::Slli { rd, rs1, shamt } => self.write_reg(rd, self.reg(rs1) << (shamt & 0x3f)),
            Instruction::Srli { rd, rs1, shamt } => self.write_reg(rd, self.reg(rs1) >> (shamt & 0x3f)),
            Instruction::Srai { rd, rs1, shamt } => {
                self.write_reg(rd, ((self.reg(rs1) as i64) >> (shamt & 0x3f)) as u64);
            }
            Instruction::Addiw { rd, rs1, imm } => {
                let value = (self.reg(rs1) as i32).wrapping_add(imm);
                self.write_reg(rd, value as i64 as u64);
            }

            Instruction::Add { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1).wrapping_add(self.reg(rs2))),
            Instruction::Sub { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1).wrapping_sub(self.reg(rs2))),
            Instruction::Sll { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1) << (self.reg(rs2) & 0x3f)),
            Instruction::Slt { rd, rs1, rs2 } => {
                self.write_reg(rd, ((self.reg(rs1) as i64) < (self.reg(rs2) as i64)) as u64);
            }
            Instruction::Sltu { rd, rs1, rs2 } => self.write_reg(rd, (self.reg(rs1) < self.reg(rs2)) as u64),
            Instruction::Xor { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1) ^ self.reg(rs2)),
            Instruction::Srl { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1) >> (self.reg(rs2) & 0x3f)),
            Instruction::Sra { rd, rs1, rs2 } => {
                self.write_reg(rd, ((self.reg(rs1) as i64) >> (self.reg(rs2) & 0x3f)) as u64);
            }
            Instruction::Or { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1) | self.reg(rs2)),
            Instruction::And { rd, rs1, rs2 } => self.write_reg(rd, self.reg(rs1) & self.reg(rs2)),

            Instruction::Fence => {}

            Instruction::Ecall => match self.ecall_handler.handle_ecall(&mut self.regs) {
                EcallOutcome::Handled => self.regs[0] = 0,
                EcallOutcome::Unsupported => return Err(Trap::EcallFromMachine),
            },
            Instruction::Ebreak => return Err(Trap::Breakpoint(pc)),
            Instruction::Mret => return Ok(self.csrs.leave_trap()),
            Instruction::Wfi => {
                if self.pending_interrupt().is_none() {
                    self.state = HartState::WaitingForInterrupt;
                }
            }

            Instruction::Csrrw { rd, rs1, csr } => {
                let value = self.reg(rs1);
                self.csr_op(rd, csr, Some(value))?;
            }
            Instruction::Csrrs { rd, rs1, csr } => {
                let mask = (rs1 != 0).then_some(self.reg(rs1));
                self.csr_modify(rd, csr, mask, |old, m| old | m)?;
            }
            Instruction::Csrrc { rd, rs1, csr } => {
                let mask = (rs1 != 0).then_some(self.reg(rs1));
                self.csr_modify(rd, csr, mask, |old, m| old & !m)?;
            }
            Instruction::Csrrwi { rd, uimm, csr } => {
                self.csr_op(rd, csr, Some(uimm as u64))?;
            }
            Instruction::Csrrsi { rd, uimm, csr } => {
                let mask = (uimm != 0).then_some(uimm as u64);
                self.csr_modify(rd, csr, mask, |old, m| old | m)?;
            }
            Instruction::Csrrci { rd, uimm, csr } => {
                let mask = (uimm != 0).then_some(uimm as u64);
                self.csr_modify(rd, csr, mask, |old, m| old & !m)?;
            }
        }
        Ok(next)
    }

    fn branch(&self, taken: bool, target: u64, next: u64) -> Result<u64, Trap> {
        if taken { jump_target(target) } else { Ok(next) }
    }

    fn effective_address(&self, rs1: usize, offset: i32) -> u64 {
        self.reg(rs1).wrapping_add(offset as i64 as u64)
    }

    fn load(&self, bus: &Bus, rs1: usize, offset: i32, width: u64) -> Result<u64, Trap> {
        let addr = self.effective_address(rs1, offset);
        if addr % width != 0 {
            return Err(Trap::LoadAddressMisaligned(addr));
        }
        bus.load(addr, width).ok_or(Trap::LoadAccessFault(addr))
    }

    fn store(&self, bus: &mut Bus, rs1: usize, rs2: usize, offset: i32, width: u64) -> Result<(), Trap> {
        let addr = self.effective_address(rs1, offset);
        if addr % width != 0 {
            return Err(Trap::StoreAddressMisaligned(addr));
        }
        bus.store(addr, width, self.reg(rs2)).ok_or(Trap::StoreAccessFault(addr))
    }

    /// csrrw/csrrwi: the write always happens, the read only matters for rd.
    fn csr_op(&mut self, rd: usize, csr: u16, value: Option<u64>) -> Result<(), Trap> {
        self.csr_modify(rd, csr, value, |_, v| v)
    }

    /// Read-modify-write on a CSR. `operand = None` means the instruction
    /// does not write (the `csrr` forms), so read-only CSRs are accepted.
    fn csr_modify(
        &mut self,
        rd: usize,
        csr: u16,
        operand: Option<u64>,
        combine: impl Fn(u64, u64) -> u64,
    ) -> Result<(), Trap> {
        let old = self.csrs.read(csr).map_err(illegal_csr)?;
        if let Some(operand) = operand {
            self.csrs.write(csr, combine(old, operand)).map_err(illegal_csr)?;
        }
        self.write_reg(rd, old);
        Ok(())
    }

    /// Human-readable snapshot of the integer registers and key CSRs.
    pub fn register_dump(&self) -> String {
        let mut out = format!("pc  = {:#018x}\n", self.pc);
        for (i, chunk) in self.regs.chunks(4).enumerate() {
            let line = chunk
                .iter()
                .enumerate()
                .map(|(j, v)| {
                    let r = i * 4 + j;
                    format!("x{:<2} {:>4} = {:#018x}", r, abi_name(r), v)
                })
                .collect::<Vec<_>>()
                .join("  ");
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!(
            "mstatus = {:#x}  mie = {:#x}  mip = {:#x}  mtvec = {:#x}\n",
            self.csrs.read(types::csr::MSTATUS).unwrap_or_default(),
            self.csrs.mie(),
            self.csrs.mip(),
            self.csrs.mtvec(),
        ));
        out.push_str(&format!(
            "mepc = {:#x}  mcause = {:#x}  mtval = {:#x}  satp = {:#x}\n",
            self.csrs.mepc(),
            self.csrs.mcause(),
            self.csrs.mtval(),
            self.csrs.satp(),
        ));
        out
    }
}

fn jump_target(target: u64) -> Result<u64, Trap> {
    if target & 0b11 != 0 {
        Err(Trap::InstructionAddressMisaligned(target))
    } else {
        Ok(target)
    }
}

fn illegal_csr(err: CsrAccess) -> Trap {
    log::trace!("{err}");
    Trap::IllegalInstruction(0)
}
