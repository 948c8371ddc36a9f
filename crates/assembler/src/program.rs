//! Label-aware program builder.
//!
//! Stage code is written as a sequence of calls on [`Program`], one per
//! instruction or pseudo-instruction. Forward references are allowed; all
//! labels are resolved in [`Program::finish`] once the final layout of the
//! code is known.

use std::collections::{BTreeMap, HashMap};

use types::{sbi, Stage};
use vm::registers::Register;
use vm::Instruction;

use crate::encoder::encode;
use crate::image::BootImage;
use crate::AsmError;

#[derive(Debug, Clone)]
enum Item {
    Fixed(Instruction),
    Jump { rd: usize, label: String },
    /// `bne rs, zero, label`
    BranchNonZero { rs: usize, label: String },
    /// `auipc` + `addi` pair resolving to an absolute label address.
    LoadAddress { rd: usize, label: String },
}

impl Item {
    fn size(&self) -> u64 {
        match self {
            Item::LoadAddress { .. } => 8,
            _ => 4,
        }
    }
}

/// An in-progress stage program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    items: Vec<Item>,
    labels: HashMap<String, u64>,
    size: u64,
}

const ZERO: usize = Register::Zero as usize;
const A0: usize = Register::A0 as usize;

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, item: Item) -> &mut Self {
        self.size += item.size();
        self.items.push(item);
        self
    }

    /// Defines `name` at the current offset.
    pub fn label(&mut self, name: &str) -> Result<&mut Self, AsmError> {
        if self.labels.insert(name.to_string(), self.size).is_some() {
            return Err(AsmError::DuplicateLabel(name.to_string()));
        }
        Ok(self)
    }

    /// Pads with `nop` until the offset is a multiple of `alignment`.
    pub fn align(&mut self, alignment: u64) -> &mut Self {
        while self.size % alignment != 0 {
            self.emit(Instruction::Addi { rd: ZERO, rs1: ZERO, imm: 0 });
        }
        self
    }

    pub fn emit(&mut self, instruction: Instruction) -> &mut Self {
        self.push(Item::Fixed(instruction))
    }

    /// Loads a 64-bit constant with the shortest `lui`/`addi(w)`/`slli` chain.
    pub fn li(&mut self, rd: Register, value: u64) -> &mut Self {
        let mut seq = Vec::new();
        materialize(rd.idx(), value as i64, &mut seq);
        for instruction in seq {
            self.emit(instruction);
        }
        self
    }

    /// Loads the absolute address of `label`, position-independently.
    pub fn la(&mut self, rd: Register, label: &str) -> &mut Self {
        self.push(Item::LoadAddress { rd: rd.idx(), label: label.to_string() })
    }

    pub fn j(&mut self, label: &str) -> &mut Self {
        self.push(Item::Jump { rd: ZERO, label: label.to_string() })
    }

    pub fn jr(&mut self, rs: Register) -> &mut Self {
        self.emit(Instruction::Jalr { rd: ZERO, rs1: rs.idx(), offset: 0 })
    }

    pub fn bnez(&mut self, rs: Register, label: &str) -> &mut Self {
        self.push(Item::BranchNonZero { rs: rs.idx(), label: label.to_string() })
    }

    pub fn addi(&mut self, rd: Register, rs1: Register, imm: i32) -> &mut Self {
        self.emit(Instruction::Addi { rd: rd.idx(), rs1: rs1.idx(), imm })
    }

    pub fn csrr(&mut self, rd: Register, csr: u16) -> &mut Self {
        self.emit(Instruction::Csrrs { rd: rd.idx(), rs1: ZERO, csr })
    }

    pub fn csrw(&mut self, csr: u16, rs: Register) -> &mut Self {
        self.emit(Instruction::Csrrw { rd: ZERO, rs1: rs.idx(), csr })
    }

    pub fn csrs(&mut self, csr: u16, rs: Register) -> &mut Self {
        self.emit(Instruction::Csrrs { rd: ZERO, rs1: rs.idx(), csr })
    }

    pub fn csrc(&mut self, csr: u16, rs: Register) -> &mut Self {
        self.emit(Instruction::Csrrc { rd: ZERO, rs1: rs.idx(), csr })
    }

    pub fn csrsi(&mut self, csr: u16, uimm: u8) -> &mut Self {
        self.emit(Instruction::Csrrsi { rd: ZERO, uimm, csr })
    }

    pub fn csrci(&mut self, csr: u16, uimm: u8) -> &mut Self {
        self.emit(Instruction::Csrrci { rd: ZERO, uimm, csr })
    }

    pub fn ecall(&mut self) -> &mut Self {
        self.emit(Instruction::Ecall)
    }

    pub fn wfi(&mut self) -> &mut Self {
        self.emit(Instruction::Wfi)
    }

    /// One firmware console call printing `ch`. Clobbers `a0`, `a6`, `a7`
    /// (and `a1` on return).
    pub fn console_putchar(&mut self, ch: u8) -> &mut Self {
        self.li(Register::A0, ch as u64)
            .li(Register::A7, sbi::EXT_CONSOLE)
            .li(Register::A6, sbi::FN_CONSOLE_PUTCHAR)
            .ecall()
    }

    /// Resolves labels and encodes the program for loading at `base`.
    pub fn finish(&self, stage: Stage, base: u64) -> Result<BootImage, AsmError> {
        let mut bytes = Vec::with_capacity(self.size as usize);
        let mut offset = 0u64;
        for item in &self.items {
            for instruction in self.resolve(item, offset)? {
                bytes.extend_from_slice(&encode(&instruction)?.to_le_bytes());
            }
            offset += item.size();
        }

        let symbols: BTreeMap<String, u64> = self
            .labels
            .iter()
            .map(|(name, off)| (name.clone(), base + off))
            .collect();
        log::debug!("assembled {stage}: {} bytes, {} symbols", bytes.len(), symbols.len());
        Ok(BootImage { stage, base, bytes, symbols })
    }

    fn target(&self, label: &str, offset: u64) -> Result<i64, AsmError> {
        let target = *self
            .labels
            .get(label)
            .ok_or_else(|| AsmError::UndefinedLabel(label.to_string()))?;
        Ok(target as i64 - offset as i64)
    }

    fn resolve(&self, item: &Item, offset: u64) -> Result<Vec<Instruction>, AsmError> {
        Ok(match item {
            Item::Fixed(instruction) => vec![*instruction],
            Item::Jump { rd, label } => {
                let delta = pc_relative(self.target(label, offset)?, 21)?;
                vec![Instruction::Jal { rd: *rd, offset: delta }]
            }
            Item::BranchNonZero { rs, label } => {
                let offset = pc_relative(self.target(label, offset)?, 13)?;
                vec![Instruction::Bne { rs1: *rs, rs2: ZERO, offset }]
            }
            Item::LoadAddress { rd, label } => {
                let delta = self.target(label, offset)?;
                let hi = (delta + 0x800) >> 12;
                let lo = delta - (hi << 12);
                if hi < -(1 << 19) || hi >= (1 << 19) {
                    return Err(AsmError::ImmediateOutOfRange { field: "pc-relative", value: delta });
                }
                vec![
                    Instruction::Auipc { rd: *rd, imm: hi as i32 },
                    Instruction::Addi { rd: *rd, rs1: *rd, imm: lo as i32 },
                ]
            }
        })
    }
}

fn pc_relative(delta: i64, bits: u32) -> Result<i32, AsmError> {
    let limit = 1i64 << (bits - 1);
    if delta < -limit || delta >= limit {
        return Err(AsmError::ImmediateOutOfRange { field: "pc-relative", value: delta });
    }
    Ok(delta as i32)
}

fn sext(value: i64, bits: u32) -> i64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Appends the instruction sequence that leaves `value` in `rd`.
///
/// 32-bit values take `lui` + `addiw` (or a lone `addi`). Wider values strip
/// the low 12 bits, shift the remaining high part right past its trailing
/// zeros, materialize that recursively and rebuild with `slli` + `addi`.
pub fn materialize(rd: usize, value: i64, out: &mut Vec<Instruction>) {
    let lo12 = sext(value, 12);
    if value == value as i32 as i64 {
        let hi20 = ((value + 0x800) >> 12) & 0xfffff;
        if hi20 == 0 {
            out.push(Instruction::Addi { rd, rs1: ZERO, imm: lo12 as i32 });
            return;
        }
        out.push(Instruction::Lui { rd, imm: sext(hi20, 20) as i32 });
        if lo12 != 0 {
            out.push(Instruction::Addiw { rd, rs1: rd, imm: lo12 as i32 });
        }
        return;
    }

    let hi52 = value.wrapping_sub(lo12) >> 12;
    let shift = 12 + hi52.trailing_zeros();
    materialize(rd, hi52 >> (shift - 12), out);
    out.push(Instruction::Slli { rd, rs1: rd, shamt: shift as u8 });
    if lo12 != 0 {
        out.push(Instruction::Addi { rd, rs1: rd, imm: lo12 as i32 });
    }
}
