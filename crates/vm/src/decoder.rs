use crate::instruction::Instruction;
use crate::isa::{self, Opcode};

/// Decodes a 32-bit RISC-V instruction word.
///
/// RISC-V INSTRUCTION FORMAT:
/// ```text
/// 31:25  funct7  (7 bits)
/// 24:20  rs2     (5 bits)
/// 19:15  rs1     (5 bits)
/// 14:12  funct3  (3 bits)
/// 11:7   rd      (5 bits)
/// 6:0    opcode  (7 bits)
/// ```
///
/// IMMEDIATE EXTRACTION: every format scatters its immediate differently.
/// - I-type: bits 31:20
/// - S-type: bits 31:25 and 11:7
/// - B-type: bits 31, 7, 30:25, 11:8 (bit 0 implied zero)
/// - U-type: bits 31:12
/// - J-type: bits 31, 19:12, 20, 30:21 (bit 0 implied zero)
///
/// The all-zero word is *not* a no-op: executing zero-filled memory must
/// trap. Words whose low two bits are not `0b11` would be compressed
/// instructions, which the hart does not implement, so they decode to `None`
/// as well.
pub fn decode_full(word: u32) -> Option<Instruction> {
    match word {
        isa::ECALL => return Some(Instruction::Ecall),
        isa::EBREAK => return Some(Instruction::Ebreak),
        isa::MRET => return Some(Instruction::Mret),
        isa::WFI => return Some(Instruction::Wfi),
        _ => {}
    }
    if word & 0b11 != 0b11 {
        return None;
    }

    let opcode = Opcode::from_u8((word & 0x7f) as u8)?;
    let rd = ((word >> 7) & 0x1f) as usize;
    let funct3 = (word >> 12) & 0x07;
    let rs1 = ((word >> 15) & 0x1f) as usize;
    let rs2 = ((word >> 20) & 0x1f) as usize;
    let funct7 = (word >> 25) & 0x7f;
    let imm_i = (word as i32) >> 20;

    match opcode {
        Opcode::Lui => Some(Instruction::Lui { rd, imm: (word as i32) >> 12 }),
        Opcode::Auipc => Some(Instruction::Auipc { rd, imm: (word as i32) >> 12 }),
        Opcode::Jal => Some(Instruction::Jal { rd, offset: imm_j(word) }),
        Opcode::Jalr if funct3 == 0 => Some(Instruction::Jalr { rd, rs1, offset: imm_i }),
        Opcode::Jalr => None,
        Opcode::Branch => {
            let offset = imm_b(word);
            match funct3 {
                0x0 => Some(Instruction::Beq { rs1, rs2, offset }),
                0x1 => Some(Instruction::Bne { rs1, rs2, offset }),
                0x4 => Some(Instruction::Blt { rs1, rs2, offset }),
                0x5 => Some(Instruction::Bge { rs1, rs2, offset }),
                0x6 => Some(Instruction::Bltu { rs1, rs2, offset }),
                0x7 => Some(Instruction::Bgeu { rs1, rs2, offset }),
                _ => None,
            }
        }
        Opcode::Load => {
            let offset = imm_i;
            match funct3 {
                0x2 => Some(Instruction::Lw { rd, rs1, offset }),
                0x3 => Some(Instruction::Ld { rd, rs1, offset }),
                0x4 => Some(Instruction::Lbu { rd, rs1, offset }),
                0x6 => Some(Instruction::Lwu { rd, rs1, offset }),
                _ => None,
            }
        }
        Opcode::Store => {
            let offset = imm_s(word);
            match funct3 {
                0x0 => Some(Instruction::Sb { rs1, rs2, offset }),
                0x2 => Some(Instruction::Sw { rs1, rs2, offset }),
                0x3 => Some(Instruction::Sd { rs1, rs2, offset }),
                _ => None,
            }
        }
        Opcode::OpImm => {
            // RV64 shifts use a 6-bit shamt; bits 31:26 select the variant.
            let shamt = ((word >> 20) & 0x3f) as u8;
            let funct6 = word >> 26;
            match funct3 {
                0x0 => Some(Instruction::Addi { rd, rs1, imm: imm_i }),
                0x2 => Some(Instruction::Slti { rd, rs1, imm: imm_i }),
                0x3 => Some(Instruction::Sltiu { rd, rs1, imm: imm_i }),
                0x4 => Some(Instruction::Xori { rd, rs1, imm: imm_i }),
                0x6 => Some(Instruction::Ori { rd, rs1, imm: imm_i }),
                0x7 => Some(Instruction::Andi { rd, rs1, imm: imm_i }),
                0x1 if funct6 == 0 => Some(Instruction::Slli { rd, rs1, shamt }),
                0x5 if funct6 == 0 => Some(Instruction::Srli { rd, rs1, shamt }),
                0x5 if funct6 == 0x10 => Some(Instruction::Srai { rd, rs1, shamt }),
                _ => None,
            }
        }
        Opcode::OpImm32 if funct3 == 0 => Some(Instruction::Addiw { rd, rs1, imm: imm_i }),
        Opcode::OpImm32 => None,
        Opcode::Op => match (funct3, funct7) {
            (0x0, 0x00) => Some(Instruction::Add { rd, rs1, rs2 }),
            (0x0, 0x20) => Some(Instruction::Sub { rd, rs1, rs2 }),
            (0x1, 0x00) => Some(Instruction::Sll { rd, rs1, rs2 }),
            (0x2, 0x00) => Some(Instruction::Slt { rd, rs1, rs2 }),
            (0x3, 0x00) => Some(Instruction::Sltu { rd, rs1, rs2 }),
            (0x4, 0x00) => Some(Instruction::Xor { rd, rs1, rs2 }),
            (0x5, 0x00) => Some(Instruction::Srl { rd, rs1, rs2 }),
            (0x5, 0x20) => Some(Instruction::Sra { rd, rs1, rs2 }),
            (0x6, 0x00) => Some(Instruction::Or { rd, rs1, rs2 }),
            (0x7, 0x00) => Some(Instruction::And { rd, rs1, rs2 }),
            _ => None,
        },
        Opcode::MiscMem if funct3 == 0 => Some(Instruction::Fence),
        Opcode::MiscMem => None,
        Opcode::System => {
            let csr = (word >> 20) as u16;
            let uimm = rs1 as u8;
            match funct3 {
                0x1 => Some(Instruction::Csrrw { rd, rs1, csr }),
                0x2 => Some(Instruction::Csrrs { rd, rs1, csr }),
                0x3 => Some(Instruction::Csrrc { rd, rs1, csr }),
                0x5 => Some(Instruction::Csrrwi { rd, uimm, csr }),
                0x6 => Some(Instruction::Csrrsi { rd, uimm, csr }),
                0x7 => Some(Instruction::Csrrci { rd, uimm, csr }),
                _ => None,
            }
        }
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn imm_s(word: u32) -> i32 {
    let value = ((word >> 25) << 5) | ((word >> 7) & 0x1f);
    sign_extend(value, 12)
}

fn imm_b(word: u32) -> i32 {
    let value = (((word >> 31) & 1) << 12)
        | (((word >> 7) & 1) << 11)
        | (((word >> 25) & 0x3f) << 5)
        | (((word >> 8) & 0xf) << 1);
    sign_extend(value, 13)
}

fn imm_j(word: u32) -> i32 {
    let value = (((word >> 31) & 1) << 20)
        | (((word >> 12) & 0xff) << 12)
        | (((word >> 20) & 1) << 11)
        | (((word >> 21) & 0x3ff) << 1);
    sign_extend(value, 21)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_word_is_illegal() {
        assert_eq!(decode_full(0), None);
    }

    #[test]
    fn compressed_encodings_are_rejected() {
        // c.li a0, 1
        assert_eq!(decode_full(0x0000_4505), None);
    }

    #[test]
    fn decodes_self_jump() {
        // j . == jal x0, 0
        let instr = decode_full(0x0000_006f).unwrap();
        assert!(instr.is_self_jump());
    }

    #[test]
    fn decodes_negative_branch_offset() {
        // bnez t0, -4
        let instr = decode_full(0xfe02_9ee3).unwrap();
        assert_eq!(instr, Instruction::Bne { rs1: 5, rs2: 0, offset: -4 });
    }

    #[test]
    fn decodes_csr_forms() {
        // csrr a0, mhartid
        assert_eq!(
            decode_full(0xf140_2573),
            Some(Instruction::Csrrs { rd: 10, rs1: 0, csr: 0xf14 })
        );
        // csrci mstatus, 8
        assert_eq!(
            decode_full(0x3004_7073),
            Some(Instruction::Csrrci { rd: 0, uimm: 8, csr: 0x300 })
        );
    }
}
