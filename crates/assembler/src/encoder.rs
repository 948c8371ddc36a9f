//! Instruction encoder, the exact inverse of `vm::decode_full`.

use vm::isa::{self, Opcode};
use vm::Instruction;

use crate::AsmError;

/// Encodes one instruction into its 32-bit word.
pub fn encode(instruction: &Instruction) -> Result<u32, AsmError> {
    use Instruction::*;

    Ok(match *instruction {
        Lui { rd, imm } => u_type(Opcode::Lui, rd, imm)?,
        Auipc { rd, imm } => u_type(Opcode::Auipc, rd, imm)?,
        Jal { rd, offset } => j_type(rd, offset)?,
        Jalr { rd, rs1, offset } => i_type(Opcode::Jalr, 0, rd, rs1, offset)?,

        Beq { rs1, rs2, offset } => b_type(0x0, rs1, rs2, offset)?,
        Bne { rs1, rs2, offset } => b_type(0x1, rs1, rs2, offset)?,
        Blt { rs1, rs2, offset } => b_type(0x4, rs1, rs2, offset)?,
        Bge { rs1, rs2, offset } => b_type(0x5, rs1, rs2, offset)?,
        Bltu { rs1, rs2, offset } => b_type(0x6, rs1, rs2, offset)?,
        Bgeu { rs1, rs2, offset } => b_type(0x7, rs1, rs2, offset)?,

        Lw { rd, rs1, offset } => i_type(Opcode::Load, 0x2, rd, rs1, offset)?,
        Ld { rd, rs1, offset } => i_type(Opcode::Load, 0x3, rd, rs1, offset)?,
        Lbu { rd, rs1, offset } => i_type(Opcode::Load, 0x4, rd, rs1, offset)?,
        Lwu { rd, rs1, offset } => i_type(Opcode::Load, 0x6, rd, rs1, offset)?,
        Sb { rs1, rs2, offset } => s_type(0x0, rs1, rs2, offset)?,
        Sw { rs1, rs2, offset } => s_type(0x2, rs1, rs2, offset)?,
        Sd { rs1, rs2, offset } => s_type(0x3, rs1, rs2, offset)?,

        Addi { rd, rs1, imm } => i_type(Opcode::OpImm, 0x0, rd, rs1, imm)?,
        Slti { rd, rs1, imm } => i_type(Opcode::OpImm, 0x2, rd, rs1, imm)?,
        Sltiu { rd, rs1, imm } => i_type(Opcode::OpImm, 0x3, rd, rs1, imm)?,
        Xori { rd, rs1, imm } => i_type(Opcode::OpImm, 0x4, rd, rs1, imm)?,
        Ori { rd, rs1, imm } => i_type(Opcode::OpImm, 0x6, rd, rs1, imm)?,
        Andi { rd, rs1, imm } => i_type(Opcode::OpImm, 0x7, rd, rs1, imm)?,
        Slli { rd, rs1, shamt } => shift(0x1, 0x00, rd, rs1, shamt)?,
        Srli { rd, rs1, shamt } => shift(0x5, 0x00, rd, rs1, shamt)?,
        Srai { rd, rs1, shamt } => shift(0x5, 0x10, rd, rs1, shamt)?,
        Addiw { rd, rs1, imm } => i_type(Opcode::OpImm32, 0x0, rd, rs1, imm)?,

        Add { rd, rs1, rs2 } => r_type(0x0, 0x00, rd, rs1, rs2)?,
        Sub { rd, rs1, rs2 } => r_type(0x0, 0x20, rd, rs1, rs2)?,
        Sll { rd, rs1, rs2 } => r_type(0x1, 0x00, rd, rs1, rs2)?,
        Slt { rd, rs1, rs2 } => r_type(0x2, 0x00, rd, rs1, rs2)?,
        Sltu { rd, rs1, rs2 } => r_type(0x3, 0x00, rd, rs1, rs2)?,
        Xor { rd, rs1, rs2 } => r_type(0x4, 0x00, rd, rs1, rs2)?,
        Srl { rd, rs1, rs2 } => r_type(0x5, 0x00, rd, rs1, rs2)?,
        Sra { rd, rs1, rs2 } => r_type(0x5, 0x20, rd, rs1, rs2)?,
        Or { rd, rs1, rs2 } => r_type(0x6, 0x00, rd, rs1, rs2)?,
        And { rd, rs1, rs2 } => r_type(0x7, 0x00, rd, rs1, rs2)?,

        Fence => isa::FENCE,
        Ecall => isa::ECALL,
        Ebreak => isa::EBREAK,
        Mret => isa::MRET,
        Wfi => isa::WFI,

        Csrrw { rd, rs1, csr } => csr_type(0x1, rd, reg(rs1)?, csr)?,
        Csrrs { rd, rs1, csr } => csr_type(0x2, rd, reg(rs1)?, csr)?,
        Csrrc { rd, rs1, csr } => csr_type(0x3, rd, reg(rs1)?, csr)?,
        Csrrwi { rd, uimm, csr } => csr_type(0x5, rd, uimm5(uimm)?, csr)?,
        Csrrsi { rd, uimm, csr } => csr_type(0x6, rd, uimm5(uimm)?, csr)?,
        Csrrci { rd, uimm, csr } => csr_type(0x7, rd, uimm5(uimm)?, csr)?,
    })
}

fn reg(r: usize) -> Result<u32, AsmError> {
    if r < 32 { Ok(r as u32) } else { Err(AsmError::InvalidRegister(r)) }
}

fn uimm5(v: u8) -> Result<u32, AsmError> {
    if v < 32 {
        Ok(v as u32)
    } else {
        Err(AsmError::ImmediateOutOfRange { field: "uimm5", value: v as i64 })
    }
}

fn check_signed(field: &'static str, value: i32, bits: u32) -> Result<u32, AsmError> {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if (value as i64) < min || (value as i64) > max {
        return Err(AsmError::ImmediateOutOfRange { field, value: value as i64 });
    }
    Ok(value as u32 & ((1 << bits) - 1))
}

fn check_jump(field: &'static str, offset: i32, bits: u32) -> Result<u32, AsmError> {
    if offset & 0b11 != 0 {
        return Err(AsmError::MisalignedOffset { offset: offset as i64 });
    }
    check_signed(field, offset, bits)
}

fn r_type(funct3: u32, funct7: u32, rd: usize, rs1: usize, rs2: usize) -> Result<u32, AsmError> {
    Ok((funct7 << 25)
        | (reg(rs2)? << 20)
        | (reg(rs1)? << 15)
        | (funct3 << 12)
        | (reg(rd)? << 7)
        | Opcode::Op as u32)
}

fn i_type(op: Opcode, funct3: u32, rd: usize, rs1: usize, imm: i32) -> Result<u32, AsmError> {
    let imm = check_signed("imm12", imm, 12)?;
    Ok((imm << 20) | (reg(rs1)? << 15) | (funct3 << 12) | (reg(rd)? << 7) | op as u32)
}

fn shift(funct3: u32, funct6: u32, rd: usize, rs1: usize, shamt: u8) -> Result<u32, AsmError> {
    if shamt >= 64 {
        return Err(AsmError::ImmediateOutOfRange { field: "shamt", value: shamt as i64 });
    }
    Ok((funct6 << 26)
        | ((shamt as u32) << 20)
        | (reg(rs1)? << 15)
        | (funct3 << 12)
        | (reg(rd)? << 7)
        | Opcode::OpImm as u32)
}

fn s_type(funct3: u32, rs1: usize, rs2: usize, offset: i32) -> Result<u32, AsmError> {
    let imm = check_signed("imm12", offset, 12)?;
    Ok(((imm >> 5) << 25)
        | (reg(rs2)? << 20)
        | (reg(rs1)? << 15)
        | (funct3 << 12)
        | ((imm & 0x1f) << 7)
        | Opcode::Store as u32)
}

fn b_type(funct3: u32, rs1: usize, rs2: usize, offset: i32) -> Result<u32, AsmError> {
    let imm = check_jump("branch offset", offset, 13)?;
    Ok((((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (reg(rs2)? << 20)
        | (reg(rs1)? << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | Opcode::Branch as u32)
}

fn u_type(op: Opcode, rd: usize, imm: i32) -> Result<u32, AsmError> {
    // Accept both the signed and the raw unsigned view of the 20-bit field.
    if !(-(1 << 19)..(1 << 20)).contains(&imm) {
        return Err(AsmError::ImmediateOutOfRange { field: "imm20", value: imm as i64 });
    }
    Ok(((imm as u32 & 0xfffff) << 12) | (reg(rd)? << 7) | op as u32)
}

fn j_type(rd: usize, offset: i32) -> Result<u32, AsmError> {
    let imm = check_jump("jump offset", offset, 21)?;
    Ok((((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | (reg(rd)? << 7)
        | Opcode::Jal as u32)
}

fn csr_type(funct3: u32, rd: usize, src: u32, csr: u16) -> Result<u32, AsmError> {
    if csr > 0xfff {
        return Err(AsmError::ImmediateOutOfRange { field: "csr", value: csr as i64 });
    }
    Ok(((csr as u32) << 20) | (src << 15) | (funct3 << 12) | (reg(rd)? << 7) | Opcode::System as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm::decode_full;

    #[test]
    fn matches_reference_encodings() {
        let cases = [
            (Instruction::Addi { rd: 1, rs1: 0, imm: 5 }, 0x00500093),
            (Instruction::Jal { rd: 0, offset: 0 }, 0x0000006f),
            (Instruction::Bne { rs1: 5, rs2: 0, offset: -4 }, 0xfe029ee3),
            (Instruction::Csrrs { rd: 10, rs1: 0, csr: 0xf14 }, 0xf1402573),
            (Instruction::Csrrci { rd: 0, uimm: 8, csr: 0x300 }, 0x30047073),
            (Instruction::Slli { rd: 5, rs1: 5, shamt: 31 }, 0x01f29293),
            (Instruction::Sd { rs1: 2, rs2: 5, offset: 0 }, 0x00513023),
            (Instruction::Jalr { rd: 0, rs1: 5, offset: 0 }, 0x00028067),
            (Instruction::Wfi, 0x10500073),
        ];
        for (instr, word) in cases {
            assert_eq!(encode(&instr), Ok(word), "{}", instr.pretty_print());
        }
    }

    #[test]
    fn decoder_inverts_encoder() {
        let samples = [
            Instruction::Lui { rd: 5, imm: -1 },
            Instruction::Auipc { rd: 5, imm: 1 },
            Instruction::Jal { rd: 1, offset: -1048576 },
            Instruction::Beq { rs1: 1, rs2: 2, offset: 4094 & !3 },
            Instruction::Sw { rs1: 2, rs2: 8, offset: -2048 },
            Instruction::Srai { rd: 3, rs1: 4, shamt: 63 },
            Instruction::Addiw { rd: 5, rs1: 5, imm: -2047 },
            Instruction::Sub { rd: 1, rs1: 2, rs2: 3 },
            Instruction::Csrrw { rd: 0, rs1: 5, csr: 0x305 },
            Instruction::Mret,
        ];
        for instr in samples {
            let word = encode(&instr).unwrap();
            assert_eq!(decode_full(word), Some(instr), "{word:#010x}");
        }
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(encode(&Instruction::Addi { rd: 1, rs1: 0, imm: 2048 }).is_err());
        assert!(encode(&Instruction::Jal { rd: 0, offset: 2 }).is_err());
        assert!(encode(&Instruction::Slli { rd: 1, rs1: 1, shamt: 64 }).is_err());
        assert_eq!(
            encode(&Instruction::Add { rd: 32, rs1: 0, rs2: 0 }),
            Err(AsmError::InvalidRegister(32))
        );
    }
}
