/// Major opcodes (bits 6:0) of the RV64I + Zicsr subset the machine decodes.
///
/// RISC-V INSTRUCTION ENCODING:
/// - Every instruction the boot stages use is 32 bits wide
/// - The bottom 7 bits select the major opcode, which fixes the format
///   (R, I, S, B, U or J) of the remaining bits
/// - Encodings whose low two bits are not `0b11` belong to the compressed
///   extension, which this machine does not implement
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// LOAD (0x03): LD, LW, LWU, LBU
    Load = 0x03,

    /// MISC-MEM (0x0F): FENCE. Memory ordering is trivially satisfied on a
    /// single in-order hart, so it executes as a no-op.
    MiscMem = 0x0f,

    /// OP-IMM (0x13): ADDI, SLTI, SLTIU, XORI, ORI, ANDI, SLLI, SRLI, SRAI
    OpImm = 0x13,

    /// AUIPC (0x17): PC-relative address formation, used for `la`
    Auipc = 0x17,

    /// OP-IMM-32 (0x1B): ADDIW, the second half of a 32-bit `li`
    OpImm32 = 0x1b,

    /// STORE (0x23): SD, SW, SB
    Store = 0x23,

    /// OP (0x33): register-register arithmetic and logic
    Op = 0x33,

    /// LUI (0x37): load upper immediate
    Lui = 0x37,

    /// BRANCH (0x63): BEQ, BNE, BLT, BGE, BLTU, BGEU
    Branch = 0x63,

    /// JALR (0x67): indirect jump, used for every stage hand-off
    Jalr = 0x67,

    /// JAL (0x6F): direct jump, used for the spin and idle loops
    Jal = 0x6f,

    /// SYSTEM (0x73): ECALL, EBREAK, MRET, WFI and the CSR instructions
    System = 0x73,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        use Opcode::*;
        Some(match value {
            0x03 => Load,
            0x0f => MiscMem,
            0x13 => OpImm,
            0x17 => Auipc,
            0x1b => OpImm32,
            0x23 => Store,
            0x33 => Op,
            0x37 => Lui,
            0x63 => Branch,
            0x67 => Jalr,
            0x6f => Jal,
            0x73 => System,
            _ => return None,
        })
    }
}

/// Fixed SYSTEM encodings that carry no operands.
pub const ECALL: u32 = 0x0000_0073;
pub const EBREAK: u32 = 0x0010_0073;
pub const MRET: u32 = 0x3020_0073;
pub const WFI: u32 = 0x1050_0073;
/// `fence iorw, iorw`
pub const FENCE: u32 = 0x0ff0_000f;
