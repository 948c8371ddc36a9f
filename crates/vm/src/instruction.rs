use crate::registers::abi_name;

/// The RV64I + Zicsr + machine-mode subset executed by the machine model.
///
/// Each variant corresponds to one decoded 32-bit instruction word. The same
/// enum is the input of the assembler's encoder, so whatever the boot stages
/// are built from is exactly what the machine can execute.
///
/// IMMEDIATE CONVENTIONS:
/// - `imm` on I-type variants is the sign-extended 12-bit immediate
/// - `imm` on `Lui`/`Auipc` is the signed 20-bit upper immediate before the
///   shift by 12
/// - `offset` on branches and jumps is the byte offset from the
///   instruction's own address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // ===== RV64I =====
    /// Load upper immediate: rd = sext(imm << 12)
    Lui { rd: usize, imm: i32 },
    /// Add upper immediate to PC: rd = pc + sext(imm << 12)
    Auipc { rd: usize, imm: i32 },

    /// Jump and link: rd = pc + 4; pc += offset
    Jal { rd: usize, offset: i32 },
    /// Jump and link register: rd = pc + 4; pc = (rs1 + offset) & !1
    Jalr { rd: usize, rs1: usize, offset: i32 },

    /// Branch if equal
    Beq { rs1: usize, rs2: usize, offset: i32 },
    /// Branch if not equal
    Bne { rs1: usize, rs2: usize, offset: i32 },
    /// Branch if less than (signed)
    Blt { rs1: usize, rs2: usize, offset: i32 },
    /// Branch if greater or equal (signed)
    Bge { rs1: usize, rs2: usize, offset: i32 },
    /// Branch if less than (unsigned)
    Bltu { rs1: usize, rs2: usize, offset: i32 },
    /// Branch if greater or equal (unsigned)
    Bgeu { rs1: usize, rs2: usize, offset: i32 },

    /// Load doubleword
    Ld { rd: usize, rs1: usize, offset: i32 },
    /// Load word, sign-extended
    Lw { rd: usize, rs1: usize, offset: i32 },
    /// Load word, zero-extended
    Lwu { rd: usize, rs1: usize, offset: i32 },
    /// Load byte, zero-extended
    Lbu { rd: usize, rs1: usize, offset: i32 },
    /// Store doubleword
    Sd { rs1: usize, rs2: usize, offset: i32 },
    /// Store word
    Sw { rs1: usize, rs2: usize, offset: i32 },
    /// Store byte
    Sb { rs1: usize, rs2: usize, offset: i32 },

    /// Add immediate: rd = rs1 + imm
    Addi { rd: usize, rs1: usize, imm: i32 },
    /// Set less than immediate (signed)
    Slti { rd: usize, rs1: usize, imm: i32 },
    /// Set less than immediate (unsigned compare against sext(imm))
    Sltiu { rd: usize, rs1: usize, imm: i32 },
    /// XOR immediate
    Xori { rd: usize, rs1: usize, imm: i32 },
    /// OR immediate
    Ori { rd: usize, rs1: usize, imm: i32 },
    /// AND immediate
    Andi { rd: usize, rs1: usize, imm: i32 },
    /// Shift left logical immediate, 6-bit shamt
    Slli { rd: usize, rs1: usize, shamt: u8 },
    /// Shift right logical immediate, 6-bit shamt
    Srli { rd: usize, rs1: usize, shamt: u8 },
    /// Shift right arithmetic immediate, 6-bit shamt
    Srai { rd: usize, rs1: usize, shamt: u8 },
    /// Add immediate on the low 32 bits, result sign-extended
    Addiw { rd: usize, rs1: usize, imm: i32 },

    /// Add: rd = rs1 + rs2
    Add { rd: usize, rs1: usize, rs2: usize },
    /// Subtract: rd = rs1 - rs2
    Sub { rd: usize, rs1: usize, rs2: usize },
    /// Shift left logical by rs2[5:0]
    Sll { rd: usize, rs1: usize, rs2: usize },
    /// Set less than (signed)
    Slt { rd: usize, rs1: usize, rs2: usize },
    /// Set less than (unsigned)
    Sltu { rd: usize, rs1: usize, rs2: usize },
    /// XOR
    Xor { rd: usize, rs1: usize, rs2: usize },
    /// Shift right logical by rs2[5:0]
    Srl { rd: usize, rs1: usize, rs2: usize },
    /// Shift right arithmetic by rs2[5:0]
    Sra { rd: usize, rs1: usize, rs2: usize },
    /// OR
    Or { rd: usize, rs1: usize, rs2: usize },
    /// AND
    And { rd: usize, rs1: usize, rs2: usize },

    /// Memory fence; a no-op on this single in-order hart.
    Fence,

    // ===== SYSTEM =====
    /// Environment call: the firmware console call
    Ecall,
    /// Environment break
    Ebreak,
    /// Return from a machine-mode trap
    Mret,
    /// Wait for interrupt
    Wfi,

    // ===== Zicsr =====
    /// Atomic read/write CSR
    Csrrw { rd: usize, rs1: usize, csr: u16 },
    /// Atomic read and set bits in CSR
    Csrrs { rd: usize, rs1: usize, csr: u16 },
    /// Atomic read and clear bits in CSR
    Csrrc { rd: usize, rs1: usize, csr: u16 },
    /// Read/write CSR with a 5-bit immediate
    Csrrwi { rd: usize, uimm: u8, csr: u16 },
    /// Set CSR bits from a 5-bit immediate
    Csrrsi { rd: usize, uimm: u8, csr: u16 },
    /// Clear CSR bits from a 5-bit immediate
    Csrrci { rd: usize, uimm: u8, csr: u16 },
}

impl Instruction {
    /// True for the single-instruction self loop `j .`.
    pub fn is_self_jump(&self) -> bool {
        matches!(self, Instruction::Jal { rd: 0, offset: 0 })
    }

    /// The general-purpose register this instruction writes, if any.
    pub fn rd(&self) -> Option<usize> {
        use Instruction::*;
        let rd = match *self {
            Lui { rd, .. } | Auipc { rd, .. } | Jal { rd, .. } | Jalr { rd, .. } => rd,
            Ld { rd, .. } | Lw { rd, .. } | Lwu { rd, .. } | Lbu { rd, .. } => rd,
            Addi { rd, .. } | Slti { rd, .. } | Sltiu { rd, .. } | Xori { rd, .. } => rd,
            Ori { rd, .. } | Andi { rd, .. } | Slli { rd, .. } | Srli { rd, .. } => rd,
            Srai { rd, .. } | Addiw { rd, .. } => rd,
            Add { rd, .. } | Sub { rd, .. } | Sll { rd, .. } | Slt { rd, .. } | Sltu { rd, .. } => rd,
            Xor { rd, .. } | Srl { rd, .. } | Sra { rd, .. } | Or { rd, .. } | And { rd, .. } => rd,
            Csrrw { rd, .. } | Csrrs { rd, .. } | Csrrc { rd, .. } => rd,
            Csrrwi { rd, .. } | Csrrsi { rd, .. } | Csrrci { rd, .. } => rd,
            _ => 0,
        };
        (rd != 0).then_some(rd)
    }

    pub fn is_memory_access(&self) -> bool {
        use Instruction::*;
        matches!(
            self,
            Ld { .. } | Lw { .. } | Lwu { .. } | Lbu { .. } | Sd { .. } | Sw { .. } | Sb { .. }
        )
    }

    /// The CSR this instruction writes, if any. `csrr`-style reads (rs1 = x0
    /// or uimm = 0 on the set/clear forms) do not count as writes.
    pub fn csr_written(&self) -> Option<u16> {
        match *self {
            Instruction::Csrrw { csr, .. } | Instruction::Csrrwi { csr, .. } => Some(csr),
            Instruction::Csrrs { rs1, csr, .. } | Instruction::Csrrc { rs1, csr, .. } if rs1 != 0 => Some(csr),
            Instruction::Csrrsi { uimm, csr, .. } | Instruction::Csrrci { uimm, csr, .. } if uimm != 0 => Some(csr),
            _ => None,
        }
    }

    pub fn pretty_print(&self) -> String {
        fn reg(r: usize) -> &'static str {
            abi_name(r)
        }
        fn csr(c: u16) -> String {
            match types::csr::name(c) {
                Some(name) => name.to_string(),
                None => format!("{:#x}", c),
            }
        }
        match *self {
            Instruction::Lui { rd, imm } => format!("lui   {}, {:#x}", reg(rd), imm & 0xfffff),
            Instruction::Auipc { rd, imm } => format!("auipc {}, {:#x}", reg(rd), imm & 0xfffff),
            Instruction::Jal { rd: 0, offset } => format!("j     pc{:+}", offset),
            Instruction::Jal { rd, offset } => format!("jal   {}, pc{:+}", reg(rd), offset),
            Instruction::Jalr { rd: 0, rs1, offset: 0 } => format!("jr    {}", reg(rs1)),
            Instruction::Jalr { rd, rs1, offset } => format!("jalr  {}, {}({})", reg(rd), offset, reg(rs1)),
            Instruction::Beq { rs1, rs2, offset } => format!("beq   {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Bne { rs1, rs2: 0, offset } => format!("bnez  {}, pc{:+}", reg(rs1), offset),
            Instruction::Bne { rs1, rs2, offset } => format!("bne   {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Blt { rs1, rs2, offset } => format!("blt   {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Bge { rs1, rs2, offset } => format!("bge   {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Bltu { rs1, rs2, offset } => format!("bltu  {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Bgeu { rs1, rs2, offset } => format!("bgeu  {}, {}, pc{:+}", reg(rs1), reg(rs2), offset),
            Instruction::Ld { rd, rs1, offset } => format!("ld    {}, {}({})", reg(rd), offset, reg(rs1)),
            Instruction::Lw { rd, rs1, offset } => format!("lw    {}, {}({})", reg(rd), offset, reg(rs1)),
            Instruction::Lwu { rd, rs1, offset } => format!("lwu   {}, {}({})", reg(rd), offset, reg(rs1)),
            Instruction::Lbu { rd, rs1, offset } => format!("lbu   {}, {}({})", reg(rd), offset, reg(rs1)),
            Instruction::Sd { rs1, rs2, offset } => format!("sd    {}, {}({})", reg(rs2), offset, reg(rs1)),
            Instruction::Sw { rs1, rs2, offset } => format!("sw    {}, {}({})", reg(rs2), offset, reg(rs1)),
            Instruction::Sb { rs1, rs2, offset } => format!("sb    {}, {}({})", reg(rs2), offset, reg(rs1)),
            Instruction::Addi { rd, rs1: 0, imm } => format!("li    {}, {}", reg(rd), imm),
            Instruction::Addi { rd, rs1, imm } => format!("addi  {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Slti { rd, rs1, imm } => format!("slti  {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Sltiu { rd, rs1, imm } => format!("sltiu {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Xori { rd, rs1, imm } => format!("xori  {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Ori { rd, rs1, imm } => format!("ori   {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Andi { rd, rs1, imm } => format!("andi  {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Slli { rd, rs1, shamt } => format!("slli  {}, {}, {}", reg(rd), reg(rs1), shamt),
            Instruction::Srli { rd, rs1, shamt } => format!("srli  {}, {}, {}", reg(rd), reg(rs1), shamt),
            Instruction::Srai { rd, rs1, shamt } => format!("srai  {}, {}, {}", reg(rd), reg(rs1), shamt),
            Instruction::Addiw { rd, rs1, imm } => format!("addiw {}, {}, {}", reg(rd), reg(rs1), imm),
            Instruction::Add { rd, rs1, rs2 } => format!("add   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Sub { rd, rs1, rs2 } => format!("sub   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Sll { rd, rs1, rs2 } => format!("sll   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Slt { rd, rs1, rs2 } => format!("slt   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Sltu { rd, rs1, rs2 } => format!("sltu  {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Xor { rd, rs1, rs2 } => format!("xor   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Srl { rd, rs1, rs2 } => format!("srl   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Sra { rd, rs1, rs2 } => format!("sra   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Or { rd, rs1, rs2 } => format!("or    {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::And { rd, rs1, rs2 } => format!("and   {}, {}, {}", reg(rd), reg(rs1), reg(rs2)),
            Instruction::Fence => "fence".to_string(),
            Instruction::Ecall => "ecall".to_string(),
            Instruction::Ebreak => "ebreak".to_string(),
            Instruction::Mret => "mret".to_string(),
            Instruction::Wfi => "wfi".to_string(),
            Instruction::Csrrs { rd, rs1: 0, csr: c } => format!("csrr  {}, {}", reg(rd), csr(c)),
            Instruction::Csrrw { rd: 0, rs1, csr: c } => format!("csrw  {}, {}", csr(c), reg(rs1)),
            Instruction::Csrrs { rd: 0, rs1, csr: c } => format!("csrs  {}, {}", csr(c), reg(rs1)),
            Instruction::Csrrc { rd: 0, rs1, csr: c } => format!("csrc  {}, {}", csr(c), reg(rs1)),
            Instruction::Csrrw { rd, rs1, csr: c } => format!("csrrw {}, {}, {}", reg(rd), csr(c), reg(rs1)),
            Instruction::Csrrs { rd, rs1, csr: c } => format!("csrrs {}, {}, {}", reg(rd), csr(c), reg(rs1)),
            Instruction::Csrrc { rd, rs1, csr: c } => format!("csrrc {}, {}, {}", reg(rd), csr(c), reg(rs1)),
            Instruction::Csrrsi { rd: 0, uimm, csr: c } => format!("csrsi {}, {}", csr(c), uimm),
            Instruction::Csrrci { rd: 0, uimm, csr: c } => format!("csrci {}, {}", csr(c), uimm),
            Instruction::Csrrwi { rd, uimm, csr: c } => format!("csrrwi {}, {}, {}", reg(rd), csr(c), uimm),
            Instruction::Csrrsi { rd, uimm, csr: c } => format!("csrrsi {}, {}, {}", reg(rd), csr(c), uimm),
            Instruction::Csrrci { rd, uimm, csr: c } => format!("csrrci {}, {}, {}", reg(rd), csr(c), uimm),
        }
    }
}
