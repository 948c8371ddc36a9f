use std::fmt::Write as _;

use vm::{decode_full, Instruction};

use crate::BootImage;

/// One disassembled word of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub addr: u64,
    pub word: u32,
    pub instruction: Option<Instruction>,
    /// Labels defined at `addr`.
    pub labels: Vec<String>,
}

impl ListingLine {
    /// Absolute target of a direct jump or branch.
    pub fn target(&self) -> Option<u64> {
        let offset = match self.instruction? {
            Instruction::Jal { offset, .. }
            | Instruction::Beq { offset, .. }
            | Instruction::Bne { offset, .. }
            | Instruction::Blt { offset, .. }
            | Instruction::Bge { offset, .. }
            | Instruction::Bltu { offset, .. }
            | Instruction::Bgeu { offset, .. } => offset,
            _ => return None,
        };
        Some(self.addr.wrapping_add(offset as i64 as u64))
    }
}

pub fn disassemble(image: &BootImage) -> Vec<ListingLine> {
    image
        .words()
        .map(|(addr, word)| ListingLine {
            addr,
            word,
            instruction: decode_full(word),
            labels: image
                .symbols_by_address()
                .into_iter()
                .filter(|(_, a)| *a == addr)
                .map(|(name, _)| name.to_string())
                .collect(),
        })
        .collect()
}

/// objdump-style listing with labels and resolved branch targets.
pub fn render(image: &BootImage) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} @ {:#010x} ({} bytes)",
        image.stage,
        image.base,
        image.len()
    );
    for line in disassemble(image) {
        for label in &line.labels {
            let _ = writeln!(out, "\n{label}:");
        }
        let text = match line.instruction {
            Some(instruction) => instruction.pretty_print(),
            None => "<illegal>".to_string(),
        };
        let _ = write!(
            out,
            "  {:#010x}:  {}  {}",
            line.addr,
            hex::encode(line.word.to_le_bytes()),
            text
        );
        if let Some(target) = line.target() {
            match image.symbol_at(target) {
                Some(name) => {
                    let _ = write!(out, "  # {target:#x} <{name}>");
                }
                None => {
                    let _ = write!(out, "  # {target:#x}");
                }
            }
        }
        out.push('\n');
    }
    out
}

/// `address name` lines sorted by address, in the style of `nm -n`.
pub fn symbol_table(image: &BootImage) -> String {
    image
        .symbols_by_address()
        .into_iter()
        .map(|(name, addr)| format!("{addr:016x} T {name}\n"))
        .collect()
}
