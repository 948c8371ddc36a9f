use std::collections::BTreeMap;

use types::{Region, Stage};

use crate::AsmError;

/// Position-dependent machine code for one stage plus its symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage {
    pub stage: Stage,
    /// Load address and entry point.
    pub base: u64,
    pub bytes: Vec<u8>,
    pub symbols: BTreeMap<String, u64>,
}

impl BootImage {
    /// Raw bytes as they must appear in memory at `base`.
    pub fn to_flat_binary(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entry(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last byte of code.
    pub fn end(&self) -> u64 {
        self.base + self.len()
    }

    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Symbols sorted by address, ties broken by name.
    pub fn symbols_by_address(&self) -> Vec<(&str, u64)> {
        let mut out: Vec<(&str, u64)> = self.symbols.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
        out
    }

    /// The symbol whose address is exactly `addr`, preferring the first by name.
    pub fn symbol_at(&self, addr: u64) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, v)| **v == addr)
            .map(|(k, _)| k.as_str())
    }

    /// The 32-bit words of the image, with their addresses.
    pub fn words(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.bytes.chunks_exact(4).enumerate().map(move |(i, w)| {
            (self.base + 4 * i as u64, u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        })
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Fails when the code would spill past the stage's region.
    pub fn check_fits(&self, region: &Region) -> Result<(), AsmError> {
        if self.base != region.base || self.len() > region.size {
            return Err(AsmError::ImageTooLarge {
                stage: self.stage,
                size: self.len(),
                capacity: region.size,
            });
        }
        Ok(())
    }
}
