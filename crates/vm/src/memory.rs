use std::fmt;

/// A named block of RAM mapped at a fixed physical base.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub name: String,
    pub base: u64,
    data: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, base: u64, size: usize) -> Self {
        Self { name: name.into(), base, data: vec![0u8; size] }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn end(&self) -> u64 {
        self.base + self.size()
    }

    /// Offset of `[addr, addr + len)` inside this region, if fully contained.
    fn offset(&self, addr: u64, len: u64) -> Option<usize> {
        let start = addr.checked_sub(self.base)?;
        let end = start.checked_add(len)?;
        (end <= self.size()).then_some(start as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A new region would alias an existing one.
    Overlap { name: String, existing: String },
    /// A bulk access touched unmapped memory.
    Unmapped { addr: u64, len: u64 },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Overlap { name, existing } => {
                write!(f, "region '{name}' overlaps existing region '{existing}'")
            }
            BusError::Unmapped { addr, len } => {
                write!(f, "{len} bytes at {addr:#x} are not backed by memory")
            }
        }
    }
}

impl std::error::Error for BusError {}

/// Physical address space of the machine: a flat list of RAM regions.
///
/// There is no MMU in front of the bus; the hart only ever runs with `satp`
/// in bare mode. Anything outside a region is an access fault.
#[derive(Debug, Clone, Default)]
pub struct Bus {
    regions: Vec<MemoryRegion>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, name: impl Into<String>, base: u64, size: usize) -> Result<(), BusError> {
        let region = MemoryRegion::new(name, base, size);
        if let Some(existing) = self
            .regions
            .iter()
            .find(|r| region.base < r.end() && r.base < region.end())
        {
            return Err(BusError::Overlap { name: region.name, existing: existing.name.clone() });
        }
        self.regions.push(region);
        Ok(())
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn is_mapped(&self, addr: u64) -> bool {
        self.slice(addr, 1).is_some()
    }

    /// Borrow `len` bytes starting at `addr`. The range must not straddle
    /// two regions.
    pub fn slice(&self, addr: u64, len: u64) -> Option<&[u8]> {
        self.regions.iter().find_map(|r| {
            let off = r.offset(addr, len)?;
            Some(&r.data[off..off + len as usize])
        })
    }

    fn slice_mut(&mut self, addr: u64, len: u64) -> Option<&mut [u8]> {
        self.regions.iter_mut().find_map(|r| {
            let off = r.offset(addr, len)?;
            Some(&mut r.data[off..off + len as usize])
        })
    }

    /// Copies an image into memory.
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), BusError> {
        let len = bytes.len() as u64;
        let dst = self.slice_mut(addr, len).ok_or(BusError::Unmapped { addr, len })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    pub fn fetch(&self, addr: u64) -> Option<u32> {
        self.load(addr, 4).map(|v| v as u32)
    }

    /// Little-endian load of `width` bytes, zero-extended.
    pub fn load(&self, addr: u64, width: u64) -> Option<u64> {
        let bytes = self.slice(addr, width)?;
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(u64::from_le_bytes(buf))
    }

    /// Little-endian store of the low `width` bytes of `value`.
    pub fn store(&mut self, addr: u64, width: u64, value: u64) -> Option<()> {
        let dst = self.slice_mut(addr, width)?;
        let len = dst.len();
        dst.copy_from_slice(&value.to_le_bytes()[..len]);
        Some(())
    }

    /// Hex dump of a memory range, `None` when the range is unmapped.
    pub fn dump(&self, addr: u64, len: u64) -> Option<String> {
        let bytes = self.slice(addr, len)?;
        let mut out = String::new();
        for (i, chunk) in bytes.chunks(16).enumerate() {
            out.push_str(&format!("{:#010x}: {}\n", addr + (i as u64) * 16, hex::encode(chunk)));
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlapping_regions() {
        let mut bus = Bus::new();
        bus.map("rom", 0x1000, 0x1000).unwrap();
        assert_eq!(
            bus.map("bad", 0x1800, 0x1000),
            Err(BusError::Overlap { name: "bad".into(), existing: "rom".into() })
        );
    }

    #[test]
    fn little_endian_access() {
        let mut bus = Bus::new();
        bus.map("ram", 0x8000_0000, 0x100).unwrap();
        bus.store(0x8000_0000, 8, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(bus.load(0x8000_0000, 1), Some(0x88));
        assert_eq!(bus.load(0x8000_0004, 4), Some(0x1122_3344));
        assert_eq!(bus.load(0x8000_00fc, 8), None);
        assert!(!bus.is_mapped(0x0));
    }
}
