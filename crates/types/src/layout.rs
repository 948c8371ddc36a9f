//! The physical boot layout, defined once and consumed by every stage builder.
//!
//! Each stage jumps to a hard-coded absolute address and every stage loads
//! the same stack top. Rather than repeating those literals per stage they
//! live in a single [`BootLayout`] table which is validated before any image
//! is built. The default table is also checked at compile time.

use static_assertions::const_assert;

use crate::{LayoutError, Stage};

/// A half-open physical address range `[base, base + size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub base: u64,
    pub size: u64,
}

impl Region {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// One past the last byte. Saturates for regions that wrap; those are
    /// rejected by [`BootLayout::validate`].
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    pub const fn overlaps(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// True when `other` lies entirely inside `self`.
    pub const fn encloses(&self, other: &Region) -> bool {
        other.base >= self.base && other.end() <= self.end()
    }

    const fn is_well_formed(&self) -> bool {
        self.size != 0 && self.base.checked_add(self.size).is_some()
    }
}

/// Load addresses, stack placement and build-time constants for the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BootLayout {
    /// Firmware window at the reset vector.
    pub firmware: Region,
    pub stage1: Region,
    pub stage2: Region,
    pub kernel: Region,
    /// Main memory; every post-firmware image and the stack live here.
    pub dram: Region,
    /// Initial stack pointer loaded by every stage. The stack grows down.
    pub stack_top: u64,
    /// Bytes reserved below `stack_top`.
    pub stack_size: u64,
    /// Stage 2 busy-wait iteration count.
    pub delay_iterations: u64,
}

impl BootLayout {
    pub const DEFAULT: BootLayout = BootLayout {
        firmware: Region::new(0x1000, 0x1000),
        stage1: Region::new(0x8000_0000, 0x10_0000),
        stage2: Region::new(0x8010_0000, 0x10_0000),
        kernel: Region::new(0x8020_0000, 0x10_0000),
        dram: Region::new(0x8000_0000, 0x0800_0000),
        stack_top: 0x8800_0000,
        stack_size: 0x1_0000,
        delay_iterations: 0x1_0000,
    };

    pub const fn region(&self, stage: Stage) -> Region {
        match stage {
            Stage::Firmware => self.firmware,
            Stage::Stage1 => self.stage1,
            Stage::Stage2 => self.stage2,
            Stage::Kernel => self.kernel,
        }
    }

    /// Entry point of a stage: the first byte of its image.
    pub const fn entry(&self, stage: Stage) -> u64 {
        self.region(stage).base
    }

    /// The stack range below `stack_top`.
    pub const fn stack(&self) -> Region {
        Region::new(self.stack_top.saturating_sub(self.stack_size), self.stack_size)
    }

    /// The stage whose image window contains `addr`.
    pub fn stage_at(&self, addr: u64) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|&stage| self.region(stage).contains(addr))
    }

    /// Checks every invariant the hard-coded jumps rely on.
    pub const fn validate(&self) -> Result<(), LayoutError> {
        let stages = Stage::ALL;

        let mut i = 0;
        while i < stages.len() {
            let stage = stages[i];
            let region = self.region(stage);
            if !region.is_well_formed() {
                return Err(LayoutError::InvalidRegion { stage });
            }
            if region.base & 0b11 != 0 {
                return Err(LayoutError::MisalignedEntry { stage, base: region.base });
            }
            if i == 0 && region.overlaps(&self.dram) {
                return Err(LayoutError::FirmwareInDram);
            }
            if i > 0 && !self.dram.encloses(&region) {
                return Err(LayoutError::OutsideDram { stage });
            }
            i += 1;
        }

        let mut i = 0;
        while i < stages.len() {
            let mut j = i + 1;
            while j < stages.len() {
                let a = self.region(stages[i]);
                let b = self.region(stages[j]);
                if a.overlaps(&b) {
                    return Err(LayoutError::Overlap { first: stages[i], second: stages[j] });
                }
                if b.base < a.base {
                    return Err(LayoutError::OutOfOrder { first: stages[i], second: stages[j] });
                }
                j += 1;
            }
            i += 1;
        }

        if self.stack_top == 0
            || self.stack_top & 0xf != 0
            || self.stack_size == 0
            || self.stack_size > self.stack_top
        {
            return Err(LayoutError::InvalidStackTop(self.stack_top));
        }
        let stack = self.stack();
        if !self.dram.encloses(&stack) {
            return Err(LayoutError::InvalidStackTop(self.stack_top));
        }
        let mut i = 0;
        while i < stages.len() {
            if stack.overlaps(&self.region(stages[i])) {
                return Err(LayoutError::StackOverlaps { stage: stages[i] });
            }
            i += 1;
        }

        if self.delay_iterations == 0 {
            return Err(LayoutError::ZeroDelay);
        }
        Ok(())
    }
}

impl Default for BootLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const_assert!(BootLayout::DEFAULT.validate().is_ok());
const_assert!(BootLayout::DEFAULT.firmware.base == 0x1000);
const_assert!(BootLayout::DEFAULT.stage1.base == 0x8000_0000);
const_assert!(BootLayout::DEFAULT.stage2.base == 0x8010_0000);
const_assert!(BootLayout::DEFAULT.kernel.base == 0x8020_0000);
