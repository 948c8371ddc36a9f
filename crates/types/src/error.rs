use core::fmt;

use crate::Stage;

/// Reasons a [`BootLayout`](crate::BootLayout) is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// A stage entry address is not 4-byte aligned.
    MisalignedEntry { stage: Stage, base: u64 },
    /// A region is empty or wraps the address space.
    InvalidRegion { stage: Stage },
    /// Two stage images would overlap.
    Overlap { first: Stage, second: Stage },
    /// Stages must be laid out at increasing addresses so the PC only moves up.
    OutOfOrder { first: Stage, second: Stage },
    /// The firmware ROM window intersects DRAM.
    FirmwareInDram,
    /// A post-firmware stage lies outside DRAM.
    OutsideDram { stage: Stage },
    /// The stack top is zero, misaligned, or outside DRAM.
    InvalidStackTop(u64),
    /// The stack range collides with a stage image.
    StackOverlaps { stage: Stage },
    /// The busy-wait count must be non-zero or the loop never ends.
    ZeroDelay,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::MisalignedEntry { stage, base } => {
                write!(f, "{stage} entry {base:#x} is not 4-byte aligned")
            }
            LayoutError::InvalidRegion { stage } => write!(f, "{stage} region is empty or wraps"),
            LayoutError::Overlap { first, second } => write!(f, "{first} and {second} images overlap"),
            LayoutError::OutOfOrder { first, second } => {
                write!(f, "{second} must be placed above {first}")
            }
            LayoutError::FirmwareInDram => f.write_str("firmware region overlaps DRAM"),
            LayoutError::OutsideDram { stage } => write!(f, "{stage} region lies outside DRAM"),
            LayoutError::InvalidStackTop(top) => write!(f, "invalid stack top {top:#x}"),
            LayoutError::StackOverlaps { stage } => write!(f, "stack overlaps the {stage} image"),
            LayoutError::ZeroDelay => f.write_str("stage2 delay iteration count must be non-zero"),
        }
    }
}

impl core::error::Error for LayoutError {}
