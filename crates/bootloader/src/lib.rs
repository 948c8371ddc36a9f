//! The boot stages: firmware, Stage 1 and Stage 2, plus dispatch to the
//! kernel builder so the whole chain is produced through [`build_stage`].
//!
//! Each stage is generated from the shared [`BootLayout`], so every absolute
//! jump target and the stack top are read from one table instead of being
//! repeated per stage.
//!
//! - firmware (reset vector): installs the trap sink, forces bare
//!   addressing, sets the stack and jumps to Stage 1
//! - Stage 1: re-establishes the stack, masks interrupts, passes the hart
//!   id and an empty device-tree pointer to Stage 2
//! - Stage 2: prints its banner, busy-waits, clears the hand-off registers
//!   and enters the kernel

use std::fmt;

use assembler::{AsmError, BootImage};
use types::{BootLayout, LayoutError, Stage};

pub mod firmware;
pub mod stage1;
pub mod stage2;

/// Symbol at the firmware entry point.
pub const START_SYMBOL: &str = "_start";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    Layout(LayoutError),
    Assembly(AsmError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Layout(e) => write!(f, "invalid boot layout: {e}"),
            BuildError::Assembly(e) => write!(f, "assembly failed: {e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Layout(e) => Some(e),
            BuildError::Assembly(e) => Some(e),
        }
    }
}

impl From<LayoutError> for BuildError {
    fn from(e: LayoutError) -> Self {
        BuildError::Layout(e)
    }
}

impl From<AsmError> for BuildError {
    fn from(e: AsmError) -> Self {
        BuildError::Assembly(e)
    }
}

/// Builds one stage of the chain for `layout`.
pub fn build_stage(stage: Stage, layout: &BootLayout) -> Result<BootImage, BuildError> {
    layout.validate()?;
    let image = match stage {
        Stage::Firmware => firmware::build(layout)?,
        Stage::Stage1 => stage1::build(layout)?,
        Stage::Stage2 => stage2::build(layout)?,
        Stage::Kernel => kernel::build(layout)?,
    };
    image.check_fits(&layout.region(stage))?;
    log::info!(
        "built {} at {:#x}: {} bytes",
        stage,
        image.base,
        image.len()
    );
    Ok(image)
}
