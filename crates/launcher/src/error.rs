use std::fmt;
use std::io;
use std::path::PathBuf;

use assembler::AsmError;
use bootloader::BuildError;
use types::{LayoutError, Stage};
use vm::BusError;

/// Everything that can stop the chain from being built, stored or loaded.
#[derive(Debug)]
pub enum LaunchError {
    Layout(LayoutError),
    /// A layout override file could not be parsed.
    LayoutFile { path: PathBuf, source: serde_json::Error },
    Asm(AsmError),
    Io { path: PathBuf, source: io::Error },
    /// An `.elf` image on disk is malformed or sits at the wrong address.
    Elf { path: PathBuf, source: AsmError },
    ImageTooLarge { stage: Stage, size: u64, capacity: u64 },
    /// Neither `<stem>.bin` nor `<stem>.elf` exists for a stage.
    MissingImage { stage: Stage, dir: PathBuf },
    /// The machine could not map a region or place an image.
    Bus(BusError),
}

impl LaunchError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LaunchError::Io { path: path.into(), source }
    }
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::Layout(e) => write!(f, "invalid boot layout: {e}"),
            LaunchError::LayoutFile { path, source } => {
                write!(f, "cannot parse layout file {}: {source}", path.display())
            }
            LaunchError::Asm(e) => write!(f, "assembly failed: {e}"),
            LaunchError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            LaunchError::Elf { path, source } => write!(f, "bad ELF image {}: {source}", path.display()),
            LaunchError::ImageTooLarge { stage, size, capacity } => write!(
                f,
                "{stage} image is {size} bytes but its region holds {capacity}"
            ),
            LaunchError::MissingImage { stage, dir } => write!(
                f,
                "no {}.bin or {}.elf in {}",
                stage.file_stem(),
                stage.file_stem(),
                dir.display()
            ),
            LaunchError::Bus(e) => write!(f, "machine setup failed: {e}"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Layout(e) => Some(e),
            LaunchError::LayoutFile { source, .. } => Some(source),
            LaunchError::Asm(e) => Some(e),
            LaunchError::Io { source, .. } => Some(source),
            LaunchError::Elf { source, .. } => Some(source),
            LaunchError::Bus(e) => Some(e),
            LaunchError::ImageTooLarge { .. } | LaunchError::MissingImage { .. } => None,
        }
    }
}

impl From<LayoutError> for LaunchError {
    fn from(e: LayoutError) -> Self {
        LaunchError::Layout(e)
    }
}

impl From<AsmError> for LaunchError {
    fn from(e: AsmError) -> Self {
        match e {
            AsmError::ImageTooLarge { stage, size, capacity } => {
                LaunchError::ImageTooLarge { stage, size, capacity }
            }
            other => LaunchError::Asm(other),
        }
    }
}

impl From<BuildError> for LaunchError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Layout(e) => e.into(),
            BuildError::Assembly(e) => e.into(),
        }
    }
}

impl From<BusError> for LaunchError {
    fn from(e: BusError) -> Self {
        LaunchError::Bus(e)
    }
}
