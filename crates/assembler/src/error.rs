use std::fmt;

use types::Stage;

/// Everything that can go wrong while turning a program into an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An immediate does not fit its encoding field.
    ImmediateOutOfRange { field: &'static str, value: i64 },
    /// A branch or jump offset is not a multiple of the instruction size.
    MisalignedOffset { offset: i64 },
    /// Register index above x31.
    InvalidRegister(usize),
    UndefinedLabel(String),
    DuplicateLabel(String),
    /// The generated code does not fit the stage's region.
    ImageTooLarge { stage: Stage, size: u64, capacity: u64 },
    /// A file could not be read back as a boot image.
    InvalidElf(String),
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::ImmediateOutOfRange { field, value } => {
                write!(f, "immediate {value:#x} does not fit the {field} field")
            }
            AsmError::MisalignedOffset { offset } => write!(f, "offset {offset} is not 4-byte aligned"),
            AsmError::InvalidRegister(r) => write!(f, "no such register x{r}"),
            AsmError::UndefinedLabel(l) => write!(f, "undefined label '{l}'"),
            AsmError::DuplicateLabel(l) => write!(f, "label '{l}' defined twice"),
            AsmError::ImageTooLarge { stage, size, capacity } => {
                write!(f, "{stage} image is {size} bytes but its region holds {capacity}")
            }
            AsmError::InvalidElf(msg) => write!(f, "invalid boot image: {msg}"),
        }
    }
}

impl std::error::Error for AsmError {}

impl From<goblin::error::Error> for AsmError {
    fn from(err: goblin::error::Error) -> Self {
        AsmError::InvalidElf(err.to_string())
    }
}

impl From<scroll::Error> for AsmError {
    fn from(err: scroll::Error) -> Self {
        AsmError::InvalidElf(err.to_string())
    }
}
