//! In-tree RV64 assembler for the boot stages.
//!
//! Stages are described as Rust code against [`Program`], encoded with the
//! same instruction model the machine executes, and packaged as a
//! [`BootImage`] that can be written as a flat binary or an ELF file.

pub mod elf;
pub use elf::{parse_elf_from_bytes, write_elf};

pub mod encoder;
pub use encoder::encode;

pub mod error;
pub use error::AsmError;

pub mod image;
pub use image::BootImage;

pub mod listing;

pub mod program;
pub use program::Program;
