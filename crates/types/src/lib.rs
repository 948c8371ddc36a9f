#![no_std]
//! Definitions shared by every boot stage and by the host tooling.
//!
//! Everything here is plain data: the physical layout table, the stage
//! sequence, the register hand-off record, CSR bit layouts and the trap-sink
//! state machine. No stage owns these values; they are consumed at image
//! build time so each address is written down exactly once.

pub mod boot;
pub use boot::{ArgRegister, HandoffArgs, NO_DEVICE_TREE};

pub mod csr;

pub mod error;
pub use error::LayoutError;

pub mod layout;
pub use layout::{BootLayout, Region};

pub mod sbi;

pub mod stage;
pub use stage::Stage;

pub mod trap;
pub use trap::{TrapSink, TrapSinkError};
