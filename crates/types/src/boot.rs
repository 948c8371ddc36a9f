//! Boot-time hand-off structures shared between the stages.
//!
//! The values travel in argument registers, not memory, so the record below
//! is a description of what a stage must leave in `a0`/`a1` right before its
//! jump. The receiving stage has to consume them before anything clobbers
//! those registers.

/// Device-tree pointer value meaning "no device tree available".
pub const NO_DEVICE_TREE: u64 = 0;

/// Argument register roles of the stage-to-stage ABI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgRegister {
    /// `a0` (x10): hart identifier.
    HartId,
    /// `a1` (x11): device-tree pointer, or [`NO_DEVICE_TREE`].
    DeviceTree,
}

impl ArgRegister {
    /// Architectural register number backing this role.
    pub const fn register(self) -> usize {
        match self {
            ArgRegister::HartId => 10,
            ArgRegister::DeviceTree => 11,
        }
    }
}

/// Hand-off arguments a stage places in registers immediately before a jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandoffArgs {
    pub hart_id: u64,
    pub device_tree: u64,
}

impl HandoffArgs {
    pub const fn new(hart_id: u64, device_tree: u64) -> Self {
        Self { hart_id, device_tree }
    }

    /// What Stage 1 hands to Stage 2: the running hart and no device tree.
    pub const fn from_stage1(hart_id: u64) -> Self {
        Self::new(hart_id, NO_DEVICE_TREE)
    }

    /// What Stage 2 hands to the kernel. Both registers are reset to zero;
    /// the kernel does not receive Stage 1's hart id.
    pub const fn for_kernel() -> Self {
        Self::new(0, NO_DEVICE_TREE)
    }

    /// Reads the record back from a register file.
    pub fn from_registers(regs: &[u64; 32]) -> Self {
        Self {
            hart_id: regs[ArgRegister::HartId.register()],
            device_tree: regs[ArgRegister::DeviceTree.register()],
        }
    }

    pub const fn get(&self, role: ArgRegister) -> u64 {
        match role {
            ArgRegister::HartId => self.hart_id,
            ArgRegister::DeviceTree => self.device_tree,
        }
    }

    pub const fn has_device_tree(&self) -> bool {
        self.device_tree != NO_DEVICE_TREE
    }
}
