use types::ArgRegister;

/// Integer register file indices with their ABI roles.
///
/// The boot chain only relies on a handful of them: `sp` for the shared
/// stack, `t0` as the jump scratch register, `a0`/`a1` for the hand-off
/// arguments and `a6`/`a7` as console-call selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Zero = 0, // x0: hardwired zero
    Ra = 1,   // x1: return address
    Sp = 2,   // x2: stack pointer
    Gp = 3,   // x3: global pointer
    Tp = 4,   // x4: thread pointer

    T0 = 5, // x5: jump scratch / delay counter
    T1 = 6, // x6: temporary register
    T2 = 7, // x7: temporary register

    S0 = 8, // x8: saved register / frame pointer
    S1 = 9, // x9: saved register

    A0 = 10, // x10: hart id on hand-off, console character
    A1 = 11, // x11: device-tree pointer on hand-off
    A2 = 12, // x12: argument 2
    A3 = 13, // x13: argument 3
    A4 = 14, // x14: argument 4
    A5 = 15, // x15: argument 5
    A6 = 16, // x16: console function selector
    A7 = 17, // x17: console extension selector

    S2 = 18,  // x18: saved register
    S3 = 19,  // x19: saved register
    S4 = 20,  // x20: saved register
    S5 = 21,  // x21: saved register
    S6 = 22,  // x22: saved register
    S7 = 23,  // x23: saved register
    S8 = 24,  // x24: saved register
    S9 = 25,  // x25: saved register
    S10 = 26, // x26: saved register
    S11 = 27, // x27: saved register

    T3 = 28, // x28: temporary register
    T4 = 29, // x29: temporary register
    T5 = 30, // x30: temporary register
    T6 = 31, // x31: temporary register
}

pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

impl Register {
    pub const fn idx(self) -> usize {
        self as usize
    }

    pub const fn abi_name(self) -> &'static str {
        ABI_NAMES[self as usize]
    }
}

impl From<ArgRegister> for Register {
    fn from(role: ArgRegister) -> Self {
        match role {
            ArgRegister::HartId => Register::A0,
            ArgRegister::DeviceTree => Register::A1,
        }
    }
}

/// ABI name for a raw register index; out-of-range indices print as `x?`.
pub fn abi_name(reg: usize) -> &'static str {
    ABI_NAMES.get(reg).copied().unwrap_or("x?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_off_roles_map_to_argument_registers() {
        for role in [ArgRegister::HartId, ArgRegister::DeviceTree] {
            assert_eq!(Register::from(role).idx(), role.register());
        }
    }
}
