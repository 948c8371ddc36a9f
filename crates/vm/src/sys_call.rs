use types::sbi;

use crate::console::Console;

/// Result of offering an `ecall` to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcallOutcome {
    /// The call was serviced and execution continues after the `ecall`.
    Handled,
    /// Nobody services this selector; the hart takes an environment-call trap.
    Unsupported,
}

/// Trait implemented by the platform services behind `ecall`.
///
/// The handler sees the whole register file so it can read selectors and
/// arguments and write return values, exactly like firmware sitting below
/// the running stage would.
pub trait EcallHandler: std::fmt::Debug {
    fn handle_ecall(&mut self, regs: &mut [u64; 32]) -> EcallOutcome;
}

/// Firmware console service: `a7 = 0`, `a6 = 1`, character in `a0`.
///
/// On success `a0` (error) and `a1` (value) are both cleared. Every other
/// selector pair is left to trap.
#[derive(Debug, Clone, Default)]
pub struct FirmwareConsole {
    console: Console,
}

impl FirmwareConsole {
    pub fn new(console: Console) -> Self {
        Self { console }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }
}

impl EcallHandler for FirmwareConsole {
    fn handle_ecall(&mut self, regs: &mut [u64; 32]) -> EcallOutcome {
        let ext = regs[sbi::EXT_REGISTER];
        let func = regs[sbi::FN_REGISTER];
        if !sbi::is_console_putchar(ext, func) {
            log::debug!("unsupported ecall: a7={ext:#x} a6={func:#x}");
            return EcallOutcome::Unsupported;
        }
        self.console.put(regs[sbi::ARG_REGISTER] as u8);
        regs[sbi::ARG_REGISTER] = sbi::SBI_SUCCESS;
        regs[sbi::VALUE_REGISTER] = 0;
        EcallOutcome::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn putchar_writes_console_and_clears_returns() {
        let console = Console::new();
        let mut handler = FirmwareConsole::new(console.clone());
        let mut regs = [0u64; 32];
        regs[10] = b'K' as u64;
        regs[11] = 0xdead;
        regs[16] = 1;
        assert_eq!(handler.handle_ecall(&mut regs), EcallOutcome::Handled);
        assert_eq!(console.as_string(), "K");
        assert_eq!((regs[10], regs[11]), (0, 0));
    }

    #[test]
    fn other_selectors_are_unsupported() {
        let console = Console::new();
        let mut handler = FirmwareConsole::new(console.clone());
        let mut regs = [0u64; 32];
        regs[17] = 0x10;
        assert_eq!(handler.handle_ecall(&mut regs), EcallOutcome::Unsupported);
        assert!(console.is_empty());
    }
}
