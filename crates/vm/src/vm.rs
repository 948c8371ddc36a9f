use types::csr::InterruptBits;
use types::trap::interrupt;

use crate::console::Console;
use crate::cpu::{Step, CPU};
use crate::instruction::Instruction;
use crate::memory::{Bus, BusError};
use crate::sys_call::FirmwareConsole;
use crate::trap::Trap;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Parked in `wfi` with nothing pending that could wake the hart.
    Idle { pc: u64 },
    /// Executing a `j .` loop that no interrupt can leave.
    Spinning { pc: u64 },
    /// The step budget ran out first.
    StepLimit { pc: u64 },
    /// A trap vectored straight back to the faulting instruction.
    DoubleFault { pc: u64, trap: Trap },
    /// The caller's stop predicate fired before executing `pc`.
    Stopped { pc: u64 },
}

impl RunOutcome {
    pub fn pc(&self) -> u64 {
        match *self {
            RunOutcome::Idle { pc }
            | RunOutcome::Spinning { pc }
            | RunOutcome::StepLimit { pc }
            | RunOutcome::DoubleFault { pc, .. }
            | RunOutcome::Stopped { pc } => pc,
        }
    }
}

/// Observer of everything the hart does during a run.
pub trait Tracer {
    /// Called after the instruction at `pc` retired; `cpu` is the state after it.
    fn on_retire(&mut self, _pc: u64, _instruction: &Instruction, _cpu: &CPU) {}

    /// Called after a trap was taken; `cpu.pc` is already the handler.
    fn on_trap(&mut self, _pc: u64, _trap: &Trap, _cpu: &CPU) {}
}

/// Tracer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl Tracer for NoTrace {}

/// The complete machine: one hart, its bus and the firmware console.
#[derive(Debug)]
pub struct VM {
    pub cpu: CPU,
    pub bus: Bus,
    pub console: Console,
}

impl VM {
    pub fn new(console: Console) -> Self {
        let cpu = CPU::new(Box::new(FirmwareConsole::new(console.clone())));
        Self { cpu, bus: Bus::new(), console }
    }

    pub fn map(&mut self, name: &str, base: u64, size: u64) -> Result<(), BusError> {
        self.bus.map(name, base, size as usize)
    }

    pub fn load_image(&mut self, base: u64, bytes: &[u8]) -> Result<(), BusError> {
        log::debug!("loading {} bytes at {:#x}", bytes.len(), base);
        self.bus.write_bytes(base, bytes)
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.cpu.pc = pc;
    }

    pub fn set_hart_id(&mut self, hart_id: u64) {
        // mhartid is part of the implemented set, so poking it cannot fail.
        let _ = self.cpu.csrs.poke(types::csr::MHARTID, hart_id);
    }

    pub fn run(&mut self, max_steps: u64) -> RunOutcome {
        self.run_with(max_steps, &mut NoTrace, &mut |_| false)
    }

    pub fn run_traced(&mut self, max_steps: u64, tracer: &mut dyn Tracer) -> RunOutcome {
        self.run_with(max_steps, tracer, &mut |_| false)
    }

    /// Runs until `stop` returns true for the state about to execute.
    pub fn run_until(&mut self, max_steps: u64, mut stop: impl FnMut(&CPU) -> bool) -> RunOutcome {
        self.run_with(max_steps, &mut NoTrace, &mut stop)
    }

    pub fn run_with(
        &mut self,
        max_steps: u64,
        tracer: &mut dyn Tracer,
        stop: &mut dyn FnMut(&CPU) -> bool,
    ) -> RunOutcome {
        for _ in 0..max_steps {
            if stop(&self.cpu) {
                return RunOutcome::Stopped { pc: self.cpu.pc };
            }
            match self.cpu.step(&mut self.bus) {
                Step::Retired { pc, instruction } => {
                    tracer.on_retire(pc, &instruction, &self.cpu);
                    if instruction.is_self_jump() && self.cpu.deliverable_interrupt().is_none() {
                        log::info!("hart spinning at {pc:#x}");
                        return RunOutcome::Spinning { pc };
                    }
                }
                Step::Trapped { pc, trap } => {
                    tracer.on_trap(pc, &trap, &self.cpu);
                    if !trap.is_interrupt() && self.cpu.pc == pc {
                        log::warn!("double fault at {pc:#x}: {trap}");
                        return RunOutcome::DoubleFault { pc, trap };
                    }
                }
                Step::Waiting => {
                    log::info!("hart idle at {:#x}", self.cpu.pc);
                    return RunOutcome::Idle { pc: self.cpu.pc };
                }
            }
        }
        RunOutcome::StepLimit { pc: self.cpu.pc }
    }

    /// Raises an interrupt line by its `mcause` code.
    pub fn raise_interrupt(&mut self, code: u64) {
        let bit = match code {
            interrupt::MACHINE_SOFTWARE => InterruptBits::MSI,
            interrupt::MACHINE_TIMER => InterruptBits::MTI,
            interrupt::MACHINE_EXTERNAL => InterruptBits::MEI,
            _ => {
                log::warn!("ignoring unknown interrupt line {code}");
                return;
            }
        };
        self.cpu.csrs.set_pending(bit);
    }

    /// Delivers `trap` at the current pc, as if the next instruction raised it.
    pub fn force_trap(&mut self, trap: Trap) {
        let pc = self.cpu.pc;
        self.cpu.take_trap(trap, pc);
    }

    pub fn register_dump(&self) -> String {
        self.cpu.register_dump()
    }
}
