//! Boot trace: watches a run and records what each stage handed to the
//! next one.

use std::collections::BTreeMap;

use serde::Serialize;
use types::{csr, BootLayout, HandoffArgs, Stage, TrapSink, TrapSinkError};
use vm::registers::Register;
use vm::{Instruction, Trap, Tracer, CPU};

/// Register snapshot taken when control first reaches a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub pc: u64,
    pub sp: u64,
    /// `a0`/`a1` read as a hand-off record.
    pub args: HandoffArgs,
    /// Instructions retired before the entry.
    pub step: u64,
    /// Reached by taking a trap rather than by a jump.
    pub via_trap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackwardTransition {
    pub from: Stage,
    pub to: Stage,
    /// The instruction that made the jump.
    pub pc: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrapRecord {
    pub pc: u64,
    pub mcause: u64,
    pub mtval: u64,
    /// Where the hart went.
    pub handler: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub instructions: u64,
    pub memory_accesses: u64,
    pub traps: u64,
}

#[derive(Debug, Clone)]
pub struct BootTrace {
    layout: BootLayout,
    current: Option<Stage>,
    entries: Vec<StageEntry>,
    backward: Vec<BackwardTransition>,
    /// Last value each stage wrote to `sp`.
    stack_init: BTreeMap<Stage, u64>,
    /// `mie` at the first instruction that opened `mstatus.MIE`.
    mie_at_enable: Option<u64>,
    gate_open: bool,
    sink: TrapSink,
    sink_errors: Vec<TrapSinkError>,
    traps: Vec<TrapRecord>,
    stats: BTreeMap<Stage, StageStats>,
}

impl BootTrace {
    /// Starts a trace from the machine's current state, which counts as the
    /// entry of whatever stage `cpu.pc` is in.
    pub fn new(layout: BootLayout, cpu: &CPU) -> Self {
        let mut trace = Self {
            layout,
            current: None,
            entries: Vec::new(),
            backward: Vec::new(),
            stack_init: BTreeMap::new(),
            mie_at_enable: None,
            gate_open: cpu.csrs.interrupts_enabled(),
            sink: TrapSink::default(),
            sink_errors: Vec::new(),
            traps: Vec::new(),
            stats: BTreeMap::new(),
        };
        trace.follow(cpu, None, false);
        trace
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    /// First entry into `stage`, if it was reached.
    pub fn entry(&self, stage: Stage) -> Option<&StageEntry> {
        self.entries.iter().find(|e| e.stage == stage)
    }

    pub fn backward_transitions(&self) -> &[BackwardTransition] {
        &self.backward
    }

    pub fn stack_init(&self, stage: Stage) -> Option<u64> {
        self.stack_init.get(&stage).copied()
    }

    pub fn mie_at_enable(&self) -> Option<u64> {
        self.mie_at_enable
    }

    pub fn sink(&self) -> TrapSink {
        self.sink
    }

    /// Attempts to replace the installed trap vector.
    pub fn sink_errors(&self) -> &[TrapSinkError] {
        &self.sink_errors
    }

    pub fn traps(&self) -> &[TrapRecord] {
        &self.traps
    }

    pub fn stats(&self) -> &BTreeMap<Stage, StageStats> {
        &self.stats
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.current
    }

    /// Records a stage change if `cpu.pc` left the current stage.
    fn follow(&mut self, cpu: &CPU, from_pc: Option<u64>, via_trap: bool) {
        let Some(stage) = self.layout.stage_at(cpu.pc) else {
            return;
        };
        if self.current == Some(stage) {
            return;
        }
        if let (Some(previous), Some(pc)) = (self.current, from_pc) {
            if !via_trap && stage < previous {
                log::warn!("backward transition {previous} -> {stage} from {pc:#x}");
                self.backward.push(BackwardTransition { from: previous, to: stage, pc });
            }
        }
        let entry = StageEntry {
            stage,
            pc: cpu.pc,
            sp: cpu.regs[Register::Sp.idx()],
            args: HandoffArgs::from_registers(&cpu.regs),
            step: cpu.retired,
            via_trap,
        };
        log::debug!(
            "-> {} at {:#x}: sp={:#x} a0={:#x} a1={:#x}",
            stage,
            entry.pc,
            entry.sp,
            entry.args.hart_id,
            entry.args.device_tree
        );
        self.entries.push(entry);
        self.current = Some(stage);
    }
}

impl Tracer for BootTrace {
    fn on_retire(&mut self, pc: u64, instruction: &Instruction, cpu: &CPU) {
        let stage = self.layout.stage_at(pc);
        if let Some(stage) = stage {
            let stats = self.stats.entry(stage).or_default();
            stats.instructions += 1;
            if instruction.is_memory_access() {
                stats.memory_accesses += 1;
            }
            if instruction.rd() == Some(Register::Sp.idx()) {
                self.stack_init.insert(stage, cpu.regs[Register::Sp.idx()]);
            }
        }

        if instruction.csr_written() == Some(csr::MTVEC) {
            if let Err(e) = self.sink.install(cpu.csrs.mtvec()) {
                log::warn!("{e}");
                self.sink_errors.push(e);
            }
        }

        // Either a write to mstatus or an mret can open the gate.
        let open = cpu.csrs.interrupts_enabled();
        if open && !self.gate_open && self.mie_at_enable.is_none() {
            self.mie_at_enable = Some(cpu.csrs.mie());
            log::debug!("interrupts enabled at {pc:#x} with mie={:#x}", cpu.csrs.mie());
        }
        self.gate_open = open;

        self.follow(cpu, Some(pc), false);
    }

    fn on_trap(&mut self, pc: u64, trap: &Trap, cpu: &CPU) {
        if let Some(stage) = self.layout.stage_at(pc) {
            self.stats.entry(stage).or_default().traps += 1;
        }
        self.traps.push(TrapRecord {
            pc,
            mcause: trap.cause(),
            mtval: trap.tval(),
            handler: cpu.pc,
        });
        self.gate_open = cpu.csrs.interrupts_enabled();
        self.follow(cpu, Some(pc), true);
    }
}
