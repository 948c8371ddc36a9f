//! Summary of one boot: how the run ended, what the console saw and which
//! hand-off properties held.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use types::csr::{InterruptBits, SATP_BARE};
use types::{HandoffArgs, Stage};
use vm::{RunOutcome, VM};

use crate::trace::{BootTrace, StageEntry, StageStats, TrapRecord};
use crate::{BootChain, LaunchConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub kind: &'static str,
    pub pc: u64,
    pub stage: Option<Stage>,
    pub symbol: Option<String>,
    /// Set for a double fault.
    pub trap: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self { name, passed, detail: detail.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    pub outcome: OutcomeSummary,
    pub steps: u64,
    pub hart_id: u64,
    pub console: String,
    pub console_hex: String,
    pub entries: Vec<StageEntry>,
    pub traps: Vec<TrapRecord>,
    pub stats: BTreeMap<Stage, StageStats>,
    pub trap_vector: Option<u64>,
    pub checks: Vec<Check>,
}

/// Console bytes a complete boot produces.
pub fn expected_console() -> Vec<u8> {
    Stage::ALL.iter().flat_map(|s| s.banner().iter().copied()).collect()
}

impl BootReport {
    pub fn new(
        chain: &BootChain,
        vm: &VM,
        outcome: RunOutcome,
        trace: &BootTrace,
        config: &LaunchConfig,
    ) -> Self {
        let layout = chain.layout();
        let console = vm.console.contents();
        let (kind, trap) = match outcome {
            RunOutcome::Idle { .. } => ("idle", None),
            RunOutcome::Spinning { .. } => ("spinning", None),
            RunOutcome::StepLimit { .. } => ("step-limit", None),
            RunOutcome::DoubleFault { trap, .. } => ("double-fault", Some(trap.to_string())),
            RunOutcome::Stopped { .. } => ("stopped", None),
        };
        let pc = outcome.pc();
        let summary = OutcomeSummary {
            kind,
            pc,
            stage: layout.stage_at(pc),
            symbol: chain.symbol_at(pc).map(str::to_string),
            trap,
        };

        let mut checks = Vec::new();

        let expected = expected_console();
        checks.push(Check::new(
            "console output",
            console == expected,
            format!(
                "got {:?}, expected {:?}",
                String::from_utf8_lossy(&console),
                String::from_utf8_lossy(&expected)
            ),
        ));

        let idle_in_kernel =
            matches!(outcome, RunOutcome::Idle { .. }) && summary.stage == Some(Stage::Kernel);
        checks.push(Check::new(
            "kernel idle",
            idle_in_kernel,
            format!("{kind} at {pc:#x}"),
        ));

        let backward = trace.backward_transitions();
        checks.push(Check::new(
            "forward-only control flow",
            backward.is_empty(),
            match backward.first() {
                Some(b) => format!("{} -> {} from {:#x}", b.from, b.to, b.pc),
                None => "no stage was re-entered".to_string(),
            },
        ));

        let mut stack_ok = true;
        let mut stack_detail = Vec::new();
        for stage in [Stage::Stage1, Stage::Stage2, Stage::Kernel] {
            let sp = trace.entry(stage).map(|e| e.sp);
            let init = trace.stack_init(stage);
            stack_ok &= sp == Some(layout.stack_top) && init == Some(layout.stack_top);
            stack_detail.push(format!("{stage}: entry {} init {}", hex_opt(sp), hex_opt(init)));
        }
        checks.push(Check::new("stack at entry", stack_ok, stack_detail.join(", ")));

        let stage2 = trace.entry(Stage::Stage2);
        checks.push(Check::new(
            "stage2 arguments",
            stage2.is_some_and(|e| e.args == HandoffArgs::from_stage1(config.hart_id)),
            args_detail(stage2),
        ));
        let kernel = trace.entry(Stage::Kernel);
        checks.push(Check::new(
            "kernel arguments",
            kernel.is_some_and(|e| e.args == HandoffArgs::for_kernel()),
            args_detail(kernel),
        ));

        let mie = trace.mie_at_enable();
        checks.push(Check::new(
            "interrupt sources armed before enable",
            mie.is_some_and(|m| {
                InterruptBits::from_bits_truncate(m).contains(InterruptBits::KERNEL_SOURCES)
            }),
            format!("mie {}", hex_opt(mie)),
        ));

        let vector = trace.sink().vector();
        let handler = chain.symbol(bootloader::firmware::TRAP_HANDLER);
        checks.push(Check::new(
            "single trap sink",
            vector.is_some()
                && trace.sink_errors().is_empty()
                && (handler.is_none() || vector == handler),
            format!("mtvec {}", hex_opt(vector)),
        ));

        let satp = vm.cpu.csrs.satp();
        checks.push(Check::new(
            "bare addressing",
            satp == SATP_BARE,
            format!("satp {satp:#x}"),
        ));

        Self {
            outcome: summary,
            steps: vm.cpu.retired,
            hart_id: config.hart_id,
            console_hex: hex::encode(&console),
            console: String::from_utf8_lossy(&console).into_owned(),
            entries: trace.entries().to_vec(),
            traps: trace.traps().to_vec(),
            stats: trace.stats().clone(),
            trap_vector: vector,
            checks,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn hex_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:#x}"))
}

fn args_detail(entry: Option<&StageEntry>) -> String {
    match entry {
        Some(e) => format!("a0={:#x} a1={:#x}", e.args.hart_id, e.args.device_tree),
        None => "stage not reached".to_string(),
    }
}

impl fmt::Display for BootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.outcome;
        write!(f, "outcome  {} at {:#x}", o.kind, o.pc)?;
        if let Some(stage) = o.stage {
            write!(f, " [{stage}")?;
            if let Some(symbol) = &o.symbol {
                write!(f, " {symbol}")?;
            }
            write!(f, "]")?;
        }
        if let Some(trap) = &o.trap {
            write!(f, " ({trap})")?;
        }
        writeln!(f)?;
        writeln!(f, "steps    {}", self.steps)?;
        writeln!(f, "console  {:?} ({})", self.console, self.console_hex)?;
        writeln!(f)?;

        writeln!(
            f,
            "{:<10} {:>12} {:>12} {:>8} {:>8} {:>12}",
            "stage", "entry", "sp", "a0", "a1", "instructions"
        )?;
        for e in &self.entries {
            let retired = self.stats.get(&e.stage).map_or(0, |s| s.instructions);
            writeln!(
                f,
                "{:<10} {:>#12x} {:>#12x} {:>#8x} {:>#8x} {:>12}{}",
                e.stage.name(),
                e.pc,
                e.sp,
                e.args.hart_id,
                e.args.device_tree,
                retired,
                if e.via_trap { "  (trap)" } else { "" }
            )?;
        }
        for t in &self.traps {
            writeln!(f, "trap at {:#x}: mcause={:#x} mtval={:#x} -> {:#x}", t.pc, t.mcause, t.mtval, t.handler)?;
        }
        writeln!(f)?;

        for c in &self.checks {
            let tag = if c.passed { "ok" } else { "FAIL" };
            writeln!(f, "[{tag:^4}] {:<38} {}", c.name, c.detail)?;
        }
        Ok(())
    }
}
