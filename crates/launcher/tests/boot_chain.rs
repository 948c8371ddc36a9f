use std::fs;
use std::ops::Range;
use std::path::PathBuf;

use assembler::AsmError;
use bootloader::{firmware, stage2};
use launcher::{boot_machine, run_chain, BootChain, BootTrace, LaunchConfig, LaunchError};
use types::trap::{exception, interrupt, MCAUSE_INTERRUPT};
use types::{csr, BootLayout, HandoffArgs, LayoutError, Region, Stage};
use vm::{Instruction, RunOutcome, Trap, Tracer, CPU, VM};

fn boot(config: &LaunchConfig) -> (BootChain, VM) {
    let chain = BootChain::build(&BootLayout::DEFAULT).unwrap();
    let vm = boot_machine(&chain, config).unwrap();
    (chain, vm)
}

fn traced_boot(config: &LaunchConfig) -> (BootChain, VM, RunOutcome, BootTrace) {
    let (chain, mut vm) = boot(config);
    let mut trace = BootTrace::new(*chain.layout(), &vm.cpu);
    let outcome = vm.run_traced(config.max_steps, &mut trace);
    (chain, vm, outcome, trace)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bootchain-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn full_boot_prints_s2k_and_idles_in_kernel() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    let outcome = vm.run(LaunchConfig::default().max_steps);

    let idle = chain.symbol(kernel::IDLE).unwrap();
    assert_eq!(outcome, RunOutcome::Idle { pc: idle + 4 });
    assert_eq!(vm.console.contents(), b"S2K");
}

#[test]
fn control_only_moves_forward() {
    let (_, _, _, trace) = traced_boot(&LaunchConfig::default());
    assert!(trace.backward_transitions().is_empty());
    let stages: Vec<Stage> = trace.entries().iter().map(|e| e.stage).collect();
    assert_eq!(stages, Stage::ALL);
    assert!(trace.entries().iter().all(|e| !e.via_trap));
}

#[test]
fn every_stage_starts_on_the_shared_stack() {
    let (chain, _, _, trace) = traced_boot(&LaunchConfig::default());
    let top = chain.layout().stack_top;
    for stage in [Stage::Stage1, Stage::Stage2, Stage::Kernel] {
        let entry = trace.entry(stage).unwrap();
        assert_ne!(entry.sp, 0);
        assert_eq!(entry.sp, top, "sp at {stage} entry");
    }
    for stage in Stage::ALL {
        assert_eq!(trace.stack_init(stage), Some(top), "{stage} stack init");
    }
}

#[test]
fn hand_off_registers_follow_the_protocol() {
    let config = LaunchConfig::default().with_hart_id(3);
    let (_, _, _, trace) = traced_boot(&config);

    let stage2 = trace.entry(Stage::Stage2).unwrap();
    assert_eq!(stage2.args, HandoffArgs::from_stage1(3));
    assert_eq!(stage2.args, HandoffArgs::new(3, 0));

    let kernel = trace.entry(Stage::Kernel).unwrap();
    assert_eq!(kernel.args, HandoffArgs::for_kernel());
    assert!(!kernel.args.has_device_tree());
}

#[test]
fn interrupt_sources_are_armed_before_the_global_enable() {
    let (_, vm, _, trace) = traced_boot(&LaunchConfig::default());
    assert_eq!(trace.mie_at_enable(), Some(0x880));
    assert!(vm.cpu.csrs.interrupts_enabled());
}

#[test]
fn trap_before_stage1_spins_in_the_firmware_sink() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    let stage1 = chain.layout().entry(Stage::Stage1);
    let outcome = vm.run_until(1_000, |cpu| cpu.pc == stage1);
    assert_eq!(outcome, RunOutcome::Stopped { pc: stage1 });

    vm.force_trap(Trap::IllegalInstruction(0));
    let handler = chain.symbol(firmware::TRAP_HANDLER).unwrap();
    assert_eq!(vm.run(10_000), RunOutcome::Spinning { pc: handler });
    assert_eq!(vm.run(10_000), RunOutcome::Spinning { pc: handler });
    assert!(vm.console.is_empty());
    assert_eq!(vm.cpu.csrs.mepc(), stage1);
}

struct LoopCounter {
    addr: u64,
    count: u64,
}

impl Tracer for LoopCounter {
    fn on_retire(&mut self, pc: u64, _instruction: &Instruction, _cpu: &CPU) {
        if pc == self.addr {
            self.count += 1;
        }
    }
}

#[test]
fn delay_loop_runs_exactly_delay_iterations_with_garbage_registers() {
    let mut layout = BootLayout::DEFAULT;
    layout.delay_iterations = 0x123;
    let chain = BootChain::build(&layout).unwrap();
    let mut vm = boot_machine(&chain, &LaunchConfig::default()).unwrap();

    let stage2 = layout.entry(Stage::Stage2);
    vm.run_until(1_000, |cpu| cpu.pc == stage2);
    for (i, reg) in vm.cpu.regs.iter_mut().enumerate().skip(1) {
        *reg = 0xdead_beef_0000_0000 | i as u64;
    }

    let mut counter = LoopCounter {
        addr: chain.symbol(stage2::DELAY_LOOP).unwrap(),
        count: 0,
    };
    let kernel = layout.entry(Stage::Kernel);
    let outcome = vm.run_with(100_000, &mut counter, &mut |cpu: &CPU| cpu.pc == kernel);
    assert_eq!(outcome, RunOutcome::Stopped { pc: kernel });
    assert_eq!(counter.count, 0x123);
    assert_eq!(vm.console.as_string(), "S2");
}

#[test]
fn interrupt_after_idle_lands_in_the_sink() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    assert!(matches!(vm.run(1_000_000), RunOutcome::Idle { .. }));

    vm.raise_interrupt(interrupt::MACHINE_EXTERNAL);
    let handler = chain.symbol(firmware::TRAP_HANDLER).unwrap();
    assert_eq!(vm.run(100), RunOutcome::Spinning { pc: handler });
    assert_eq!(vm.cpu.csrs.mcause(), MCAUSE_INTERRUPT | interrupt::MACHINE_EXTERNAL);
    assert!(!vm.cpu.csrs.interrupts_enabled());
    assert_eq!(vm.console.as_string(), "S2K");
}

#[test]
fn timer_interrupt_is_traced_as_a_trap_entry() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    let mut trace = BootTrace::new(*chain.layout(), &vm.cpu);
    assert!(matches!(vm.run_traced(1_000_000, &mut trace), RunOutcome::Idle { .. }));

    vm.raise_interrupt(interrupt::MACHINE_TIMER);
    vm.run_traced(100, &mut trace);
    let last = trace.entries().last().unwrap();
    assert_eq!(last.stage, Stage::Firmware);
    assert!(last.via_trap);
    assert!(trace.backward_transitions().is_empty());
    assert_eq!(trace.traps().len(), 1);
    assert_eq!(trace.traps()[0].mcause, MCAUSE_INTERRUPT | interrupt::MACHINE_TIMER);
}

#[test]
fn firmware_clears_a_preseeded_satp() {
    let (_, mut vm) = boot(&LaunchConfig::default());
    vm.cpu.csrs.poke(csr::SATP, 0x8000_0000_0000_1234).unwrap();
    vm.run(1_000_000);
    assert_eq!(vm.cpu.csrs.satp(), 0);
}

#[test]
fn unsupported_ecall_lands_in_the_sink() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    let stage1 = chain.layout().entry(Stage::Stage1);
    vm.run_until(1_000, |cpu| cpu.pc == stage1);

    let scratch = 0x8030_0000;
    vm.load_image(scratch, &0x0000_0073u32.to_le_bytes()).unwrap();
    vm.cpu.regs[17] = 0x4442_434e;
    vm.cpu.regs[16] = 0;
    vm.set_pc(scratch);

    let handler = chain.symbol(firmware::TRAP_HANDLER).unwrap();
    assert_eq!(vm.run(100), RunOutcome::Spinning { pc: handler });
    assert_eq!(vm.cpu.csrs.mcause(), exception::ECALL_FROM_M);
    assert_eq!(vm.cpu.csrs.mepc(), scratch);
    assert!(vm.console.is_empty());
}

#[test]
fn report_passes_every_check_on_a_clean_boot() {
    let config = LaunchConfig::default().with_hart_id(2);
    let (chain, mut vm) = boot(&config);
    let (outcome, report) = run_chain(&chain, &mut vm, &config);

    assert!(matches!(outcome, RunOutcome::Idle { .. }));
    for check in &report.checks {
        assert!(check.passed, "{}: {}", check.name, check.detail);
    }
    assert_eq!(report.console, "S2K");
    assert_eq!(report.console_hex, "53324b");
    assert_eq!(report.trap_vector, chain.symbol(firmware::TRAP_HANDLER));

    let json = report.to_json().unwrap();
    assert!(json.contains("\"console\": \"S2K\""));
    assert!(json.contains("\"kind\": \"idle\""));
    assert!(json.contains("\"stage\": \"kernel\""));
}

#[test]
fn report_flags_a_run_cut_short() {
    let config = LaunchConfig::default().with_max_steps(200);
    let (chain, mut vm) = boot(&config);
    let (outcome, report) = run_chain(&chain, &mut vm, &config);

    assert!(matches!(outcome, RunOutcome::StepLimit { .. }));
    assert!(!report.all_passed());
    let failed: Vec<&str> = report.failures().map(|c| c.name).collect();
    assert!(failed.contains(&"console output"));
    assert!(failed.contains(&"kernel idle"));
}

#[test]
fn written_images_load_back() {
    let chain = BootChain::build(&BootLayout::DEFAULT).unwrap();
    let dir = scratch_dir("roundtrip");
    let written = chain.write_to(&dir, true).unwrap();
    assert_eq!(written.len(), 16);
    for name in ["bios.bin", "bios.elf", "bios_disasm.txt", "bios_symbols.txt", "kernel.bin"] {
        assert!(dir.join(name).is_file(), "missing {name}");
    }

    let bios = fs::read(dir.join("bios.bin")).unwrap();
    assert_eq!(bios, chain.image(Stage::Firmware).bytes);
    let symbols = fs::read_to_string(dir.join("bios_symbols.txt")).unwrap();
    assert!(symbols.contains("trap_handler"));

    let from_elf = BootChain::load_from(&dir, &BootLayout::DEFAULT).unwrap();
    assert_eq!(from_elf, chain);

    for stage in Stage::ALL {
        fs::remove_file(dir.join(format!("{}.elf", stage.file_stem()))).unwrap();
    }
    let from_bin = BootChain::load_from(&dir, &BootLayout::DEFAULT).unwrap();
    for stage in Stage::ALL {
        assert_eq!(from_bin.image(stage).bytes, chain.image(stage).bytes);
        assert_eq!(from_bin.image(stage).base, chain.image(stage).base);
        assert!(from_bin.image(stage).symbols.is_empty());
    }

    let mut vm = boot_machine(&from_bin, &LaunchConfig::default()).unwrap();
    assert!(matches!(vm.run(1_000_000), RunOutcome::Idle { .. }));
    assert_eq!(vm.console.as_string(), "S2K");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_image_is_reported() {
    let dir = scratch_dir("empty");
    fs::create_dir_all(&dir).unwrap();
    let err = BootChain::load_from(&dir, &BootLayout::DEFAULT).unwrap_err();
    assert!(matches!(err, LaunchError::MissingImage { stage: Stage::Firmware, .. }));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn elf_linked_for_another_layout_is_rejected() {
    let mut moved = BootLayout::DEFAULT;
    moved.kernel.base = 0x8030_0000;
    let chain = BootChain::build(&moved).unwrap();
    let dir = scratch_dir("moved");
    chain.write_to(&dir, true).unwrap();

    let err = BootChain::load_from(&dir, &BootLayout::DEFAULT).unwrap_err();
    assert!(matches!(err, LaunchError::Elf { .. }));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn invalid_layout_is_rejected_before_building() {
    let mut layout = BootLayout::DEFAULT;
    layout.stack_top = 0x8020_0800;
    assert!(matches!(BootChain::build(&layout), Err(LaunchError::Layout(_))));
}

#[test]
fn firmware_window_inside_dram_is_rejected() {
    let mut layout = BootLayout::DEFAULT;
    layout.dram = Region::new(0, 0x8800_0000);
    assert!(matches!(
        BootChain::build(&layout),
        Err(LaunchError::Layout(LayoutError::FirmwareInDram))
    ));
}

#[test]
fn corrupt_elf_section_offset_is_an_error() {
    let chain = BootChain::build(&BootLayout::DEFAULT).unwrap();
    let dir = scratch_dir("corrupt");
    chain.write_to(&dir, true).unwrap();

    let path = dir.join("bios.elf");
    let mut bytes = fs::read(&path).unwrap();
    let elf = goblin::elf::Elf::parse(&bytes).unwrap();
    let text = elf
        .section_headers
        .iter()
        .position(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(".text"))
        .unwrap();
    // sh_offset sits 24 bytes into an ELF64 section header.
    let at = elf.header.e_shoff as usize + text * elf.header.e_shentsize as usize + 24;
    drop(elf);
    bytes[at..at + 8].copy_from_slice(&(u64::MAX - 8).to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = BootChain::load_from(&dir, &BootLayout::DEFAULT).unwrap_err();
    assert!(matches!(err, LaunchError::Elf { source: AsmError::InvalidElf(_), .. }));
    fs::remove_dir_all(&dir).unwrap();
}

struct RangeWatch {
    range: Range<u64>,
    hits: u64,
}

impl Tracer for RangeWatch {
    fn on_retire(&mut self, pc: u64, _instruction: &Instruction, _cpu: &CPU) {
        if self.range.contains(&pc) {
            self.hits += 1;
        }
    }
}

#[test]
fn error_halt_is_never_executed() {
    let (chain, mut vm) = boot(&LaunchConfig::default());
    let stage2 = chain.image(Stage::Stage2);
    let mut watch = RangeWatch {
        range: stage2.symbol(stage2::ERROR_HALT).unwrap()..stage2.end(),
        hits: 0,
    };
    assert!(!watch.range.is_empty());
    assert!(matches!(vm.run_traced(1_000_000, &mut watch), RunOutcome::Idle { .. }));
    assert_eq!(watch.hits, 0);
    assert_eq!(vm.console.as_string(), "S2K");
}
