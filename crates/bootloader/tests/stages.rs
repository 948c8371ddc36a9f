use bootloader::{build_stage, firmware, stage1, stage2, BuildError, START_SYMBOL};
use assembler::AsmError;
use types::{csr, BootLayout, HandoffArgs, LayoutError, Region, Stage};
use vm::{Console, RunOutcome, VM};

fn machine(layout: &BootLayout) -> VM {
    let mut vm = VM::new(Console::new());
    vm.map("firmware", layout.firmware.base, layout.firmware.size).unwrap();
    vm.map("dram", layout.dram.base, layout.dram.size).unwrap();
    vm
}

#[test]
fn firmware_installs_sink_and_jumps_to_stage1() {
    let layout = BootLayout::DEFAULT;
    let image = build_stage(Stage::Firmware, &layout).unwrap();
    assert_eq!(image.symbol(START_SYMBOL), Some(0x1000));
    let handler = image.symbol(firmware::TRAP_HANDLER).unwrap();
    assert_eq!(handler % 4, 0);

    let mut vm = machine(&layout);
    vm.cpu.csrs.poke(csr::SATP, 0x8000_0000_0000_1234).unwrap();
    vm.load_image(image.base, image.to_flat_binary()).unwrap();
    vm.set_pc(image.entry());

    let outcome = vm.run_until(100, |cpu| cpu.pc == layout.stage1.base);
    assert_eq!(outcome, RunOutcome::Stopped { pc: 0x8000_0000 });
    assert_eq!(vm.cpu.csrs.mtvec(), handler);
    assert_eq!(vm.cpu.csrs.satp(), 0);
    assert_eq!(vm.cpu.regs[2], layout.stack_top);
}

#[test]
fn stage1_passes_hart_id_and_empty_device_tree() {
    let layout = BootLayout::DEFAULT;
    let image = build_stage(Stage::Stage1, &layout).unwrap();
    assert_eq!(image.symbol(stage1::ENTRY), Some(layout.stage1.base));

    let mut vm = machine(&layout);
    vm.set_hart_id(5);
    vm.cpu.regs[11] = 0xdead_beef;
    vm.cpu.csrs.write(csr::MSTATUS, 0x8).unwrap();
    vm.load_image(image.base, image.to_flat_binary()).unwrap();
    vm.set_pc(image.entry());

    let outcome = vm.run_until(100, |cpu| cpu.pc == layout.stage2.base);
    assert_eq!(outcome, RunOutcome::Stopped { pc: layout.stage2.base });
    assert_eq!(HandoffArgs::from_registers(&vm.cpu.regs), HandoffArgs::from_stage1(5));
    assert!(!vm.cpu.csrs.interrupts_enabled());
}

#[test]
fn stage2_prints_banner_then_enters_kernel_with_zeroed_arguments() {
    let mut layout = BootLayout::DEFAULT;
    layout.delay_iterations = 16;
    let image = build_stage(Stage::Stage2, &layout).unwrap();
    for symbol in [stage2::ENTRY, stage2::CONSOLE, stage2::DELAY_LOOP, stage2::KERNEL_JUMP, stage2::ERROR_HALT] {
        assert!(image.symbol(symbol).is_some(), "missing {symbol}");
    }

    let mut vm = machine(&layout);
    vm.cpu.regs[10] = 7;
    vm.cpu.regs[11] = 9;
    vm.load_image(image.base, image.to_flat_binary()).unwrap();
    vm.set_pc(image.entry());

    let outcome = vm.run_until(1_000, |cpu| cpu.pc == layout.kernel.base);
    assert_eq!(outcome, RunOutcome::Stopped { pc: layout.kernel.base });
    assert_eq!(vm.console.as_string(), "S2");
    assert_eq!(HandoffArgs::from_registers(&vm.cpu.regs), HandoffArgs::for_kernel());
    assert_eq!(vm.cpu.regs[2], layout.stack_top);
}

#[test]
fn kernel_is_dispatched_to_its_builder() {
    let image = build_stage(Stage::Kernel, &BootLayout::DEFAULT).unwrap();
    assert_eq!(image.stage, Stage::Kernel);
    assert_eq!(image.entry(), 0x8020_0000);
    assert_eq!(image.symbol(kernel::ENTRY), Some(0x8020_0000));
}

#[test]
fn kernel_size_is_checked_by_the_dispatcher() {
    let mut layout = BootLayout::DEFAULT;
    layout.kernel = Region::new(0x8020_0000, 8);
    let image = kernel::build(&layout).unwrap();
    assert!(image.len() > 8);
    assert!(matches!(
        build_stage(Stage::Kernel, &layout),
        Err(BuildError::Assembly(AsmError::ImageTooLarge { stage: Stage::Kernel, .. }))
    ));
}

#[test]
fn invalid_layout_is_rejected_before_assembly() {
    let mut layout = BootLayout::DEFAULT;
    layout.delay_iterations = 0;
    assert_eq!(
        build_stage(Stage::Stage2, &layout),
        Err(BuildError::Layout(LayoutError::ZeroDelay))
    );
}

#[test]
fn every_stage_jumps_to_the_layout_entry() {
    let mut layout = BootLayout::DEFAULT;
    layout.stage2.base = 0x8040_0000;
    layout.kernel.base = 0x8060_0000;
    layout.validate().unwrap();

    let image = build_stage(Stage::Stage1, &layout).unwrap();
    let mut vm = machine(&layout);
    vm.load_image(image.base, image.to_flat_binary()).unwrap();
    vm.set_pc(image.entry());
    let outcome = vm.run_until(100, |cpu| !image.contains(cpu.pc));
    assert_eq!(outcome, RunOutcome::Stopped { pc: 0x8040_0000 });
}
