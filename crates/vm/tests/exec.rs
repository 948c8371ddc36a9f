use vm::{Console, RunOutcome, Step, Trap, VM};

const BASE: u64 = 0x8000_0000;

fn machine(words: &[u32]) -> VM {
    let mut vm = VM::new(Console::new());
    vm.map("ram", BASE, 0x1000).unwrap();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    vm.load_image(BASE, &bytes).unwrap();
    vm.set_pc(BASE);
    vm
}

fn step_retired(vm: &mut VM) {
    match vm.cpu.step(&mut vm.bus) {
        Step::Retired { .. } => {}
        other => panic!("expected retirement, got {other:?}"),
    }
}

#[test]
fn test_addi_program() {
    let mut vm = machine(&[
        0x00500093, // addi x1, x0, 5
        0x00a08113, // addi x2, x1, 10
        0x00108133, // add  x2, x1, x1
    ]);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[1], 5);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[2], 15);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[2], 10);
    assert_eq!(vm.cpu.pc, BASE + 12);
    assert_eq!(vm.cpu.retired, 3);
}

#[test]
fn writes_to_x0_are_dropped() {
    let mut vm = machine(&[0x00100013]); // addi x0, x0, 1
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[0], 0);
}

#[test]
fn lui_sign_extends_on_rv64() {
    let mut vm = machine(&[
        0x800002b7, // lui   t0, 0x80000
        0x0012829b, // addiw t0, t0, 1
    ]);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[5], 0xffff_ffff_8000_0000);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[5], 0xffff_ffff_8000_0001);
}

#[test]
fn slli_builds_high_addresses() {
    let mut vm = machine(&[
        0x00100293, // addi t0, zero, 1
        0x01f29293, // slli t0, t0, 31
    ]);
    vm.run(2);
    assert_eq!(vm.cpu.regs[5], 0x8000_0000);
}

#[test]
fn store_and_load_doubleword() {
    let mut vm = machine(&[
        0x00000117, // auipc sp, 0
        0x10010113, // addi  sp, sp, 256
        0xfff00293, // addi  t0, zero, -1
        0x00513023, // sd    t0, 0(sp)
        0x00016503, // lwu   a0, 0(sp)
        0x00013583, // ld    a1, 0(sp)
    ]);
    vm.run(6);
    assert_eq!(vm.cpu.regs[2], BASE + 0x100);
    assert_eq!(vm.cpu.regs[10], 0xffff_ffff);
    assert_eq!(vm.cpu.regs[11], u64::MAX);
}

#[test]
fn countdown_loop_runs_exact_iterations() {
    let mut vm = machine(&[
        0x00300293, // addi t0, zero, 3
        0x00130313, // addi t1, t1, 1
        0xfff28293, // addi t0, t0, -1
        0xfe029ce3, // bnez t0, -8
        0x0000006f, // j .
    ]);
    let outcome = vm.run(100);
    assert_eq!(outcome, RunOutcome::Spinning { pc: BASE + 16 });
    assert_eq!(vm.cpu.regs[6], 3);
}

#[test]
fn self_jump_is_reported_as_spinning() {
    let mut vm = machine(&[0x0000006f]);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: BASE });
}

#[test]
fn step_limit_is_reported() {
    let mut vm = machine(&[0x00000013, 0x00000013, 0x00000013]);
    assert_eq!(vm.run(2), RunOutcome::StepLimit { pc: BASE + 8 });
}

#[test]
fn run_until_stops_before_target() {
    let mut vm = machine(&[0x00000013, 0x00000013, 0x0000006f]);
    let outcome = vm.run_until(10, |cpu| cpu.pc == BASE + 8);
    assert_eq!(outcome, RunOutcome::Stopped { pc: BASE + 8 });
    assert_eq!(vm.cpu.retired, 2);
}

#[test]
fn console_call_prints_and_clears_return_registers() {
    let mut vm = machine(&[
        0x04b00513, // li a0, 'K'
        0x00000893, // li a7, 0
        0x00100813, // li a6, 1
        0x00000073, // ecall
        0x0000006f, // j .
    ]);
    vm.cpu.regs[11] = 0x1234;
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: BASE + 16 });
    assert_eq!(vm.console.as_string(), "K");
    assert_eq!(vm.cpu.regs[10], 0);
    assert_eq!(vm.cpu.regs[11], 0);
}

#[test]
fn csr_read_of_hart_id() {
    let mut vm = machine(&[0xf1402573]); // csrr a0, mhartid
    vm.set_hart_id(3);
    step_retired(&mut vm);
    assert_eq!(vm.cpu.regs[10], 3);
}

#[test]
fn csrci_and_csrs_touch_only_named_bits() {
    let mut vm = machine(&[
        0x00800293, // li    t0, 8
        0x3002a073, // csrs  mstatus, t0
        0x30047073, // csrci mstatus, 8
    ]);
    vm.run(2);
    assert!(vm.cpu.csrs.interrupts_enabled());
    vm.run(1);
    assert!(!vm.cpu.csrs.interrupts_enabled());
    assert_eq!(vm.cpu.csrs.read(types::csr::MSTATUS), Ok(0x1800));
}

#[test]
fn satp_write_of_zero_clears_stale_translation() {
    let mut vm = machine(&[0x18001073]); // csrw satp, zero
    vm.cpu.csrs.poke(types::csr::SATP, 0x8000_0000_0008_0000).unwrap();
    step_retired(&mut vm);
    assert_eq!(vm.cpu.csrs.satp(), 0);
}

#[test]
fn register_dump_names_registers() {
    let vm = machine(&[]);
    let dump = vm.register_dump();
    assert!(dump.contains("sp"));
    assert!(dump.contains("mtvec"));
}

#[test]
fn illegal_instruction_is_a_trap_not_a_panic() {
    let mut vm = machine(&[0x0000_0000]);
    match vm.cpu.step(&mut vm.bus) {
        Step::Trapped { pc, trap } => {
            assert_eq!(pc, BASE);
            assert_eq!(trap, Trap::IllegalInstruction(0));
        }
        other => panic!("expected trap, got {other:?}"),
    }
}
