use types::csr;
use vm::{Console, HartState, RunOutcome, Trap, VM};

const BASE: u64 = 0x8000_0000;
const HANDLER: u64 = BASE + 0x100;
const SELF_JUMP: u32 = 0x0000006f;

fn machine(words: &[u32]) -> VM {
    let mut vm = VM::new(Console::new());
    vm.map("ram", BASE, 0x1000).unwrap();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    vm.load_image(BASE, &bytes).unwrap();
    vm.load_image(HANDLER, &SELF_JUMP.to_le_bytes()).unwrap();
    vm.cpu.csrs.write(csr::MTVEC, HANDLER).unwrap();
    vm.set_pc(BASE);
    vm
}

#[test]
fn illegal_instruction_vectors_to_mtvec() {
    let mut vm = machine(&[0x00000013, 0x00000000]);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mepc(), BASE + 4);
    assert_eq!(vm.cpu.csrs.mcause(), 2);
}

#[test]
fn unsupported_ecall_raises_environment_call_trap() {
    let mut vm = machine(&[
        0x00500893, // li a7, 5
        0x00000073, // ecall
    ]);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mcause(), 11);
    assert_eq!(vm.cpu.csrs.mepc(), BASE + 4);
    assert!(vm.console.is_empty());
}

#[test]
fn load_from_unmapped_memory_is_an_access_fault() {
    let mut vm = machine(&[0x00003503]); // ld a0, 0(zero)
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mcause(), 5);
    assert_eq!(vm.cpu.csrs.mtval(), 0);
}

#[test]
fn misaligned_store_traps() {
    let mut vm = machine(&[
        0x00000117, // auipc sp, 0
        0x00113023, // sd    ra, 0(sp)
    ]);
    vm.run(1);
    vm.cpu.regs[2] += 1;
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mcause(), 6);
    assert_eq!(vm.cpu.csrs.mtval(), BASE + 1);
}

#[test]
fn writing_hart_id_is_illegal() {
    let mut vm = machine(&[0xf1451073]); // csrw mhartid, a0
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mcause(), 2);
}

#[test]
fn trap_entry_saves_and_clears_interrupt_enable() {
    let mut vm = machine(&[0x00100073]); // ebreak
    vm.cpu.csrs.write(csr::MSTATUS, 0x8).unwrap();
    vm.run(10);
    let status = vm.cpu.csrs.read(csr::MSTATUS).unwrap();
    assert_eq!(status & 0x8, 0, "MIE cleared");
    assert_eq!(status & 0x80, 0x80, "MPIE holds the old MIE");
    assert_eq!(vm.cpu.csrs.mcause(), 3);
}

#[test]
fn mret_returns_to_mepc_and_restores_enable() {
    let mut vm = machine(&[0x30200073]); // mret
    vm.cpu.csrs.write(csr::MEPC, BASE + 0x200).unwrap();
    vm.cpu.csrs.write(csr::MSTATUS, 0x80).unwrap();
    vm.run(1);
    assert_eq!(vm.cpu.pc, BASE + 0x200);
    assert!(vm.cpu.csrs.interrupts_enabled());
}

#[test]
fn wfi_parks_until_an_enabled_interrupt_is_pending() {
    let mut vm = machine(&[
        0x10500073, // wfi
        0x00500093, // addi x1, x0, 5
        SELF_JUMP,
    ]);
    assert_eq!(vm.run(10), RunOutcome::Idle { pc: BASE + 4 });
    assert_eq!(vm.cpu.state, HartState::WaitingForInterrupt);

    // A disabled source does not wake the hart.
    vm.raise_interrupt(3);
    assert_eq!(vm.run(10), RunOutcome::Idle { pc: BASE + 4 });

    // Enabled in mie but with the global gate closed: wake without trapping.
    vm.cpu.csrs.write(csr::MIE, 0x880).unwrap();
    vm.raise_interrupt(7);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: BASE + 8 });
    assert_eq!(vm.cpu.regs[1], 5);
}

#[test]
fn enabled_interrupt_is_taken_after_wfi() {
    let mut vm = machine(&[0x10500073, SELF_JUMP]);
    vm.cpu.csrs.write(csr::MIE, 0x880).unwrap();
    vm.cpu.csrs.write(csr::MSTATUS, 0x8).unwrap();
    assert_eq!(vm.run(10), RunOutcome::Idle { pc: BASE + 4 });

    vm.raise_interrupt(11);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
    assert_eq!(vm.cpu.csrs.mcause(), (1 << 63) | 11);
    assert_eq!(vm.cpu.csrs.mepc(), BASE + 4);
    assert!(!vm.cpu.csrs.interrupts_enabled());
}

#[test]
fn vectored_mode_offsets_interrupts_by_cause() {
    let mut vm = machine(&[0x10500073]);
    // Vector base at HANDLER - 4 * 7 so the timer entry lands on the self jump.
    vm.cpu.csrs.write(csr::MTVEC, (HANDLER - 28) | 1).unwrap();
    vm.cpu.csrs.write(csr::MIE, 0x80).unwrap();
    vm.cpu.csrs.write(csr::MSTATUS, 0x8).unwrap();
    vm.raise_interrupt(7);
    assert_eq!(vm.run(10), RunOutcome::Spinning { pc: HANDLER });
}

#[test]
fn forced_trap_lands_in_handler() {
    let mut vm = machine(&[0x00000013]);
    vm.force_trap(Trap::IllegalInstruction(0));
    assert_eq!(vm.cpu.pc, HANDLER);
    assert_eq!(vm.cpu.csrs.mepc(), BASE);
}

#[test]
fn trap_into_faulting_vector_is_a_double_fault() {
    let mut vm = machine(&[0x00000000]);
    vm.cpu.csrs.write(csr::MTVEC, BASE + 0x800).unwrap();
    let outcome = vm.run(10);
    assert_eq!(
        outcome,
        RunOutcome::DoubleFault { pc: BASE + 0x800, trap: Trap::IllegalInstruction(0) }
    );
}
