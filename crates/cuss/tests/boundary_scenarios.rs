//! The six literal boundary scenarios from the design's testable-properties
//! section, exercised end-to-end through the public crate API.

use cuss::cpu::{Cpu, CpuState};
use cuss::ops::{execute_one, OpTable};
use cuss::{run_monitor, MonitorIo, SharedState};
use cuss_mem::{CuResult, Memory};
use std::collections::VecDeque;

fn encode_r(op1: u8, rt: u8, ra: u8, rb: u8) -> u32 {
    ((rt as u32) << 21) | ((ra as u32) << 16) | ((rb as u32) << 11) | (op1 as u32)
}

#[test]
fn scenario_1_add_with_carry() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    cpu.set_register(2, 0xFFFF_FFFF).unwrap();
    cpu.set_register(3, 0x0000_0001).unwrap();
    mem.set_word(0, encode_r(0x15, 1, 2, 3)).unwrap(); // ADDF r1, r2, r3
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    assert_eq!(cpu.register(1), 0x0000_0000);
    assert!(cpu.psr().carry());
    assert!(cpu.psr().zero());
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn scenario_2_arithmetic_right_shift() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    cpu.set_register(2, 0xFFFF_FFF0).unwrap();
    mem.set_word(0, encode_r(0x0A, 1, 2, 0) | (4 << 6)).unwrap(); // SRAI r1, r2, 4
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    assert_eq!(cpu.register(1), 0xFFFF_FFFF);
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn scenario_3_ldui_then_orri() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    mem.set_word(0, (0x0D << 26) | (1 << 21) | 0xDEAD).unwrap(); // LDUI r1, 0xDEAD
    mem.set_word(4, (0x02 << 26) | (1 << 21) | (1 << 16) | 0xBEEF)
        .unwrap(); // ORRI r1, r1, 0xBEEF
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    assert_eq!(cpu.register(1), 0xDEAD_BEEF);
}

#[test]
fn scenario_4_jump_and_link_round_trip() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    mem.set_word(0, (0x06u32 << 26) | 2).unwrap(); // JALI +2 -> target 8
    mem.set_word(8, encode_r(0x1E, 0, 31, 0)).unwrap(); // JMPR r31, r0, 0
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    assert_eq!(cpu.pc(), 8);
    assert_eq!(cpu.register(31), 4);
    execute_one(&mut cpu, &mut mem, &OpTable::default()).unwrap();
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn scenario_5_breakpoint_stop_precedes_fetch() {
    let mut memory = Memory::new();
    for i in 0..4u32 {
        memory.set_word(i * 4, 0).unwrap(); // four word-NOPs
    }
    let mut cpu = Cpu::new();
    cpu.add_breakpoint(8).unwrap();
    let shared = SharedState::new(cpu, memory);
    shared.set_state(CpuState::Running).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| cuss::concurrency::run_executor(&shared));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(shared.lock().cpu.state(), CpuState::Breakpoint);
        assert_eq!(shared.lock().cpu.pc(), 8);
        shared.set_state(CpuState::Quitting).unwrap();
    });
}

#[test]
fn scenario_6_quit_terminates_cleanly() {
    let mut memory = Memory::new();
    memory.set_word(0, 0).unwrap();
    let shared = SharedState::new(Cpu::new(), memory);
    shared.set_state(CpuState::Running).unwrap();

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| cuss::concurrency::run_executor(&shared));
        shared.set_state(CpuState::Quitting).unwrap();
        handle.join().expect("executor thread panicked");
    });
    assert_eq!(shared.lock().cpu.state(), CpuState::Quitting);
}

struct ScriptedIo {
    inputs: VecDeque<String>,
}

impl MonitorIo for ScriptedIo {
    fn get_input(&mut self) -> CuResult<Option<String>> {
        Ok(self.inputs.pop_front())
    }

    fn put_output(&mut self, _msg: &str) -> CuResult<()> {
        Ok(())
    }
}

#[test]
fn monitor_and_executor_cooperate_across_threads() {
    let mut memory = Memory::new();
    for i in 0..4u32 {
        memory.set_word(i * 4, 0).unwrap();
    }
    let shared = SharedState::new(Cpu::new(), memory);

    std::thread::scope(|scope| {
        scope.spawn(|| cuss::concurrency::run_executor(&shared));
        let mut io = ScriptedIo {
            inputs: VecDeque::from(["step".to_string(), "quit".to_string()]),
        };
        run_monitor(&shared, &mut io).unwrap();
    });

    assert_eq!(shared.lock().cpu.pc(), 4);
    assert_eq!(shared.lock().cpu.state(), CpuState::Quitting);
}
