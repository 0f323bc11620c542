//! CPU state: register file, PSR, EPR, PC, breakpoint table, and run-state.

use cuss_mem::{CuError, CuResult, Memory};

use crate::flags::Psr;

/// Number of general-purpose integer registers.
pub const NUM_REGISTERS: usize = 32;

/// Index of the link register used by jump-and-link instructions.
pub const LINK_REGISTER: usize = 31;

/// Value written into every non-`r0` register on reset, chosen to make
/// uninitialised reads stand out in a trace.
pub const RESET_REGISTER_SENTINEL: u32 = 0xC0DE_F00D;

/// Maximum number of simultaneously armed breakpoints.
pub const MAX_BREAKPOINTS: usize = 16;

/// The CPU's run-state, driving the Executor/Monitor handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    /// Execution is suspended; the Monitor owns inspection/stepping.
    #[default]
    Paused,
    /// The Executor is fetching and executing instructions.
    Running,
    /// The Executor stopped just before fetching the instruction at a
    /// breakpoint address.
    Breakpoint,
    /// The session is shutting down; terminal for the Executor.
    Quitting,
    /// An instruction failed; terminal for the run.
    Error,
}

impl CpuState {
    /// `true` for the two states in which the Executor is not advancing;
    /// the Monitor may step or inspect in these states.
    #[must_use]
    pub fn is_suspended(self) -> bool {
        matches!(self, CpuState::Paused | CpuState::Breakpoint)
    }
}

/// A fixed-capacity set of up to [`MAX_BREAKPOINTS`] word addresses.
///
/// Add appends at the first empty slot. Remove scans for the first match and
/// compacts the table by shifting trailing entries left, preserving the
/// "no empty slot before a valid one" invariant that keeps Add's scan correct.
#[derive(Debug, Clone, Copy, Default)]
pub struct Breakpoints {
    slots: [Option<u32>; MAX_BREAKPOINTS],
}

impl Breakpoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, addr: u32) -> CuResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(CuError::BreakpointTableFull)?;
        *slot = Some(addr);
        Ok(())
    }

    pub fn remove(&mut self, addr: u32) -> CuResult<()> {
        let idx = self
            .slots
            .iter()
            .position(|s| *s == Some(addr))
            .ok_or(CuError::BreakpointNotFound { addr })?;
        for i in idx..self.slots.len() - 1 {
            self.slots[i] = self.slots[i + 1];
        }
        *self.slots.last_mut().unwrap() = None;
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, addr: u32) -> bool {
        self.slots.iter().any(|s| *s == Some(addr))
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }
}

/// The CUP processor core: 32 integer registers, the EPR, PC, PSR, breakpoint
/// table, and run-state. Memory is owned separately and passed to stepping
/// methods in `crate::ops`.
pub struct Cpu {
    registers: [u32; NUM_REGISTERS],
    epr: u32,
    pc: u32,
    psr: Psr,
    breakpoints: Breakpoints,
    state: CpuState,
}

impl Default for Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            registers: [0; NUM_REGISTERS],
            epr: 0,
            pc: 0,
            psr: Psr::empty(),
            breakpoints: Breakpoints::new(),
            state: CpuState::Paused,
        };
        cpu.reset();
        cpu
    }
}

impl Cpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the register file (`r0 = 0`, all others to
    /// [`RESET_REGISTER_SENTINEL`]), the EPR, PC, PSR, and run-state. The
    /// breakpoint table is left untouched; breakpoints persist across resets.
    pub fn reset(&mut self) {
        self.registers = [RESET_REGISTER_SENTINEL; NUM_REGISTERS];
        self.registers[0] = 0;
        self.epr = 0;
        self.pc = 0;
        self.psr = Psr::empty();
        self.state = CpuState::Paused;
    }

    #[must_use]
    pub fn register(&self, index: u8) -> u32 {
        if index == 0 {
            0
        } else {
            self.registers[index as usize]
        }
    }

    pub fn set_register(&mut self, index: u8, value: u32) -> CuResult<()> {
        if index as usize >= NUM_REGISTERS {
            return Err(CuError::BadRegister { index });
        }
        if index != 0 {
            self.registers[index as usize] = value;
        }
        Ok(())
    }

    #[must_use]
    pub fn epr(&self) -> u32 {
        self.epr
    }

    pub fn set_epr(&mut self, value: u32) {
        self.epr = value;
    }

    #[must_use]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Sets the program counter. Fails if `addr` is not a valid physical
    /// address or is not 4-byte aligned. This is the sole guard against unaligned
    /// instruction fetches.
    pub fn set_pc(&mut self, addr: u32) -> CuResult<()> {
        if !Memory::is_valid_addr(addr) {
            return Err(CuError::BadAddress { addr });
        }
        if addr % 4 != 0 {
            return Err(CuError::UnalignedPc { pc: addr });
        }
        self.pc = addr;
        Ok(())
    }

    #[must_use]
    pub fn psr(&self) -> Psr {
        self.psr
    }

    /// Sets each flag whose argument is `true`; leaves the others unchanged.
    /// This is an explicit OR-in, never a clear.
    pub fn set_flags(&mut self, negative: bool, overflow: bool, carry: bool, zero: bool) {
        self.psr.set_if(Psr::Negative, negative);
        self.psr.set_if(Psr::Overflow, overflow);
        self.psr.set_if(Psr::Carry, carry);
        self.psr.set_if(Psr::Zero, zero);
    }

    #[must_use]
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Sets the run-state. External callers may only request `Paused`,
    /// `Running`, or `Quitting`; `Error` and `Breakpoint` are internal-only
    /// and rejected here with `BadState`.
    pub fn set_state(&mut self, new_state: CpuState) -> CuResult<()> {
        match new_state {
            CpuState::Paused | CpuState::Running | CpuState::Quitting => {
                self.state = new_state;
                Ok(())
            }
            CpuState::Breakpoint | CpuState::Error => Err(CuError::BadState {
                message: format!("{new_state:?} may only be entered by the Executor"),
            }),
        }
    }

    /// Sets the run-state without the external-only restriction. For use by
    /// the Executor, which is the sole writer of `Breakpoint` and `Error`.
    pub(crate) fn set_state_internal(&mut self, new_state: CpuState) {
        self.state = new_state;
    }

    #[must_use]
    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn add_breakpoint(&mut self, addr: u32) -> CuResult<()> {
        self.breakpoints.add(addr)
    }

    pub fn remove_breakpoint(&mut self, addr: u32) -> CuResult<()> {
        self.breakpoints.remove(addr)
    }

    #[must_use]
    pub fn at_breakpoint(&self) -> bool {
        self.breakpoints.contains(self.pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_r0_and_sentinels_the_rest() {
        let cpu = Cpu::new();
        assert_eq!(cpu.register(0), 0);
        assert_eq!(cpu.register(1), RESET_REGISTER_SENTINEL);
        assert_eq!(cpu.register(31), RESET_REGISTER_SENTINEL);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.state(), CpuState::Paused);
    }

    #[test]
    fn r0_writes_are_silently_ignored() {
        let mut cpu = Cpu::new();
        cpu.set_register(0, 0xFFFF_FFFF).unwrap();
        assert_eq!(cpu.register(0), 0);
    }

    #[test]
    fn register_ge_32_is_rejected() {
        let mut cpu = Cpu::new();
        assert!(matches!(
            cpu.set_register(32, 1),
            Err(CuError::BadRegister { index: 32 })
        ));
    }

    #[test]
    fn pc_must_be_aligned() {
        let mut cpu = Cpu::new();
        assert!(matches!(
            cpu.set_pc(5),
            Err(CuError::UnalignedPc { pc: 5 })
        ));
        assert!(cpu.set_pc(4).is_ok());
    }

    #[test]
    fn pc_must_be_in_bounds() {
        let mut cpu = Cpu::new();
        assert!(cpu.set_pc(cuss_mem::MEM_SIZE).is_err());
    }

    #[test]
    fn external_state_setter_rejects_internal_states() {
        let mut cpu = Cpu::new();
        assert!(cpu.set_state(CpuState::Error).is_err());
        assert!(cpu.set_state(CpuState::Breakpoint).is_err());
        assert!(cpu.set_state(CpuState::Running).is_ok());
    }

    #[test]
    fn breakpoint_add_remove_roundtrip() {
        let mut cpu = Cpu::new();
        cpu.add_breakpoint(0x100).unwrap();
        cpu.add_breakpoint(0x200).unwrap();
        assert!(cpu.breakpoints().contains(0x100));
        cpu.remove_breakpoint(0x100).unwrap();
        assert!(!cpu.breakpoints().contains(0x100));
        assert!(cpu.breakpoints().contains(0x200));
    }

    #[test]
    fn breakpoint_table_full() {
        let mut bps = Breakpoints::new();
        for i in 0..MAX_BREAKPOINTS {
            bps.add(i as u32 * 4).unwrap();
        }
        assert!(matches!(
            bps.add(0x1000),
            Err(CuError::BreakpointTableFull)
        ));
    }

    #[test]
    fn breakpoint_remove_missing_fails() {
        let mut bps = Breakpoints::new();
        assert!(matches!(
            bps.remove(0x4),
            Err(CuError::BreakpointNotFound { addr: 0x4 })
        ));
    }

    #[test]
    fn breakpoint_remove_compacts_table() {
        let mut bps = Breakpoints::new();
        bps.add(4).unwrap();
        bps.add(8).unwrap();
        bps.remove(4).unwrap();
        // the freed slot must be at the tail so Add's first-empty-slot scan
        // still finds a contiguous prefix of valid entries.
        bps.add(12).unwrap();
        let collected: Vec<u32> = bps.iter().collect();
        assert_eq!(collected, vec![8, 12]);
    }
}
