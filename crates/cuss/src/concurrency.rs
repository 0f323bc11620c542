//! Concurrency glue: the shared CPU/Memory owner and the Executor's run loop.
//!
//! Two long-lived threads, Executor and Monitor, share one [`Machine`] behind
//! a single [`Mutex`] plus a [`Condvar`] the Executor parks on while the run
//! state is `Paused` or `Breakpoint`. No external crate is needed for this
//! role; `std::sync` covers it directly.

use std::sync::{Condvar, Mutex, MutexGuard};

use cuss_mem::{CuResult, Memory};

use crate::cpu::{Cpu, CpuState};
use crate::ops::{self, OpTable};

/// Everything the Executor and Monitor both touch: the CPU and its memory,
/// plus the dispatch table (stateless, but kept alongside so neither thread
/// needs to rebuild it).
pub struct Machine {
    pub cpu: Cpu,
    pub memory: Memory,
    pub table: OpTable,
}

/// The shared owner of the [`Machine`], guarded by a mutex, with a condvar
/// the Executor waits on while suspended.
pub struct SharedState {
    machine: Mutex<Machine>,
    cv: Condvar,
}

impl SharedState {
    #[must_use]
    pub fn new(cpu: Cpu, memory: Memory) -> Self {
        Self {
            machine: Mutex::new(Machine {
                cpu,
                memory,
                table: OpTable::default(),
            }),
            cv: Condvar::new(),
        }
    }

    /// Locks the machine. Held only for the duration of one inspection or
    /// one instruction step, never across a suspend.
    pub fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().expect("machine mutex poisoned")
    }

    /// Sets the run-state. Transitioning from a suspended state
    /// (`Paused`/`Breakpoint`) into `Running` or `Quitting` wakes the
    /// Executor, which is the only waiter on this condvar.
    pub fn set_state(&self, new_state: CpuState) -> CuResult<()> {
        let mut machine = self.lock();
        let was_suspended = machine.cpu.state().is_suspended();
        machine.cpu.set_state(new_state)?;
        drop(machine);
        if was_suspended && matches!(new_state, CpuState::Running | CpuState::Quitting) {
            self.cv.notify_one();
        }
        Ok(())
    }

    /// Blocks until the run-state is no longer `Paused`/`Breakpoint`.
    fn wait_while_suspended(&self) {
        let guard = self.machine.lock().expect("machine mutex poisoned");
        let _guard = self
            .cv
            .wait_while(guard, |m| m.cpu.state().is_suspended())
            .expect("machine mutex poisoned");
    }
}

/// The Executor's run loop: fetch-execute until `Quitting`, pausing whenever
/// the run-state is suspended and stopping for good on the first error.
///
/// Four steps per iteration: wait if suspended, check for quit, check for a
/// breakpoint, then fetch and execute one instruction.
pub fn run_executor(shared: &SharedState) {
    loop {
        if shared.lock().cpu.state().is_suspended() {
            shared.wait_while_suspended();
            continue;
        }

        if shared.lock().cpu.state() == CpuState::Quitting {
            return;
        }

        let mut machine = shared.lock();
        if machine.cpu.at_breakpoint() {
            machine.cpu.set_state_internal(CpuState::Breakpoint);
            continue;
        }

        match ops::execute_one(&mut machine.cpu, &mut machine.memory, &machine.table) {
            Ok(()) => {}
            Err(e) => {
                log::error!("execution failed: {e}");
                machine.cpu.set_state_internal(CpuState::Error);
                return;
            }
        }
    }
}
