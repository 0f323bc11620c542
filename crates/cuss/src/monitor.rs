//! The interactive command monitor: the Monitor's REPL loop and its I/O
//! boundary.

use cuss_mem::CuResult;

use crate::concurrency::SharedState;
use crate::cpu::CpuState;
use crate::decode::disassemble;
use crate::ops;

const BANNER: &str = "                *** CUSS Monitor ***\n";
const HINT: &str = "(Enter 'help' to see the available commands.)\n";
const USAGE: &str = concat!(
    "Commands:\n",
    "  .: Repeat last command.\n",
    "  ?, help: Show available commands.\n",
    "  dis: Disassemble code.\n",
    "  exit, quit: Exit CUSS.\n",
    "  reg: Print out register-values.\n",
    "  step: Execute the next instruction.\n",
);

/// The two blocking operations the Monitor needs from its input/output
/// surface. A real binary backs this with locked stdin/stdout; tests back it
/// with a scripted transcript.
pub trait MonitorIo {
    /// Reads one line, with any trailing newline already stripped. Returns
    /// `Ok(None)` when the input stream is exhausted (EOF).
    fn get_input(&mut self) -> CuResult<Option<String>>;

    /// Writes `msg` verbatim.
    fn put_output(&mut self, msg: &str) -> CuResult<()>;
}

/// Backs [`MonitorIo`] with locked stdin/stdout, the real binary's I/O
/// provider.
pub struct StdIo {
    stdin: std::io::Stdin,
    stdout: std::io::Stdout,
}

impl StdIo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdin: std::io::stdin(),
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdIo {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorIo for StdIo {
    fn get_input(&mut self) -> CuResult<Option<String>> {
        use std::io::BufRead;
        let mut line = String::new();
        let n = self.stdin.lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn put_output(&mut self, msg: &str) -> CuResult<()> {
        use std::io::Write;
        let mut out = self.stdout.lock();
        out.write_all(msg.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Runs the Monitor loop to completion: prints the banner, then repeatedly
/// prompts, reads a command, and dispatches it, until `exit`/`quit`/EOF.
pub fn run_monitor(shared: &SharedState, io: &mut dyn MonitorIo) -> CuResult<()> {
    io.put_output(BANNER)?;
    io.put_output(HINT)?;

    let mut last_real_command: Option<String> = None;
    loop {
        io.put_output("CUSS > ")?;
        let Some(line) = io.get_input()? else {
            shared.set_state(CpuState::Quitting)?;
            return Ok(());
        };

        if line.is_empty() {
            continue;
        }

        if line == "." {
            match last_real_command.clone() {
                Some(cmd) => {
                    if !run_command(shared, io, &cmd)? {
                        return Ok(());
                    }
                }
                // A bare "." never becomes the stored command, so repeating
                // it with nothing to repeat just keeps re-printing this
                // rather than spinning forever trying to repeat itself.
                None => io.put_output("ERROR: No previous command.\n")?,
            }
            continue;
        }

        last_real_command = Some(line.clone());
        if !run_command(shared, io, &line)? {
            return Ok(());
        }
    }
}

/// Dispatches one command line, converting a command-level failure into a
/// printed `ERROR: ` message rather than aborting the session. Returns
/// `false` only for `exit`/`quit`.
fn run_command(shared: &SharedState, io: &mut dyn MonitorIo, cmd: &str) -> CuResult<bool> {
    match dispatch(shared, io, cmd) {
        Ok(keep_going) => Ok(keep_going),
        Err(e) => {
            io.put_output(&format!("ERROR: {e}\n"))?;
            Ok(true)
        }
    }
}

fn dispatch(shared: &SharedState, io: &mut dyn MonitorIo, cmd: &str) -> CuResult<bool> {
    match cmd {
        "?" | "help" => {
            io.put_output(USAGE)?;
            Ok(true)
        }
        "dis" => {
            disassemble_current(shared, io)?;
            Ok(true)
        }
        "reg" => {
            print_registers(shared, io)?;
            Ok(true)
        }
        "step" => {
            step_and_disassemble(shared, io)?;
            Ok(true)
        }
        "exit" | "quit" => {
            shared.set_state(CpuState::Quitting)?;
            Ok(false)
        }
        _ => {
            io.put_output("ERROR: Unknown command.\n")?;
            Ok(true)
        }
    }
}

fn disassemble_current(shared: &SharedState, io: &mut dyn MonitorIo) -> CuResult<()> {
    let machine = shared.lock();
    let pc = machine.cpu.pc();
    let word = machine.memory.get_word(pc)?;
    let mnemonic = disassemble(word);
    drop(machine);
    io.put_output(&format!("  {pc:08x}: {mnemonic}\n"))
}

fn print_registers(shared: &SharedState, io: &mut dyn MonitorIo) -> CuResult<()> {
    let machine = shared.lock();
    let mut out = String::new();
    for group in 0..4u8 {
        let base = group * 8;
        out.push_str(&format!("[r{base:02}-r{:02}]:", base + 7));
        for r in base..base + 8 {
            out.push_str(&format!(" {:08x}", machine.cpu.register(r)));
        }
        out.push('\n');
    }
    drop(machine);
    io.put_output(&out)
}

/// Executes exactly one instruction, valid only while `Paused` or at a
/// `Breakpoint`; the resulting state is `Paused`, or `Breakpoint` again if
/// the new PC lands on another one.
fn step_and_disassemble(shared: &SharedState, io: &mut dyn MonitorIo) -> CuResult<()> {
    {
        let mut machine = shared.lock();
        if !machine.cpu.state().is_suspended() {
            return Err(cuss_mem::CuError::BadState {
                message: "step is only valid while paused or at a breakpoint".to_string(),
            });
        }
        match ops::execute_one(&mut machine.cpu, &mut machine.memory, &machine.table) {
            Ok(()) => {
                let next_state = if machine.cpu.at_breakpoint() {
                    CpuState::Breakpoint
                } else {
                    CpuState::Paused
                };
                machine.cpu.set_state_internal(next_state);
            }
            Err(e) => {
                machine.cpu.set_state_internal(CpuState::Error);
                return Err(e);
            }
        }
    }
    disassemble_current(shared, io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;
    use cuss_mem::Memory;
    use std::collections::VecDeque;

    /// A scripted I/O provider for driving the Monitor loop in tests: feeds
    /// a fixed sequence of input lines and records every output line.
    struct ScriptedIo {
        inputs: VecDeque<String>,
        outputs: Vec<String>,
    }

    impl ScriptedIo {
        fn new(lines: &[&str]) -> Self {
            Self {
                inputs: lines.iter().map(|s| s.to_string()).collect(),
                outputs: Vec::new(),
            }
        }
    }

    impl MonitorIo for ScriptedIo {
        fn get_input(&mut self) -> CuResult<Option<String>> {
            Ok(self.inputs.pop_front())
        }

        fn put_output(&mut self, msg: &str) -> CuResult<()> {
            self.outputs.push(msg.to_string());
            Ok(())
        }
    }

    fn shared_paused_at_zero() -> SharedState {
        let mut memory = Memory::new();
        // NOP at 0, NOP at 4.
        memory.set_word(0, 0).unwrap();
        memory.set_word(4, 0).unwrap();
        SharedState::new(Cpu::new(), memory)
    }

    #[test]
    fn unknown_command_is_reported() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["bogus", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        assert!(io.outputs.iter().any(|l| l == "ERROR: Unknown command.\n"));
    }

    #[test]
    fn empty_line_is_ignored() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        assert!(!io.outputs.iter().any(|l| l.contains("Unknown")));
    }

    #[test]
    fn repeat_with_no_prior_command_reports_error_every_time() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&[".", ".", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        let no_prev_count = io
            .outputs
            .iter()
            .filter(|l| l.as_str() == "ERROR: No previous command.\n")
            .count();
        assert_eq!(no_prev_count, 2);
    }

    #[test]
    fn repeat_reruns_last_real_command() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["dis", ".", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        let dis_count = io
            .outputs
            .iter()
            .filter(|l| l.contains("00000000:"))
            .count();
        assert_eq!(dis_count, 2);
    }

    #[test]
    fn step_advances_pc_and_disassembles_new_location() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["step", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        assert!(io.outputs.iter().any(|l| l.contains("00000004:")));
    }

    #[test]
    fn quit_sets_quitting_state() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["quit"]);
        run_monitor(&shared, &mut io).unwrap();
        assert_eq!(shared.lock().cpu.state(), CpuState::Quitting);
    }

    #[test]
    fn eof_behaves_like_quit() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&[]);
        run_monitor(&shared, &mut io).unwrap();
        assert_eq!(shared.lock().cpu.state(), CpuState::Quitting);
    }

    #[test]
    fn reg_dump_has_four_groups_of_eight() {
        let shared = shared_paused_at_zero();
        let mut io = ScriptedIo::new(&["reg", "quit"]);
        run_monitor(&shared, &mut io).unwrap();
        let dump = io
            .outputs
            .iter()
            .find(|l| l.contains("[r00-r07]:"))
            .unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("[r00-r07]:"));
        assert_eq!(lines[0].matches(' ').count(), 8); // label + 8 values
        assert!(lines[3].starts_with("[r24-r31]:"));
    }
}
