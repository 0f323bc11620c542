use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use clap::Parser;

use cuss::cli::Cli;
use cuss::cpu::Cpu;
use cuss::{run_monitor, SharedState, StdIo};
use cuss_mem::Memory;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(log_level).init();

    let mut memory = Memory::new();
    let file = File::open(&cli.memory_image)
        .with_context(|| format!("opening memory image {:?}", cli.memory_image))?;
    memory
        .load_image(BufReader::new(file))
        .with_context(|| format!("loading memory image {:?}", cli.memory_image))?;

    let mut cpu = Cpu::new();
    for addr in &cli.break_points {
        cpu.add_breakpoint(*addr)
            .with_context(|| format!("arming breakpoint at {addr:#010x}"))?;
    }

    let shared = SharedState::new(cpu, memory);

    std::thread::scope(|scope| -> Result<()> {
        scope.spawn(|| cuss::concurrency::run_executor(&shared));

        let mut io = StdIo::new();
        run_monitor(&shared, &mut io).context("running the monitor")?;
        Ok(())
    })?;

    Ok(())
}
