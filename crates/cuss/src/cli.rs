//! Command-line surface for the `cuss` binary.

use clap::Parser;

/// CUSS — the Completely Useless System Simulator for the CUP 32-bit RISC core.
#[derive(Debug, Parser)]
#[command(name = "cuss", version, about, long_about = None)]
pub struct Cli {
    /// Memory image to load before starting the Monitor.
    #[arg(short = 'm', long = "memory-image", value_name = "PATH")]
    pub memory_image: String,

    /// Address to arm a breakpoint at before starting. May be repeated.
    /// Accepts `0x`-prefixed hex, `0o`-prefixed octal, or plain decimal.
    #[arg(short = 'b', long = "break-point", value_name = "ADDR", value_parser = parse_numeric_literal)]
    pub break_points: Vec<u32>,

    /// Raise the log level to `info` (or `debug` if given twice).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses a breakpoint address literal: `0x…`/`0X…` as hex, `0o…`/`0O…` as
/// octal, anything else as decimal. `clap`'s built-in integer parsing doesn't
/// auto-detect a radix
/// prefix, so this is hand-rolled.
fn parse_numeric_literal(s: &str) -> Result<u32, String> {
    let (digits, radix) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (rest, 8)
    } else {
        (s, 10)
    };
    u32::from_str_radix(digits, radix).map_err(|e| format!("invalid numeric literal {s:?}: {e}"))
}
