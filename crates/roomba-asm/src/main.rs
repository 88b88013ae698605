//! CLI entry point for the Roomba card assembler.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use roomba_asm::{assemble, Assembly, ErrorCollection};
use roomba_core::{
    drive_tick_traced, format_listing, from_json, to_json, CoreConfig, PeripheralSlots,
    PlanarChassis, Register, TimerPeripheral, TraceEvent, TraceSink, VmState,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: roomba-asm <command> [options]

Commands:
  build  <input> [-o <output>] [--verbose]  Assemble source to a saved state
  run    <input> [--ticks N] [--trace]      Assemble and drive a simulated body
  disasm <state.json>                       List the program in a saved state

Options:
  -o, --output <file>  Output file path (default: input stem + .json)
  -v, --verbose        Print listing to stderr (build only)
  -n, --ticks <N>      Ticks to run (default: 1000)
  -t, --trace          Print trace events to stderr (run only)
  -h, --help           Show this help message

Examples:
  roomba-asm build patrol.cards
  roomba-asm run patrol.md --ticks 200 --trace
  roomba-asm disasm patrol.json
";

const DEFAULT_TICKS: u32 = 1000;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildArgs),
    Run(RunArgs),
    Disasm(DisasmArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    input: PathBuf,
    ticks: u32,
    trace: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DisasmArgs {
    input: PathBuf,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "disasm" => parse_disasm_args(args)
            .map(Command::Disasm)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn set_input(input: &mut Option<PathBuf>, arg: OsString) -> Result<(), String> {
    if arg.to_string_lossy().starts_with('-') {
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }
    if input.is_some() {
        return Err("multiple input paths provided".to_string());
    }
    *input = Some(PathBuf::from(arg));
    Ok(())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        set_input(&mut input, arg)?;
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(BuildArgs {
        input,
        output,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut ticks = DEFAULT_TICKS;
    let mut trace = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--trace" || arg == "-t" {
            trace = true;
            continue;
        }

        if arg == "--ticks" || arg == "-n" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --ticks".to_string())?;
            let text = value.to_string_lossy();
            ticks = text
                .parse()
                .map_err(|_| format!("invalid tick count: {text}"))?;
            continue;
        }

        set_input(&mut input, arg)?;
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(RunArgs {
        input,
        ticks,
        trace,
    })
}

fn parse_disasm_args(args: impl Iterator<Item = OsString>) -> Result<DisasmArgs, String> {
    let mut input: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        set_input(&mut input, arg)?;
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(DisasmArgs { input })
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.json"))
}

fn assemble_reporting(input: &Path) -> Result<Assembly, i32> {
    match assemble(input) {
        Ok(assembly) => {
            for warning in &assembly.warnings {
                eprintln!("{}", warning.format_for_stderr());
            }
            Ok(assembly)
        }
        Err(errors) => {
            report_errors(&errors);
            Err(1)
        }
    }
}

fn report_errors(errors: &ErrorCollection) {
    eprintln!("{}", errors.format_for_stderr());
}

fn run_build(args: BuildArgs) -> Result<(), i32> {
    let assembly = assemble_reporting(&args.input)?;

    if args.verbose {
        print_listing(&assembly);
    }

    let instructions = assembly.listing.len();
    let cards = assembly.program.card_count();
    let json = to_json(&assembly.into_state()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = fs::write(&output_path, json) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    println!(
        "Assembled {} ({cards} cards, {instructions} instructions) -> {}",
        args.input.display(),
        output_path.display()
    );

    Ok(())
}

fn print_listing(assembly: &Assembly) {
    for entry in &assembly.listing {
        let text = entry.instruction.to_string();
        eprintln!(
            "{:>2}:{:<2} {text:<16} ; {}",
            entry.card, entry.index, entry.location
        );
    }
}

/// Prints trace events to stderr as they happen.
struct StderrTrace;

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::InstructionRetired {
                card,
                ip,
                instruction,
            } => eprintln!("trace: {card}:{ip} {instruction}"),
            TraceEvent::ConditionsFailed { card, ip } => {
                eprintln!("trace: {card}:{ip} no eligible instruction");
            }
            TraceEvent::FaultRaised { cause, card, ip } => {
                eprintln!("trace: {card}:{ip} fault: {cause}");
            }
            TraceEvent::ModeEntered { mode } => eprintln!("trace: mode {mode}"),
            TraceEvent::ModeClaimed { slot, mode } => {
                eprintln!("trace: slot {slot} handled {mode}");
            }
            TraceEvent::ModeUnclaimed { mode } => eprintln!("trace: nobody handled {mode}"),
        }
    }
}

fn run_program(args: &RunArgs) -> Result<(), i32> {
    let mut state = assemble_reporting(&args.input)?.into_state();
    let mut chassis = PlanarChassis::default();
    let mut slots = PeripheralSlots::new().with(0, Box::new(TimerPeripheral::new()));
    let config = CoreConfig {
        tracing_enabled: args.trace,
        ..CoreConfig::default()
    };
    let mut sink = StderrTrace;

    for _ in 0..args.ticks {
        drive_tick_traced(&mut state, &mut chassis, &mut slots, &config, &mut sink);
    }

    print_summary(&state, &chassis, args.ticks);
    Ok(())
}

fn print_summary(state: &VmState, chassis: &PlanarChassis, ticks: u32) {
    println!("ticks: {ticks}");
    println!("card: {}  ip: {}", state.card_idx, state.ip);
    let registers: Vec<String> = Register::ALL
        .into_iter()
        .map(|reg| format!("{reg}={}", state.register(reg)))
        .collect();
    println!("registers: {}", registers.join(" "));
    println!("mode: {}", state.mode.id());
    println!(
        "position: x={:.3} z={:.3} heading={:.1}deg",
        chassis.x,
        chassis.z,
        chassis.heading.to_degrees()
    );
}

fn run_disasm(args: &DisasmArgs) -> Result<(), i32> {
    let text = fs::read_to_string(&args.input).map_err(|e| {
        eprintln!("error: failed to read {}: {e}", args.input.display());
        1
    })?;

    let report = from_json(&text);
    for warning in &report.warnings {
        eprintln!("{}: warning: {warning}", args.input.display());
    }
    print!("{}", format_listing(&report.state));
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Build(args) => run_build(args),
                Command::Run(args) => run_program(&args),
                Command::Disasm(args) => run_disasm(&args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
