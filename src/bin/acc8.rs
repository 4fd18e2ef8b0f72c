use std::path::PathBuf;

use acc8::{Emulator, RunOutcome, Value};
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

#[derive(Parser, Debug)]
#[command(name = "acc8")]
#[command(about = "Runs a program on the 8-bit accumulator machine", long_about = None)]
struct Args {
    /// State file to start from
    state: PathBuf,

    /// Maximum number of instructions to execute
    #[arg(short, long, default_value_t = 1000)]
    steps: u64,

    /// Extra breakpoint as ADDR:NAME, may be repeated
    #[arg(short = 'b', long = "break", value_name = "ADDR:NAME")]
    breakpoints: Vec<String>,

    /// Print the program listing before running
    #[arg(short, long)]
    print: bool,

    /// Write the resulting state to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .parse()
        .map_err(|_| format!("unknown log level `{}`", level))
}

fn parse_breakpoint(arg: &str) -> Result<(Value, &str)> {
    let (address, name) = arg
        .split_once(':')
        .ok_or_else(|| eyre!("breakpoint `{}` is not of the form ADDR:NAME", arg))?;
    let address = address
        .trim()
        .parse::<Value>()
        .wrap_err_with(|| format!("invalid breakpoint address in `{}`", arg))?;

    Ok((address, name))
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    let args = Args::parse();
    SimpleLogger::new().with_level(args.log_level).init()?; // logging

    let mut emulator = Emulator::new();
    emulator.load_state(&args.state)?;

    for arg in &args.breakpoints {
        let (address, name) = parse_breakpoint(arg)?;
        emulator
            .insert_breakpoint(address, name)
            .wrap_err_with(|| format!("cannot add breakpoint `{}`", arg))?;
    }

    if args.print {
        emulator.print_program()?;
    }

    let outcome = emulator.run(args.steps)?;
    match outcome {
        RunOutcome::Breakpoint => {
            let name = emulator
                .find_breakpoint_by_address(emulator.read_pc() as Value)
                .map(|bp| bp.name().to_string())
                .unwrap_or_default();
            println!("Stopped at breakpoint `{}`", name);
        }
        RunOutcome::BudgetExhausted => println!("Executed {} steps", args.steps),
    }
    println!(
        "ACC {} PC {} cycles {}",
        emulator.read_acc(),
        emulator.read_pc(),
        emulator.cycles()
    );

    if let Some(output) = &args.output {
        emulator.save_state(output)?;
    }

    Ok(())
}
