use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use acc8::Emulator;
use simple_logger::SimpleLogger;

/// Prints the program stored in a state file
#[derive(Parser, Debug)]
struct Args {
    /// State file to list
    #[arg(default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/programs/multiply.txt"))]
    state: PathBuf,
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init()?; // logging

    let args = Args::parse();

    let mut emulator = Emulator::new();
    emulator.load_state(&args.state)?;
    emulator.print_program()?;

    for bp in emulator.breakpoints().iter() {
        println!("breakpoint {} at {}", bp.name(), bp.address());
    }

    Ok(())
}
