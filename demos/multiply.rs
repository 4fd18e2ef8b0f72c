use color_eyre::eyre::Result;

use acc8::memory::{Memory, Value};
use acc8::processor::ProcessorState;
use acc8::write_instructions;
use acc8::{Emulator, RunOutcome};
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Where the product ends up
const RESULT: Value = 0x32;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()?; // logging

    let mut mem = Memory::default();

    use acc8::instruction::Opcode::*;
    write_instructions!(mem : 0 =>
        LDR, RESULT,
        ADD, 0x30,
        STR, RESULT,
        LDR, 0x31,
        ADD, 0x33,
        STR, 0x31,
        JNE, 0x00,
        JMP, 0x0E
    );
    // factor, counter, result, -1
    write_instructions!(mem : 0x30 => 7, 6, 0, 0xFF);

    let mut emulator = Emulator::from(ProcessorState {
        memory: mem,
        ..ProcessorState::default()
    });
    emulator.insert_breakpoint(0x0E, "END")?;

    while emulator.run(10)? != RunOutcome::Breakpoint {}

    let result = emulator.read_mem(RESULT);
    println!(
        "Program terminated after {} cycles. Result: 0x{:02X} / {}",
        emulator.cycles(),
        result,
        result
    );

    Ok(())
}
