use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::{error, fmt};

use crate::breakpoint::{Breakpoint, BreakpointError, Breakpoints};
use crate::instruction::{DecodeError, Instruction};
use crate::memory::{Byte, InstructionWord, Value};
use crate::processor::ProcessorState;
use crate::{INSTRUCTION_SIZE, MAX_INSTRUCTIONS};
use color_eyre::eyre::{Result, WrapErr};
use log::*;

mod state_file;

pub use state_file::{Snapshot, StateError, StateErrorKind};

/// Reasons for [`Emulator::run`] to give up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// `pc` does not point at the start of an instruction slot
    MisalignedPc { pc: Byte },
    /// The byte at `pc` is not an opcode
    InvalidOpcode { pc: Byte, opcode: Byte },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::MisalignedPc { pc } => {
                write!(f, "program counter `{}` is not aligned to an instruction", pc)
            }
            ExecError::InvalidOpcode { pc, opcode } => {
                write!(f, "invalid opcode `0x{:02X}` at address `{}`", opcode, pc)
            }
        }
    }
}

impl error::Error for ExecError {}

/// Why a successful [`Emulator::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// An instruction moved `pc` onto a breakpoint
    Breakpoint,
    /// All requested steps were executed
    BudgetExhausted,
}

/// The CPU together with its breakpoints and cycle counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emulator {
    state: ProcessorState,
    breakpoints: Breakpoints,
    cycles: u64,
}

impl From<ProcessorState> for Emulator {
    fn from(mut state: ProcessorState) -> Self {
        state.mask();
        Self {
            state,
            ..Self::default()
        }
    }
}

impl Emulator {
    /// Initializes an emulator with zeroed registers and memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the instruction word `pc` points at
    pub fn fetch(&self) -> InstructionWord {
        self.state.memory.read_instruction(self.state.pc)
    }

    pub fn decode(&self, word: InstructionWord) -> Result<Instruction, DecodeError> {
        Instruction::decode(word)
    }

    /// Executes a single instruction. The cycle counter is left alone.
    pub fn execute(&mut self, instruction: &Instruction) {
        instruction.step(&mut self.state);
    }

    /// Runs up to `steps` instructions
    ///
    /// Stops early, successfully, after an instruction lands on a breakpoint.
    /// A misaligned `pc` or an invalid opcode aborts the run before the
    /// offending instruction changes anything.
    pub fn run(&mut self, steps: u64) -> Result<RunOutcome, ExecError> {
        for _ in 0..steps {
            let pc = self.state.pc_byte();

            if self.state.pc % INSTRUCTION_SIZE != 0 {
                let err = ExecError::MisalignedPc { pc };
                warn!("Run stopped after {} cycles: {}", self.cycles, err);
                return Err(err);
            }

            let word = self.fetch();
            let instruction = match self.decode(word) {
                Ok(instruction) => instruction,
                Err(DecodeError { opcode }) => {
                    let err = ExecError::InvalidOpcode { pc, opcode };
                    warn!("Run stopped after {} cycles: {}", self.cycles, err);
                    return Err(err);
                }
            };

            self.execute(&instruction);
            self.cycles += 1;

            if let Some(bp) = self.breakpoints.find_by_address(self.state.pc) {
                info!(
                    "Breakpoint `{}` reached at {} after {} cycles",
                    bp.name(),
                    bp.address(),
                    self.cycles
                );
                return Ok(RunOutcome::Breakpoint);
            }
        }

        Ok(RunOutcome::BudgetExhausted)
    }

    pub fn insert_breakpoint<S: Into<String>>(
        &mut self,
        address: Value,
        name: S,
    ) -> Result<(), BreakpointError> {
        self.breakpoints.insert(address, name)
    }

    pub fn find_breakpoint_by_address(&self, address: Value) -> Option<&Breakpoint> {
        self.breakpoints.find_by_address(address)
    }

    pub fn find_breakpoint_by_name(&self, name: &str) -> Option<&Breakpoint> {
        self.breakpoints.find_by_name(name)
    }

    pub fn delete_breakpoint_by_address(&mut self, address: Value) -> Option<Breakpoint> {
        self.breakpoints.delete_by_address(address)
    }

    pub fn delete_breakpoint_by_name(&mut self, name: &str) -> Option<Breakpoint> {
        self.breakpoints.delete_by_name(name)
    }

    pub fn num_breakpoints(&self) -> usize {
        self.breakpoints.count()
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Number of instructions executed by [`Emulator::run`]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn read_acc(&self) -> Byte {
        self.state.acc_byte()
    }

    pub fn read_pc(&self) -> Byte {
        self.state.pc_byte()
    }

    /// Reads a memory byte, wrapping `address` into memory
    pub fn read_mem(&self, address: Value) -> Byte {
        self.state.memory.read_byte(address)
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn is_zero(&self) -> bool {
        self.state.acc == 0
    }

    /// Whether `pc` currently sits on a breakpoint
    pub fn is_breakpoint(&self) -> bool {
        self.breakpoints.find_by_address(self.state.pc).is_some()
    }

    /// Writes a listing of every instruction slot in memory
    ///
    /// Slots that are blank or hold an invalid opcode only show their raw
    /// bytes.
    pub fn write_program<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for slot in 0..MAX_INSTRUCTIONS as Value {
            let offset = slot * INSTRUCTION_SIZE;
            let word = self.state.memory.read_instruction(offset);

            match self.decode(word) {
                Ok(instruction) if !word.is_blank() => writeln!(
                    out,
                    "{}:\t{}\t{}\t:\t{}",
                    offset, word.opcode, word.address, instruction
                )?,
                _ => writeln!(out, "{}:\t{}\t{}", offset, word.opcode, word.address)?,
            }
        }

        Ok(())
    }

    /// Prints the program listing to stdout
    pub fn print_program(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_program(&mut out)
    }

    /// Copies the complete emulator state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycles: self.cycles,
            acc: self.read_acc(),
            pc: self.read_pc(),
            memory: self.state.memory,
            breakpoints: self.breakpoints.clone(),
        }
    }

    /// Replaces the complete emulator state
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.state = ProcessorState {
            acc: snapshot.acc as Value,
            pc: snapshot.pc as Value,
            memory: snapshot.memory,
        };
        self.breakpoints = snapshot.breakpoints;
        self.cycles = snapshot.cycles;
    }

    /// Loads the emulator state from a state file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid state file. The
    /// emulator is left untouched in that case.
    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read state file `{}`", path.display()))?;
        let snapshot = data
            .parse::<Snapshot>()
            .wrap_err_with(|| format!("Invalid state file `{}`", path.display()))?;

        self.restore(snapshot);
        debug!(
            "Loaded `{}`: {} cycles, ACC {}, PC {}, {} breakpoints",
            path.display(),
            self.cycles,
            self.state.acc,
            self.state.pc,
            self.breakpoints.count()
        );

        Ok(())
    }

    /// Saves the emulator state to a state file
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        fs::write(path, self.snapshot().to_string())
            .wrap_err_with(|| format!("Failed to write state file `{}`", path.display()))?;
        debug!("Saved `{}` after {} cycles", path.display(), self.cycles);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::instruction::Opcode;
    use crate::memory::Memory;
    use crate::write_instructions;
    use color_eyre::eyre::Result;

    const RESULT: Value = 42;
    const COUNTER: Value = 41;

    /// Multiplies 3 by 4 through repeated addition, then spins on `JMP 14`
    fn multiply() -> Emulator {
        let mut mem = Memory::default();

        use crate::instruction::Opcode::*;
        write_instructions!(mem : 0 =>
            LDR, RESULT,
            ADD, 40,
            STR, RESULT,
            LDR, COUNTER,
            ADD, 43,
            STR, COUNTER,
            JNE, 0,
            JMP, 14
        );
        write_instructions!(mem : 40 => 3, 4, 0, 255);

        Emulator::from(ProcessorState {
            memory: mem,
            ..ProcessorState::default()
        })
    }

    /// A unique path in the temp dir, removed on drop
    struct TempFile(PathBuf);

    impl TempFile {
        fn new(name: &str) -> Self {
            let file = format!("acc8-{}-{}.txt", std::process::id(), name);
            Self(std::env::temp_dir().join(file))
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_new() {
        let emulator = Emulator::new();

        assert_eq!(emulator.read_acc(), 0);
        assert_eq!(emulator.read_pc(), 0);
        assert_eq!(emulator.cycles(), 0);
        assert_eq!(emulator.num_breakpoints(), 0);
        assert!((0..256).all(|address| emulator.read_mem(address) == 0));
        assert!(emulator.is_zero());
        assert!(!emulator.is_breakpoint());
    }

    #[test]
    fn test_fetch_decode_execute() -> Result<()> {
        let mut emulator = multiply();

        let word = emulator.fetch();
        assert_eq!(word, InstructionWord::new(Opcode::LDR.into(), 42));

        let instruction = emulator.decode(word)?;
        assert_eq!(instruction, Instruction::Ldr(42));

        emulator.execute(&Instruction::Ldr(40));
        assert_eq!(emulator.read_acc(), 3);
        assert_eq!(emulator.read_pc(), 2);
        assert_eq!(emulator.cycles(), 0);

        assert!(emulator.decode(InstructionWord::new(8, 0)).is_err());

        Ok(())
    }

    #[test]
    fn test_run_zero_steps() -> Result<()> {
        let mut emulator = multiply();

        assert_eq!(emulator.run(0)?, RunOutcome::BudgetExhausted);
        assert_eq!(emulator.cycles(), 0);
        assert_eq!(emulator.read_pc(), 0);

        Ok(())
    }

    #[test]
    fn test_run_single_steps() -> Result<()> {
        let mut emulator = multiply();
        // (pc, acc, result) after each of the first loop iteration's steps
        let expected = [
            (2, 0, 0),
            (4, 3, 0),
            (6, 3, 3),
            (8, 4, 3),
            (10, 3, 3),
            (12, 3, 3),
            (0, 3, 3),
        ];

        for (cycle, &(pc, acc, result)) in expected.iter().enumerate() {
            assert_eq!(emulator.run(1)?, RunOutcome::BudgetExhausted);
            assert_eq!(emulator.read_pc(), pc);
            assert_eq!(emulator.read_acc(), acc);
            assert_eq!(emulator.read_mem(RESULT), result);
            assert_eq!(emulator.cycles(), cycle as u64 + 1);
        }

        Ok(())
    }

    #[test]
    fn test_run_to_completion() -> Result<()> {
        let mut emulator = multiply();

        assert_eq!(emulator.run(1000)?, RunOutcome::BudgetExhausted);
        assert_eq!(emulator.cycles(), 1000);
        assert_eq!(emulator.read_pc(), 14);
        assert_eq!(emulator.read_mem(RESULT), 12);
        assert_eq!(emulator.read_mem(COUNTER), 0);
        assert!(emulator.is_zero());

        Ok(())
    }

    #[test]
    fn test_run_stops_at_breakpoints() -> Result<()> {
        let mut emulator = multiply();
        emulator.insert_breakpoint(0, "START")?;
        emulator.insert_breakpoint(12, "LOOPEND")?;
        emulator.insert_breakpoint(14, "END")?;

        // a breakpoint at the current pc does not prevent the first step
        assert!(emulator.is_breakpoint());
        assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
        assert_eq!(emulator.read_pc(), 12);
        assert_eq!(emulator.cycles(), 6);
        assert_eq!(emulator.read_mem(RESULT), 3);
        assert!(emulator.is_breakpoint());

        assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
        assert_eq!(emulator.read_pc(), 0);
        assert_eq!(emulator.cycles(), 7);

        emulator.delete_breakpoint_by_name("START");
        for i in 1..4 {
            assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
            assert_eq!(emulator.read_pc(), 12);
            assert_eq!(emulator.cycles(), 6 + 7 * i);
            assert_eq!(emulator.read_mem(RESULT) as u64, 3 * (i + 1));
        }

        // the counter reached zero, JNE falls through to the end
        assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
        assert_eq!(emulator.read_pc(), 14);
        assert_eq!(emulator.cycles(), 28);

        // spinning on the breakpoint runs one instruction per call
        assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
        assert_eq!(emulator.read_pc(), 14);
        assert_eq!(emulator.cycles(), 29);

        emulator.delete_breakpoint_by_address(14);
        assert_eq!(emulator.run(1000)?, RunOutcome::BudgetExhausted);
        assert_eq!(emulator.cycles(), 1029);
        assert!(!emulator.is_breakpoint());
        assert_eq!(emulator.read_mem(RESULT), 12);

        Ok(())
    }

    #[test]
    fn test_run_misaligned_pc() -> Result<()> {
        let mut emulator = multiply();
        let mut snapshot = emulator.snapshot();
        snapshot.pc = 3;
        emulator.restore(snapshot);

        assert_eq!(emulator.run(0)?, RunOutcome::BudgetExhausted);

        let err = emulator.run(5).unwrap_err();
        assert_eq!(err, ExecError::MisalignedPc { pc: 3 });
        assert_eq!(emulator.cycles(), 0);
        assert_eq!(emulator.read_pc(), 3);
        assert_eq!(emulator.read_acc(), 0);

        Ok(())
    }

    #[test]
    fn test_run_invalid_opcode() -> Result<()> {
        let mut mem = Memory::default();
        use crate::instruction::Opcode::*;
        write_instructions!(mem : 0 => LDR, 40, 9, 0);
        mem.write_byte(40, 17);
        let mut emulator = Emulator::from(ProcessorState {
            memory: mem,
            ..ProcessorState::default()
        });

        let err = emulator.run(10).unwrap_err();
        assert_eq!(err, ExecError::InvalidOpcode { pc: 2, opcode: 9 });
        assert_eq!(emulator.cycles(), 1);
        assert_eq!(emulator.read_pc(), 2);
        assert_eq!(emulator.read_acc(), 17);

        // the emulator stays usable
        assert!(emulator.run(1).is_err());
        assert_eq!(emulator.cycles(), 1);

        Ok(())
    }

    #[test]
    fn test_clone_is_independent() -> Result<()> {
        let mut emulator = multiply();
        emulator.insert_breakpoint(12, "LOOPEND")?;

        let copy = emulator.clone();
        emulator.run(3)?;
        emulator.delete_breakpoint_by_name("LOOPEND");

        assert_eq!(copy.cycles(), 0);
        assert_eq!(copy.read_mem(RESULT), 0);
        assert_eq!(copy.num_breakpoints(), 1);
        assert_eq!(emulator.read_mem(RESULT), 3);

        let moved = std::mem::take(&mut emulator);
        assert_eq!(moved.cycles(), 3);
        assert_eq!(emulator, Emulator::new());

        Ok(())
    }

    #[test]
    fn test_write_program() -> Result<()> {
        let mut mem = Memory::default();
        use crate::instruction::Opcode::*;
        write_instructions!(mem : 0 => LDR, 32, 12, 7, JNE, 0, ADD, 0);
        let emulator = Emulator::from(ProcessorState {
            memory: mem,
            ..ProcessorState::default()
        });

        let mut out = Vec::new();
        emulator.write_program(&mut out)?;
        let listing = String::from_utf8(out)?;
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines.len(), 128);
        assert_eq!(lines[0], "0:\t4\t32\t:\tLDR: ACC <- [32]");
        assert_eq!(lines[1], "2:\t12\t7");
        assert_eq!(lines[2], "4:\t7\t0\t:\tJNE: PC  <- 0 if ACC != 0");
        // ADD 0 encodes as two zero bytes and is listed raw
        assert_eq!(lines[3], "6:\t0\t0");
        assert_eq!(lines[127], "254:\t0\t0");

        Ok(())
    }

    #[test]
    fn test_save_and_load_state() -> Result<()> {
        let file = TempFile::new("round-trip");

        let mut emulator = multiply();
        emulator.insert_breakpoint(14, "END")?;
        emulator.insert_breakpoint(12, "LOOPEND")?;
        emulator.insert_breakpoint(0, "START")?;
        emulator.run(9)?;
        emulator.save_state(&file.0)?;

        let mut loaded = Emulator::new();
        loaded.insert_breakpoint(100, "STALE")?;
        loaded.load_state(&file.0)?;

        assert_eq!(loaded.read_acc(), emulator.read_acc());
        assert_eq!(loaded.read_pc(), emulator.read_pc());
        assert_eq!(loaded.cycles(), emulator.cycles());
        assert!((0..256).all(|a| loaded.read_mem(a) == emulator.read_mem(a)));
        assert_eq!(loaded.num_breakpoints(), 3);
        assert!(loaded.find_breakpoint_by_name("STALE").is_none());
        for bp in emulator.breakpoints().iter() {
            let other = loaded.find_breakpoint_by_address(bp.address() as Value);
            assert_eq!(other.map(Breakpoint::name), Some(bp.name()));
        }

        // both run on identically
        assert_eq!(loaded.run(100)?, emulator.run(100)?);
        assert_eq!(loaded.snapshot(), emulator.snapshot());

        Ok(())
    }

    #[test]
    fn test_saved_breakpoint_names_survive_load() -> Result<()> {
        let file = TempFile::new("names");

        let mut emulator = multiply();
        for &name in ["", " X", "X ", "A\nB", "TWO WORDS"].iter() {
            let err = emulator.insert_breakpoint(4, name).unwrap_err();
            assert_eq!(
                err,
                BreakpointError::InvalidName {
                    name: name.to_string()
                }
            );
        }
        assert_eq!(emulator.num_breakpoints(), 0);

        emulator.insert_breakpoint(4, "X")?;
        emulator.insert_breakpoint(6, "loop-2.b")?;
        emulator.save_state(&file.0)?;

        let mut loaded = Emulator::new();
        loaded.load_state(&file.0)?;
        assert_eq!(loaded.breakpoints(), emulator.breakpoints());
        assert_eq!(
            loaded.find_breakpoint_by_name("loop-2.b").map(Breakpoint::address),
            Some(6)
        );

        Ok(())
    }

    #[test]
    fn test_load_demo_program() -> Result<()> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/programs/multiply.txt");

        let mut emulator = Emulator::new();
        emulator.load_state(path)?;
        assert_eq!(emulator.num_breakpoints(), 2);
        assert_eq!(emulator.read_mem(0x30), 7);

        let mut out = Vec::new();
        emulator.write_program(&mut out)?;
        let listing = String::from_utf8(out)?;
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "0:\t4\t50\t:\tLDR: ACC <- [50]");
        assert_eq!(lines[1], "2:\t0\t48\t:\tADD: ACC <- ACC + [48]");
        assert_eq!(lines[7], "14:\t6\t14\t:\tJMP: PC  <- 14");
        assert_eq!(lines[8], "16:\t0\t0");

        let end = emulator.find_breakpoint_by_name("END").map(Breakpoint::address);
        while Some(emulator.read_pc()) != end {
            assert_eq!(emulator.run(1000)?, RunOutcome::Breakpoint);
        }
        assert_eq!(emulator.read_mem(0x32), 42);
        assert_eq!(emulator.cycles(), 42);

        Ok(())
    }

    #[test]
    fn test_load_state_missing_file() {
        let file = TempFile::new("missing");
        let mut emulator = Emulator::new();

        assert!(emulator.load_state(&file.0).is_err());
        assert_eq!(emulator, Emulator::new());
    }

    #[test]
    fn test_failed_load_leaves_state_untouched() -> Result<()> {
        let file = TempFile::new("conflict");

        let mut source = multiply();
        source.insert_breakpoint(4, "A")?;
        source.insert_breakpoint(6, "B")?;
        let mut data = source.snapshot().to_string();
        data.push_str("8 A\n");
        fs::write(&file.0, data)?;

        let mut emulator = multiply();
        emulator.insert_breakpoint(12, "LOOPEND")?;
        emulator.run(3)?;
        let before = emulator.clone();

        let report = emulator.load_state(&file.0).unwrap_err();
        let err = report.downcast_ref::<StateError>();
        assert_eq!(
            err.map(StateError::kind),
            Some(StateErrorKind::BreakpointConflict)
        );
        assert_eq!(emulator, before);

        Ok(())
    }
}
