//! Text format of a saved emulator:
//!
//! ```text
//! <total cycles>
//! <acc>
//! <pc>
//! <memory[0]>
//! ...
//! <memory[255]>
//! <address> <name>      (zero or more breakpoints)
//! ```

use std::borrow::Cow;
use std::str::{FromStr, Lines};
use std::{error, fmt};

use crate::breakpoint::{BreakpointError, Breakpoints};
use crate::memory::{Byte, Memory, Value};
use crate::{ARCH_BITMASK, MEMORY_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorKind {
    MissingLine,
    InvalidNumber,
    OutOfRange { value: i64, max: i64 },
    MissingBreakpointName,
    InvalidBreakpointName,
    BreakpointConflict,
}

impl fmt::Display for StateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateErrorKind::MissingLine => f.write_str("unexpected end of file"),
            StateErrorKind::InvalidNumber => f.write_str("invalid number"),
            StateErrorKind::OutOfRange { value, max } => {
                write!(f, "value `{}` is outside of `0..={}`", value, max)
            }
            StateErrorKind::MissingBreakpointName => f.write_str("breakpoint has no name"),
            StateErrorKind::InvalidBreakpointName => f.write_str("invalid breakpoint name"),
            StateErrorKind::BreakpointConflict => f.write_str("conflicting breakpoint"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError {
    kind: StateErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl StateError {
    fn new<C, S>(kind: StateErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> StateErrorKind {
        self.kind
    }

    /// Line of the state file the error was found on, starting at 1
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for StateError {}

pub type Result<T, E = StateError> = std::result::Result<T, E>;

/// Everything a state file holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub cycles: u64,
    pub acc: Byte,
    pub pc: Byte,
    pub memory: Memory,
    pub breakpoints: Breakpoints,
}

impl FromStr for Snapshot {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Parser::new(s).parse().map_err(|err| {
            log::error!("{}", err);
            err
        })
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.cycles)?;
        writeln!(f, "{}", self.acc)?;
        writeln!(f, "{}", self.pc)?;
        for byte in self.memory.data.iter() {
            writeln!(f, "{}", byte)?;
        }
        for bp in self.breakpoints.iter() {
            writeln!(f, "{} {}", bp.address(), bp.name())?;
        }

        Ok(())
    }
}

const MAX_BYTE: i64 = ARCH_BITMASK as i64;
const MAX_ADDRESS: i64 = MEMORY_SIZE as i64 - 1;

struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
        }
    }

    /// Consumes `self` and parses the whole file. Stops at the first error.
    fn parse(mut self) -> Result<Snapshot> {
        let cycles = self.parse_field("total cycles", i64::MAX)? as u64;
        let acc = self.parse_field("accumulator", MAX_BYTE)? as Byte;
        let pc = self.parse_field("program counter", MAX_ADDRESS)? as Byte;

        let mut memory = Memory::default();
        for address in 0..MEMORY_SIZE {
            let context = format!("memory byte {}", address);
            memory.data[address] = self.parse_field(context, MAX_BYTE)? as Byte;
        }

        let mut breakpoints = Breakpoints::new();
        while let Some(line) = self.next_line() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.parse_breakpoint(line, &mut breakpoints)?;
        }

        log::debug!(
            "Parsed {} lines, {} breakpoints",
            self.line_nr,
            breakpoints.count()
        );

        Ok(Snapshot {
            cycles,
            acc,
            pc,
            memory,
            breakpoints,
        })
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_nr += 1;
        Some(line)
    }

    /// Parses the next line as a single number in `0..=max`
    fn parse_field<S>(&mut self, field: S, max: i64) -> Result<i64>
    where
        S: Into<Cow<'static, str>>,
    {
        let field = field.into();
        let line = match self.next_line() {
            Some(line) => line,
            None => {
                return Err(StateError::new(
                    StateErrorKind::MissingLine,
                    format!("expected {}", field),
                    self.line_nr + 1,
                ))
            }
        };

        self.parse_number(line, max, field)
    }

    fn parse_number(&self, text: &str, max: i64, field: Cow<'static, str>) -> Result<i64> {
        let value = text.trim().parse::<i64>().map_err(|_| {
            StateError::new(
                StateErrorKind::InvalidNumber,
                format!("{} `{}`", field, text),
                self.line_nr,
            )
        })?;

        if value < 0 || value > max {
            return Err(StateError::new(
                StateErrorKind::OutOfRange { value, max },
                field,
                self.line_nr,
            ));
        }

        Ok(value)
    }

    /// Parses `<address> <name>` and registers the breakpoint
    fn parse_breakpoint(&self, line: &str, breakpoints: &mut Breakpoints) -> Result<()> {
        let (address, name) = match line.split_once(char::is_whitespace) {
            Some((address, name)) => (address, name.trim()),
            None => {
                return Err(StateError::new(
                    StateErrorKind::MissingBreakpointName,
                    format!("`{}`", line),
                    self.line_nr,
                ))
            }
        };

        let address = self.parse_number(address, MAX_ADDRESS, "breakpoint address".into())?;

        breakpoints
            .insert(address as Value, name)
            .map_err(|err| {
                let kind = match err {
                    BreakpointError::InvalidName { .. } => StateErrorKind::InvalidBreakpointName,
                    _ => StateErrorKind::BreakpointConflict,
                };
                StateError::new(kind, err.to_string(), self.line_nr)
            })
    }
}
