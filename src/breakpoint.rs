use std::{error, fmt};

use crate::mask;
use crate::memory::{Byte, Value};
use log::debug;

/// A named stop point at an instruction address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    address: Byte,
    name: String,
}

impl Breakpoint {
    pub fn new<S: Into<String>>(address: Value, name: S) -> Self {
        Self {
            address: mask(address) as Byte,
            name: name.into(),
        }
    }

    pub fn address(&self) -> Byte {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the breakpoint sits at `address` (wrapped into memory)
    pub fn has_address(&self, address: Value) -> bool {
        self.address as Value == mask(address)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name == name
    }

    /// A name is a single non-empty word, so it fits on a state file line
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(char::is_whitespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointError {
    DuplicateAddress { address: Byte },
    DuplicateName { name: String },
    /// Names must be non-empty and free of whitespace
    InvalidName { name: String },
}

impl fmt::Display for BreakpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakpointError::DuplicateAddress { address } => {
                write!(f, "a breakpoint already exists at address `{}`", address)
            }
            BreakpointError::DuplicateName { name } => {
                write!(f, "a breakpoint named `{}` already exists", name)
            }
            BreakpointError::InvalidName { name } => {
                write!(f, "invalid breakpoint name `{}`", name.escape_debug())
            }
        }
    }
}

impl error::Error for BreakpointError {}

/// Registry of breakpoints. No two entries share an address or a name.
///
/// References handed out by the `find_*` methods are valid until the next
/// insert or delete. Two registries are equal when they hold the same
/// breakpoints, regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct Breakpoints {
    entries: Vec<Breakpoint>,
}

impl PartialEq for Breakpoints {
    fn eq(&self, other: &Self) -> bool {
        self.count() == other.count()
            && self.iter().all(|bp| {
                other.find_by_address(bp.address as Value) == Some(bp)
                    && other.find_by_name(&bp.name) == Some(bp)
            })
    }
}

impl Eq for Breakpoints {}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a breakpoint. Fails if the name is invalid or if its address or
    /// its name is already taken, in which case the registry is left
    /// unchanged.
    pub fn insert<S: Into<String>>(
        &mut self,
        address: Value,
        name: S,
    ) -> Result<(), BreakpointError> {
        let breakpoint = Breakpoint::new(address, name);

        if !Breakpoint::is_valid_name(&breakpoint.name) {
            return Err(BreakpointError::InvalidName {
                name: breakpoint.name,
            });
        }
        if self.find_by_address(breakpoint.address as Value).is_some() {
            return Err(BreakpointError::DuplicateAddress {
                address: breakpoint.address,
            });
        }
        if self.find_by_name(&breakpoint.name).is_some() {
            return Err(BreakpointError::DuplicateName {
                name: breakpoint.name,
            });
        }

        debug!("Breakpoint `{}` set at {}", breakpoint.name, breakpoint.address);
        self.entries.push(breakpoint);

        Ok(())
    }

    pub fn find_by_address(&self, address: Value) -> Option<&Breakpoint> {
        self.entries.iter().find(|bp| bp.has_address(address))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Breakpoint> {
        self.entries.iter().find(|bp| bp.has_name(name))
    }

    /// Removes the breakpoint at `address` and returns it
    pub fn delete_by_address(&mut self, address: Value) -> Option<Breakpoint> {
        let index = self.entries.iter().position(|bp| bp.has_address(address))?;
        let removed = self.entries.remove(index);

        debug!("Breakpoint `{}` at {} removed", removed.name, removed.address);
        Some(removed)
    }

    /// Removes the breakpoint called `name` and returns it
    pub fn delete_by_name(&mut self, name: &str) -> Option<Breakpoint> {
        let address = self.find_by_name(name)?.address;
        self.delete_by_address(address as Value)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the breakpoints in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.entries.iter()
    }
}
