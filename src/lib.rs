//! Emulator for a small 8-bit accumulator machine.
//!
//! The machine has one accumulator, a program counter and 256 bytes of
//! memory. Every instruction is two bytes wide: an opcode followed by the
//! address it operates on.

pub mod breakpoint;
pub mod emulator;
pub mod instruction;
pub mod memory;
pub mod processor;

/// Width of the accumulator, the program counter and a memory cell
pub const ARCH_BITS: u32 = 8;
/// Mask keeping the architecturally visible bits of a value
pub const ARCH_BITMASK: memory::Value = (1 << ARCH_BITS) - 1;
/// Size of every instruction in bytes
pub const INSTRUCTION_SIZE: memory::Value = 2;
/// Number of addressable bytes
pub const MEMORY_SIZE: usize = 256;
/// Number of instruction slots in memory
pub const MAX_INSTRUCTIONS: usize = MEMORY_SIZE / INSTRUCTION_SIZE as usize;

/// Reduces `value` to its low [`ARCH_BITS`] bits
pub fn mask(value: memory::Value) -> memory::Value {
    value & ARCH_BITMASK
}

pub use breakpoint::{Breakpoint, BreakpointError, Breakpoints};
pub use emulator::{Emulator, ExecError, RunOutcome, Snapshot};
pub use instruction::{DecodeError, Instruction, Opcode};
pub use memory::{Byte, InstructionWord, Memory, Value};
pub use processor::ProcessorState;
