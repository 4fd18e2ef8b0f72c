use crate::memory::{Byte, Memory, Value};
use crate::{mask, INSTRUCTION_SIZE};

/// Architectural state of the CPU
///
/// `acc` and `pc` are stored wider than eight bits so that an instruction can
/// produce intermediate values (an overflowing sum, a jump target minus the
/// instruction size) before they are masked back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessorState {
    /// Accumulator, the only general purpose register
    pub acc: Value,
    /// Program counter, address of the next instruction
    pub pc: Value,
    /// Main memory
    pub memory: Memory,
}

impl ProcessorState {
    /// Creates a zeroed state
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the program counter to the next instruction slot
    pub fn advance(&mut self) {
        self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
    }

    /// Keeps only the architecturally visible bits of `acc` and `pc`
    pub fn mask(&mut self) {
        self.acc = mask(self.acc);
        self.pc = mask(self.pc);
    }

    /// Accumulator as seen from outside the CPU
    pub fn acc_byte(&self) -> Byte {
        mask(self.acc) as Byte
    }

    /// Program counter as seen from outside the CPU
    pub fn pc_byte(&self) -> Byte {
        mask(self.pc) as Byte
    }
}
