use crate::{mask, MEMORY_SIZE};

pub type Byte = u8; // 1 byte
pub type Value = i32; // accumulator / program counter, wider than the architecture

/// The two bytes of an encoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstructionWord {
    pub opcode: Byte,
    pub address: Byte,
}

impl InstructionWord {
    pub fn new(opcode: Byte, address: Byte) -> Self {
        Self { opcode, address }
    }

    /// Both bytes are zero, i.e. the slot was never written
    pub fn is_blank(&self) -> bool {
        self.opcode == 0 && self.address == 0
    }
}

/// Emulates memory for use with the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory {
    /// The actual data of the memory
    pub data: [Byte; MEMORY_SIZE],
}

impl Default for Memory {
    /// Initializes the memory
    fn default() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }
}

impl Memory {
    /// Reads a byte from the memory. The position wraps around.
    pub fn read_byte(&self, position: Value) -> Byte {
        self.data[mask(position) as usize]
    }

    /// Writes a byte to the memory. The position wraps around.
    pub fn write_byte(&mut self, position: Value, value: Byte) {
        self.data[mask(position) as usize] = value;
    }

    /// Reads the instruction stored at `position` and the byte after it
    pub fn read_instruction(&self, position: Value) -> InstructionWord {
        InstructionWord {
            opcode: self.read_byte(position),
            address: self.read_byte(position + 1),
        }
    }

    /// Writes an encoded instruction at `position`
    pub fn write_instruction(&mut self, position: Value, word: InstructionWord) {
        self.write_byte(position, word.opcode);
        self.write_byte(position + 1, word.address);
    }

    /// Writes an array of bytes to the memory, wrapping at the end
    pub fn write_array(&mut self, position: Value, data: &[Byte]) {
        for (offset, byte) in data.iter().enumerate() {
            self.write_byte(position + offset as Value, *byte);
        }
    }
}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ]);
    };
}
