use std::convert::TryFrom;
use std::{error, fmt};

use crate::memory::{Byte, InstructionWord, Value};
use crate::processor::ProcessorState;
use crate::{mask, INSTRUCTION_SIZE};
use log::debug;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// The opcode byte of an instruction word is not a known opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub opcode: Byte,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid opcode `0x{:02X}`", self.opcode)
    }
}

impl error::Error for DecodeError {}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident ( $variant:ident ) = $repr:literal , )+ ) => {
        /// Defines the opcodes understood by the CPU
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Opcode {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Opcode {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl fmt::Display for Opcode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }

        /// A decoded instruction. The operand is always a valid address.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Instruction {
            $(
                $( #[doc = $doc] )+
                $variant(Byte),
            )+
        }

        impl Instruction {
            /// Builds an instruction, wrapping `address` into memory
            pub fn new(opcode: Opcode, address: Value) -> Self {
                let address = mask(address) as Byte;
                match opcode {
                    $( Opcode::$name => Self::$variant(address) , )+
                }
            }

            pub fn opcode(&self) -> Opcode {
                match self {
                    $( Self::$variant(_) => Opcode::$name , )+
                }
            }

            /// The memory address (or jump target) this instruction refers to
            pub fn address(&self) -> Byte {
                match *self {
                    $( Self::$variant(address) => address , )+
                }
            }
        }
    }
}

instructions! {
    /// Add a memory byte to the accumulator
    ADD(Add) = 0,
    /// Bitwise and of the accumulator with a memory byte
    AND(And) = 1,
    /// Bitwise or of the accumulator with a memory byte
    ORR(Orr) = 2,
    /// Bitwise exclusive or of the accumulator with a memory byte
    XOR(Xor) = 3,
    /// Load a memory byte into the accumulator
    LDR(Ldr) = 4,
    /// Store the accumulator into memory
    STR(Str) = 5,
    /// Jump to an address
    JMP(Jmp) = 6,
    /// Jump to an address if the accumulator is not zero
    JNE(Jne) = 7,
}

/// Value the raw effect of a jump leaves in `pc`, so that the uniform advance
/// lands on `address`
fn jump_target(address: Byte) -> Value {
    address as Value - INSTRUCTION_SIZE
}

impl Instruction {
    /// Decodes an instruction word
    pub fn decode(word: InstructionWord) -> Result<Self, DecodeError> {
        Self::try_from(word)
    }

    /// Encodes the instruction as it is stored in memory
    pub fn encode(&self) -> InstructionWord {
        InstructionWord::new(self.opcode().into(), self.address())
    }

    pub fn mnemonic(&self) -> &'static str {
        self.opcode().mnemonic()
    }

    /// Executes the instruction: applies its effect, moves `pc` to the next
    /// slot and masks `acc` and `pc` to eight bits.
    pub fn step(&self, state: &mut ProcessorState) {
        self.apply_raw_effect(state);
        state.advance();
        state.mask();

        debug!("{} => ACC {} PC {}", self, state.acc, state.pc);
    }

    /// Applies only the instruction specific effect
    ///
    /// Nothing is masked and `pc` is not advanced. A taken jump leaves
    /// `pc` at `address - 2`, which is negative for a jump to address 0.
    pub fn apply_raw_effect(&self, state: &mut ProcessorState) {
        match *self {
            Instruction::Add(address) => {
                let value = state.memory.read_byte(address as Value);
                state.acc = state.acc.wrapping_add(value as Value);
            }
            Instruction::And(address) => {
                state.acc &= state.memory.read_byte(address as Value) as Value;
            }
            Instruction::Orr(address) => {
                state.acc |= state.memory.read_byte(address as Value) as Value;
            }
            Instruction::Xor(address) => {
                state.acc ^= state.memory.read_byte(address as Value) as Value;
            }
            Instruction::Ldr(address) => {
                state.acc = state.memory.read_byte(address as Value) as Value;
            }
            Instruction::Str(address) => {
                let value = state.acc_byte();
                state.memory.write_byte(address as Value, value);
            }
            Instruction::Jmp(address) => {
                state.pc = jump_target(address);
            }
            Instruction::Jne(address) => {
                if state.acc != 0 {
                    state.pc = jump_target(address);
                }
            }
        }
    }
}

impl TryFrom<InstructionWord> for Instruction {
    type Error = DecodeError;

    fn try_from(word: InstructionWord) -> Result<Self, Self::Error> {
        let opcode = Opcode::try_from(word.opcode).map_err(|_| DecodeError {
            opcode: word.opcode,
        })?;
        Ok(Instruction::new(opcode, word.address as Value))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic();
        let address = self.address();
        match self {
            Instruction::Add(_) => write!(f, "{}: ACC <- ACC + [{}]", name, address),
            Instruction::And(_) => write!(f, "{}: ACC <- ACC & [{}]", name, address),
            Instruction::Orr(_) => write!(f, "{}: ACC <- ACC | [{}]", name, address),
            Instruction::Xor(_) => write!(f, "{}: ACC <- ACC ^ [{}]", name, address),
            Instruction::Ldr(_) => write!(f, "{}: ACC <- [{}]", name, address),
            Instruction::Str(_) => write!(f, "{}: ACC -> [{}]", name, address),
            Instruction::Jmp(_) => write!(f, "{}: PC  <- {}", name, address),
            Instruction::Jne(_) => write!(f, "{}: PC  <- {} if ACC != 0", name, address),
        }
    }
}
