//! Instruction set and compiled program.
use std::fmt;

use crate::constants::{TextAddr, Word};

/// Machine instructions.
///
/// Sorted by the number of operands: everything up to and including
/// [`Opcode::ADJ`] is followed by one operand word in the text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Opcode {
    // ------------------------------------------------------------------------
    // One operand
    LEA,  // load address of frame slot: ax = bp + n * word
    IMM,  // load immediate into ax
    JMP,  // jump
    CALL, // push return address, jump
    JEZ,  // jump if ax == 0
    JNZ,  // jump if ax != 0
    ENT,  // enter frame, reserve n local words
    ADJ,  // drop n argument words

    // ------------------------------------------------------------------------
    // No operand
    LEV,  // leave frame and return
    LI,   // load word at ax
    LC,   // load char at ax
    SI,   // store word ax at popped address
    SC,   // store char ax at popped address
    PUSH, // push ax

    OR, XOR, AND,
    EQ, NE, LT, GT, LE, GE,
    SHL, SHR,
    ADD, SUB, MUL, DIV, MOD,

    // ------------------------------------------------------------------------
    // Builtins
    OPEN, READ, CLOS, PRTF, MALC, MSET, MCMP, EXIT,
}

impl Opcode {
    /// Opcodes in encoding order.
    #[rustfmt::skip]
    pub const ALL: [Opcode; 38] = [
        Self::LEA, Self::IMM, Self::JMP, Self::CALL, Self::JEZ, Self::JNZ, Self::ENT, Self::ADJ,
        Self::LEV, Self::LI, Self::LC, Self::SI, Self::SC, Self::PUSH,
        Self::OR, Self::XOR, Self::AND,
        Self::EQ, Self::NE, Self::LT, Self::GT, Self::LE, Self::GE,
        Self::SHL, Self::SHR,
        Self::ADD, Self::SUB, Self::MUL, Self::DIV, Self::MOD,
        Self::OPEN, Self::READ, Self::CLOS, Self::PRTF, Self::MALC, Self::MSET, Self::MCMP, Self::EXIT,
    ];

    /// Decode an instruction word.
    #[inline]
    pub fn decode(word: Word) -> Option<Self> {
        usize::try_from(word)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    #[inline(always)]
    pub fn as_word(self) -> Word {
        self as Word
    }

    /// Whether the next text word is this instruction's operand.
    #[inline(always)]
    pub fn has_operand(self) -> bool {
        self as u8 <= Self::ADJ as u8
    }

    /// Builtins are called by name and read their arguments off the stack.
    #[inline]
    pub fn is_builtin(self) -> bool {
        self as u8 >= Self::OPEN as u8
    }

    #[rustfmt::skip]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::LEA  => "LEA",
            Self::IMM  => "IMM",
            Self::JMP  => "JMP",
            Self::CALL => "CALL",
            Self::JEZ  => "JEZ",
            Self::JNZ  => "JNZ",
            Self::ENT  => "ENT",
            Self::ADJ  => "ADJ",
            Self::LEV  => "LEV",
            Self::LI   => "LI",
            Self::LC   => "LC",
            Self::SI   => "SI",
            Self::SC   => "SC",
            Self::PUSH => "PUSH",
            Self::OR   => "OR",
            Self::XOR  => "XOR",
            Self::AND  => "AND",
            Self::EQ   => "EQ",
            Self::NE   => "NE",
            Self::LT   => "LT",
            Self::GT   => "GT",
            Self::LE   => "LE",
            Self::GE   => "GE",
            Self::SHL  => "SHL",
            Self::SHR  => "SHR",
            Self::ADD  => "ADD",
            Self::SUB  => "SUB",
            Self::MUL  => "MUL",
            Self::DIV  => "DIV",
            Self::MOD  => "MOD",
            Self::OPEN => "OPEN",
            Self::READ => "READ",
            Self::CLOS => "CLOS",
            Self::PRTF => "PRTF",
            Self::MALC => "MALC",
            Self::MSET => "MSET",
            Self::MCMP => "MCMP",
            Self::EXIT => "EXIT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Output of the compiler, ready to be loaded into the VM.
#[derive(Debug, Clone)]
pub struct Program {
    /// Instruction words.
    pub text: Box<[Word]>,
    /// Initial contents of the data segment: string literals and globals.
    pub data: Box<[u8]>,
    /// Text address of `main`.
    pub entry: TextAddr,
}
