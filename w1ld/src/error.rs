//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

use crate::constants::{TextAddr, Word};

pub type W1ldResult<T> = std::result::Result<T, W1ldError>;

#[derive(Debug)]
pub enum W1ldError {
    /// Source file is missing or unreadable.
    SourceIo(io::Error),
    /// A segment buffer could not be allocated.
    Allocation { segment: Segment, size: usize },
    Lex(LexError),
    Parse(ParseError),
    /// Code generation ran past the capacity of the text or data segment.
    CodegenOverflow { segment: Segment, capacity: usize },
    /// Instruction word that decodes to no opcode.
    Decode { word: Word, pc: TextAddr },
    /// VM register or memory access left its segment.
    Resource(ResourceError),
    DivisionByZero { pc: TextAddr },
}

impl W1ldError {
    /// Short name of the failure kind, used as the message prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceIo(_) => "source io error",
            Self::Allocation { .. } => "allocation error",
            Self::Lex(_) => "lex error",
            Self::Parse(_) => "parse error",
            Self::CodegenOverflow { .. } => "codegen overflow",
            Self::Decode { .. } => "runtime decode error",
            Self::Resource(_) => "runtime resource error",
            Self::DivisionByZero { .. } => "division by zero",
        }
    }

    /// Process exit status reported for this failure. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceIo(_) => 2,
            Self::Allocation { .. } => 3,
            Self::Lex(_) => 4,
            Self::Parse(_) => 5,
            Self::CodegenOverflow { .. } => 6,
            Self::Decode { .. } => 7,
            Self::Resource(_) => 8,
            Self::DivisionByZero { .. } => 9,
        }
    }
}

impl Display for W1ldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Self::SourceIo(err) => write!(f, "{kind}: {err}"),
            Self::Allocation { segment, size } => {
                write!(f, "{kind}: failed to allocate {size} bytes for {segment} segment")
            }
            Self::Lex(err) => write!(f, "{kind}: {err}"),
            Self::Parse(err) => write!(f, "{kind}: {err}"),
            Self::CodegenOverflow { segment, capacity } => {
                write!(f, "{kind}: {segment} segment exceeds capacity of {capacity}")
            }
            Self::Decode { word, pc } => {
                write!(f, "{kind}: unknown instruction {word} at {pc:04}")
            }
            Self::Resource(err) => write!(f, "{kind}: {err}"),
            Self::DivisionByZero { pc } => write!(f, "{kind}: at {pc:04}"),
        }
    }
}

impl std::error::Error for W1ldError {}

impl From<io::Error> for W1ldError {
    fn from(err: io::Error) -> Self {
        W1ldError::SourceIo(err)
    }
}

impl From<LexError> for W1ldError {
    fn from(err: LexError) -> Self {
        W1ldError::Lex(err)
    }
}

impl From<ParseError> for W1ldError {
    fn from(err: ParseError) -> Self {
        W1ldError::Parse(err)
    }
}

impl From<ResourceError> for W1ldError {
    fn from(err: ResourceError) -> Self {
        W1ldError::Resource(err)
    }
}

/// Memory segments of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Text,
    Data,
    Heap,
    Stack,
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Data => write!(f, "data"),
            Self::Heap => write!(f, "heap"),
            Self::Stack => write!(f, "stack"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: u32,
    pub kind: LexErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnknownCharacter(char),
    /// End of input inside a string or character literal
    /// opened by the given quote.
    Unterminated(char),
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            LexErrorKind::UnknownCharacter(c) => {
                write!(f, "line {}: unknown character {:?}", self.line, c)
            }
            LexErrorKind::Unterminated(quote) => {
                write!(f, "line {}: unterminated literal, expected {}", self.line, quote)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, message: impl ToString) -> Self {
        Self {
            line,
            message: message.to_string(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Stack pointer was driven outside the stack region.
    Stack { sp: Word },
    /// Access of `len` bytes at `addr` falls outside VM memory.
    Memory { addr: Word, len: usize },
    /// Program counter left the text segment.
    Text { pc: Word },
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack { sp } => write!(f, "stack pointer {sp:#x} outside stack segment"),
            Self::Memory { addr, len } => {
                write!(f, "access of {len} bytes at {addr:#x} outside memory")
            }
            Self::Text { pc } => write!(f, "program counter {pc} outside text segment"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exit_codes_non_zero() {
        let errors = [
            W1ldError::SourceIo(io::Error::new(io::ErrorKind::NotFound, "missing")),
            W1ldError::Allocation {
                segment: Segment::Text,
                size: 1,
            },
            W1ldError::Lex(LexError {
                line: 1,
                kind: LexErrorKind::UnknownCharacter('@'),
            }),
            W1ldError::Parse(ParseError::new(1, "bad")),
            W1ldError::CodegenOverflow {
                segment: Segment::Data,
                capacity: 8,
            },
            W1ldError::Decode { word: 999, pc: 4 },
            W1ldError::Resource(ResourceError::Stack { sp: 0 }),
            W1ldError::DivisionByZero { pc: 2 },
        ];

        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{err}");
            assert!(err.to_string().starts_with(err.kind()));
        }
    }

    #[test]
    fn test_lex_error_message() {
        let err = W1ldError::from(LexError {
            line: 7,
            kind: LexErrorKind::UnknownCharacter('@'),
        });
        assert_eq!(err.to_string(), "lex error: line 7: unknown character '@'");
    }
}
