//! Tokens

use std::fmt;

use super::symbol::SymbolId;
use crate::constants::{MemAddr, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Line the token starts on, counting from 1.
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum TokenKind {
    // Simple
    Tilde,        // ~
    Bang,         // !
    Semicolon,    // ;
    Comma,        // ,
    Colon,        // :
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    RightBracket, // ]

    // ------------------------------------------------------------------------
    // Complex
    /// Number literal, or a character literal's code.
    Num(Word),
    /// String literal, located at this data address.
    Str(MemAddr),
    /// Identifier, resolved to its symbol table entry.
    Id(SymbolId),
    /// Reserved identifiers
    Keyword(Keyword),
    /// Operator that can appear after an operand.
    Op(Op),

    // ------------------------------------------------------------------------
    // Special
    /// End-of-file
    EOF,
}

/// Operators, ordered by binding strength from weakest to strongest.
///
/// Expression parsing compares these directly to decide nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[rustfmt::skip]
pub enum Op {
    Assign, // =
    Cond,   // ?
    Lor,    // ||
    Lan,    // &&
    Or,     // |
    Xor,    // ^
    And,    // &
    Eq,     // ==
    Ne,     // !=
    Lt,     // <
    Gt,     // >
    Le,     // <=
    Ge,     // >=
    Shl,    // <<
    Shr,    // >>
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    Mod,    // %
    Inc,    // ++
    Dec,    // --
    Brak,   // [
}

/// Reserved keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Keyword {
    Char,
    Else,
    Enum,
    If,
    Int,
    Return,
    Sizeof,
    While,
}

impl Keyword {
    pub const ALL: [Keyword; 8] = [
        Self::Char,
        Self::Else,
        Self::Enum,
        Self::If,
        Self::Int,
        Self::Return,
        Self::Sizeof,
        Self::While,
    ];

    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Char   => "char",
            Self::Else   => "else",
            Self::Enum   => "enum",
            Self::If     => "if",
            Self::Int    => "int",
            Self::Return => "return",
            Self::Sizeof => "sizeof",
            Self::While  => "while",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub index: u32,
    pub size: u32,
}

impl Span {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[(self.index as usize)..(self.index as usize + self.size as usize)]
    }

    /// Ending index of the span, exclusive.
    #[inline]
    pub fn end(&self) -> u32 {
        self.index + self.size
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_op_precedence_order() {
        assert!(Op::Assign < Op::Cond);
        assert!(Op::Lor < Op::Lan);
        assert!(Op::Eq < Op::Lt);
        assert!(Op::Add < Op::Mul);
        assert!(Op::Mul < Op::Inc);
        assert!(Op::Inc < Op::Brak);
    }

    #[test]
    fn test_span_fragment() {
        const CODE: &str = "int main()";

        assert_eq!(Span::new(0, 3).fragment(CODE), "int");
        assert_eq!(Span::new(4, 4).fragment(CODE), "main");
        assert_eq!(Span::new(4, 4).end(), 8);
    }
}
