//! Compiler
mod codegen;
mod cursor;
mod lexer;
mod segment;
mod symbol;
mod tokens;
mod ty;

use std::{fs, path::Path};

use log::debug;

use crate::{bytecode::Program, constants::POOL_SIZE, error::W1ldResult};

pub use self::{
    codegen::Compiler,
    lexer::Lexer,
    segment::{DataSegment, TextSegment},
    symbol::{Class, Decl, Symbol, SymbolId, SymbolTable},
    tokens::{Keyword, Op, Span, Token, TokenKind},
    ty::{Scalar, Ty},
};

/// Compiler configuration.
#[derive(Debug, Clone)]
pub struct CompileConf {
    /// Capacity in bytes of the text and data segments.
    pub pool_size: usize,
    /// Reject functions whose body can reach its end without `return`.
    ///
    /// When off, such a function returns 0.
    pub strict_returns: bool,
}

impl Default for CompileConf {
    fn default() -> Self {
        Self {
            pool_size: POOL_SIZE,
            strict_returns: false,
        }
    }
}

pub fn compile(source_code: impl AsRef<str>) -> W1ldResult<Program> {
    compile_with(source_code, CompileConf::default())
}

pub fn compile_with(source_code: impl AsRef<str>, conf: CompileConf) -> W1ldResult<Program> {
    Compiler::new(source_code.as_ref(), conf)?.compile()
}

/// Read a source file.
///
/// Bytes that aren't valid UTF-8 are replaced, and later rejected by the lexer.
pub fn load_source(path: impl AsRef<Path>) -> W1ldResult<String> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    debug!("read {} bytes from {}", bytes.len(), path.display());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Lex the whole source, for token dumps.
///
/// The returned table resolves the identifiers in the tokens.
pub fn tokenize(source_code: &str) -> W1ldResult<(Vec<Token>, SymbolTable)> {
    let mut symbols = SymbolTable::new();
    let mut data = DataSegment::with_capacity(POOL_SIZE)?;
    let mut lexer = Lexer::new(source_code);
    let mut tokens = vec![];

    loop {
        let token = lexer.next_token(&mut symbols, &mut data)?;
        tokens.push(token);
        if token.kind == TokenKind::EOF {
            break;
        }
    }

    Ok((tokens, symbols))
}
