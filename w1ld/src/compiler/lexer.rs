//! Lexical analysis
use super::{
    cursor::{Cursor, EOF_CHAR},
    segment::DataSegment,
    symbol::SymbolTable,
    tokens::{Op, Span, Token, TokenKind},
};
use crate::{
    constants::Word,
    error::{LexError, LexErrorKind, W1ldResult},
};

pub struct Lexer<'a> {
    /// Character scanner
    cursor: Cursor<'a>,
    /// Keep reference to the source so errors and dumps can
    /// slice fragments from it.
    original: &'a str,
    /// Start absolute byte position of the current token
    /// in the source.
    start_pos: usize,
    /// Line of the character under the cursor.
    line: u32,
    /// Line the current token started on.
    start_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source_code),
            original: source_code,
            start_pos: 0,
            line: 1,
            start_line: 1,
        }
    }

    /// Original source code that was passed in during construction.
    pub fn source_code(&self) -> &'a str {
        self.original
    }

    /// Current line, counting from 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Scan the source characters and construct the next token.
    ///
    /// Identifiers are entered into `symbols` the first time they are
    /// seen. String literal characters are copied into `data`; the token
    /// carries the address of the first character. Terminating the string
    /// is left to the caller, so adjacent literals concatenate.
    ///
    /// After returning [`TokenKind::EOF`], every further call returns it again.
    pub fn next_token(
        &mut self,
        symbols: &mut SymbolTable,
        data: &mut DataSegment,
    ) -> W1ldResult<Token> {
        use TokenKind as TK;

        loop {
            self.start_token();

            let kind = match self.cursor.bump() {
                EOF_CHAR => TK::EOF,
                b'\n' => {
                    self.line += 1;
                    continue;
                }
                b' ' | b'\t' | b'\r' | 0x0B | 0x0C => continue,
                // Preprocessor lines are discarded, not interpreted.
                b'#' => {
                    self.erase_line();
                    continue;
                }
                b'/' => {
                    if self.cursor.eat(b'/') {
                        self.erase_line();
                        continue;
                    }
                    TK::Op(Op::Div)
                }
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.consume_ident(symbols),
                c @ b'0'..=b'9' => self.consume_number(c),
                quote @ (b'"' | b'\'') => self.consume_literal(quote, data)?,

                b'=' => self.either(b'=', TK::Op(Op::Eq), TK::Op(Op::Assign)),
                b'+' => self.either(b'+', TK::Op(Op::Inc), TK::Op(Op::Add)),
                b'-' => self.either(b'-', TK::Op(Op::Dec), TK::Op(Op::Sub)),
                b'!' => self.either(b'=', TK::Op(Op::Ne), TK::Bang),
                b'|' => self.either(b'|', TK::Op(Op::Lor), TK::Op(Op::Or)),
                b'&' => self.either(b'&', TK::Op(Op::Lan), TK::Op(Op::And)),
                b'<' => {
                    if self.cursor.eat(b'=') {
                        TK::Op(Op::Le)
                    } else {
                        self.either(b'<', TK::Op(Op::Shl), TK::Op(Op::Lt))
                    }
                }
                b'>' => {
                    if self.cursor.eat(b'=') {
                        TK::Op(Op::Ge)
                    } else {
                        self.either(b'>', TK::Op(Op::Shr), TK::Op(Op::Gt))
                    }
                }
                b'^' => TK::Op(Op::Xor),
                b'%' => TK::Op(Op::Mod),
                b'*' => TK::Op(Op::Mul),
                b'[' => TK::Op(Op::Brak),
                b'?' => TK::Op(Op::Cond),

                b'~' => TK::Tilde,
                b';' => TK::Semicolon,
                b',' => TK::Comma,
                b':' => TK::Colon,
                b'(' => TK::LeftParen,
                b')' => TK::RightParen,
                b'{' => TK::LeftBrace,
                b'}' => TK::RightBrace,
                b']' => TK::RightBracket,

                _ => return Err(self.unknown_character().into()),
            };

            return Ok(self.make_token(kind));
        }
    }

    /// Prime the lexer state for recording a new token.
    fn start_token(&mut self) {
        self.start_pos = self.cursor.offset();
        self.start_line = self.line;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let end = self.cursor.offset();

        // start and end can be equal, and a token can have 0 size.
        debug_assert!(end >= self.start_pos);

        Token {
            kind,
            span: Span {
                index: self.start_pos as u32,
                size: (end - self.start_pos) as u32,
            },
            line: self.start_line,
        }
    }

    /// Two-character operator when the next character is `second`,
    /// otherwise the one-character operator.
    #[inline]
    fn either(&mut self, second: u8, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.cursor.eat(second) {
            long
        } else {
            short
        }
    }

    #[cold]
    fn unknown_character(&self) -> LexError {
        let c = self.original[self.start_pos..]
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        LexError {
            line: self.start_line,
            kind: LexErrorKind::UnknownCharacter(c),
        }
    }
}

/// Specialised tokens.
impl<'a> Lexer<'a> {
    /// Erase the rest of the line up to, but not including, the trailing newline.
    fn erase_line(&mut self) {
        while !matches!(self.cursor.current(), b'\n' | EOF_CHAR) {
            self.cursor.bump();
        }
    }

    /// Make an identifier or keyword token.
    fn consume_ident(&mut self, symbols: &mut SymbolTable) -> TokenKind {
        while is_letter_or_digit(self.cursor.current()) {
            self.cursor.bump();
        }

        let id = symbols.intern(self.cursor.fragment(self.start_pos));
        match symbols.get(id).keyword {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Id(id),
        }
    }

    /// Make a decimal number literal token.
    fn consume_number(&mut self, first: u8) -> TokenKind {
        let mut value = (first - b'0') as Word;
        while self.cursor.current().is_ascii_digit() {
            let digit = (self.cursor.bump() - b'0') as Word;
            value = value.wrapping_mul(10).wrapping_add(digit);
        }
        TokenKind::Num(value)
    }

    /// Make a string or character literal token.
    ///
    /// A character literal yields the code of its last character, so
    /// `'ab'` is `'b'`. The only recognised escape is `\n`; any other
    /// escaped character stands for itself.
    fn consume_literal(&mut self, quote: u8, data: &mut DataSegment) -> W1ldResult<TokenKind> {
        let addr = data.here();
        let mut value: Word = 0;

        loop {
            let mut c = match self.cursor.bump() {
                EOF_CHAR => return Err(self.unterminated(quote).into()),
                c if c == quote => break,
                c => c,
            };

            if c == b'\n' {
                self.line += 1;
            }

            if c == b'\\' {
                c = match self.cursor.bump() {
                    EOF_CHAR => return Err(self.unterminated(quote).into()),
                    b'n' => b'\n',
                    escaped => escaped,
                };
            }

            value = c as Word;
            if quote == b'"' {
                data.push(c)?;
            }
        }

        if quote == b'"' {
            Ok(TokenKind::Str(addr))
        } else {
            Ok(TokenKind::Num(value))
        }
    }

    #[cold]
    fn unterminated(&self, quote: u8) -> LexError {
        LexError {
            line: self.line,
            kind: LexErrorKind::Unterminated(quote as char),
        }
    }
}

fn is_letter_or_digit(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}
