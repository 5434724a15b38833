//! Single pass recursive descent compiler.
//!
//! There is no syntax tree. Each grammar rule emits its instructions
//! as soon as its tokens are consumed. Jumps whose targets are still
//! ahead are emitted with a placeholder operand that is patched once
//! the target address is known.
//!
//! Expressions leave their value in the accumulator. Binary operators
//! push the left operand, compile the right operand into `ax`, and
//! emit one instruction combining the two.
use log::debug;

use super::{
    lexer::Lexer,
    segment::{DataSegment, TextSegment},
    symbol::{Class, Decl, SymbolId, SymbolTable},
    tokens::{Keyword, Op, Span, Token, TokenKind},
    ty::Ty,
    CompileConf,
};
use crate::{
    bytecode::{Opcode, Program},
    constants::{TextAddr, Word, EXIT_STUB, WORD_SIZE},
    error::{ParseError, W1ldError, W1ldResult},
};

use TokenKind as TK;

/// Functions implemented by the VM, callable by name.
const BUILTINS: [(&str, Opcode); 8] = [
    ("open", Opcode::OPEN),
    ("read", Opcode::READ),
    ("close", Opcode::CLOS),
    ("printf", Opcode::PRTF),
    ("malloc", Opcode::MALC),
    ("memset", Opcode::MSET),
    ("memcmp", Opcode::MCMP),
    ("exit", Opcode::EXIT),
];

pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    /// Current token.
    token: Token,
    symbols: SymbolTable,
    text: TextSegment,
    data: DataSegment,
    conf: CompileConf,
    /// Type of the expression compiled last.
    ty: Ty,
    /// Frame slot between the parameters and the locals of the
    /// function being compiled. A variable in slot `n` lives at
    /// `bp + (frame_base - n) * word`.
    frame_base: Word,
}

impl<'a> Compiler<'a> {
    pub fn new(source_code: &'a str, conf: CompileConf) -> W1ldResult<Self> {
        let text = TextSegment::with_capacity(conf.pool_size / WORD_SIZE)?;
        let data = DataSegment::with_capacity(conf.pool_size)?;

        let mut symbols = SymbolTable::new();
        for (name, op) in BUILTINS {
            let id = symbols.intern(name.as_bytes());
            symbols.declare_global(
                id,
                Decl {
                    class: Class::Sys,
                    ty: Ty::Int,
                    value: op.as_word(),
                },
            );
        }

        Ok(Self {
            lexer: Lexer::new(source_code),
            token: Token {
                kind: TK::EOF,
                span: Span::new(0, 0),
                line: 1,
            },
            symbols,
            text,
            data,
            conf,
            ty: Ty::Int,
            frame_base: 0,
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Instruction words emitted so far.
    pub fn text(&self) -> &[Word] {
        self.text.words()
    }

    /// Compile the whole source into a program.
    ///
    /// A compiler instance compiles its source once; the symbol table
    /// stays available afterwards for inspection.
    pub fn compile(&mut self) -> W1ldResult<Program> {
        // `main` returns into this stub, which exits with its return value.
        let stub = self.text.emit(Opcode::PUSH)?;
        debug_assert_eq!(stub, EXIT_STUB);
        self.text.emit(Opcode::EXIT)?;

        self.next()?;
        while self.token.kind != TK::EOF {
            self.global_declaration()?;
        }

        let entry = self.entry_point()?;
        debug!(
            "compiled {} text words, {} data bytes, entry {:04}",
            self.text.here(),
            self.data.here(),
            entry
        );

        Ok(Program {
            text: self.text.words().into(),
            data: self.data.bytes().into(),
            entry,
        })
    }

    fn entry_point(&self) -> W1ldResult<TextAddr> {
        let main = self
            .symbols
            .lookup("main")
            .and_then(|id| self.symbols.resolve(id));

        match main {
            Some(Decl {
                class: Class::Func,
                value,
                ..
            }) => Ok(value as TextAddr),
            _ => Err(self.error("main() not defined")),
        }
    }
}

/// Token handling.
impl<'a> Compiler<'a> {
    #[inline]
    fn next(&mut self) -> W1ldResult<()> {
        self.token = self.lexer.next_token(&mut self.symbols, &mut self.data)?;
        Ok(())
    }

    /// Consume the current token if it is of the given kind, otherwise fail.
    fn expect(&mut self, kind: TokenKind, message: &str) -> W1ldResult<()> {
        if self.token.kind != kind {
            return Err(self.error(message));
        }
        self.next()
    }

    /// Identifier under the cursor, without consuming it.
    fn ident(&self, message: &str) -> W1ldResult<SymbolId> {
        match self.token.kind {
            TK::Id(id) => Ok(id),
            _ => Err(self.error(message)),
        }
    }

    #[inline(never)]
    #[cold]
    fn error(&self, message: impl ToString) -> W1ldError {
        let line = match self.token.kind {
            TK::EOF => self.lexer.line(),
            _ => self.token.line,
        };
        ParseError::new(line, message).into()
    }

    /// Declaration in effect for the identifier.
    fn resolve(&self, id: SymbolId) -> W1ldResult<Decl> {
        self.symbols.resolve(id).ok_or_else(|| {
            self.error(format!("undeclared identifier '{}'", self.symbols.name(id)))
        })
    }

    #[inline]
    fn emit(&mut self, op: Opcode) -> W1ldResult<TextAddr> {
        self.text.emit(op)
    }

    #[inline]
    fn emit_with(&mut self, op: Opcode, operand: Word) -> W1ldResult<TextAddr> {
        self.text.emit_with(op, operand)
    }

    /// Multiply the accumulator by `factor`, unless it is 1.
    fn scale(&mut self, factor: usize) -> W1ldResult<()> {
        if factor > 1 {
            self.emit(Opcode::PUSH)?;
            self.emit_with(Opcode::IMM, factor as Word)?;
            self.emit(Opcode::MUL)?;
        }
        Ok(())
    }
}

/// Declarations.
impl<'a> Compiler<'a> {
    /// `int` or `char`, defaulting to `int` without consuming anything.
    fn base_type(&mut self) -> W1ldResult<Ty> {
        match self.token.kind {
            TK::Keyword(Keyword::Int) => {
                self.next()?;
                Ok(Ty::Int)
            }
            TK::Keyword(Keyword::Char) => {
                self.next()?;
                Ok(Ty::Char)
            }
            _ => Ok(Ty::Int),
        }
    }

    /// Leading `*`s of a declarator.
    fn pointer_suffix(&mut self, mut ty: Ty) -> W1ldResult<Ty> {
        while self.token.kind == TK::Op(Op::Mul) {
            self.next()?;
            ty = ty.pointer_to();
        }
        Ok(ty)
    }

    fn global_declaration(&mut self) -> W1ldResult<()> {
        let base = match self.token.kind {
            TK::Keyword(Keyword::Enum) => {
                self.next()?;
                self.enum_declaration()?;
                Ty::Int
            }
            _ => self.base_type()?,
        };

        while self.token.kind != TK::Semicolon {
            let ty = self.pointer_suffix(base)?;
            let id = self.ident("bad global declaration")?;
            if self.symbols.get(id).global.is_some() {
                return Err(self.error(format!(
                    "duplicate global declaration '{}'",
                    self.symbols.name(id)
                )));
            }
            self.next()?;

            if self.token.kind == TK::LeftParen {
                return self.function_definition(id, ty);
            }

            let addr = self.data.alloc_word()?;
            self.symbols.declare_global(
                id,
                Decl {
                    class: Class::Global,
                    ty,
                    value: addr as Word,
                },
            );

            match self.token.kind {
                TK::Comma => self.next()?,
                TK::Semicolon => {}
                _ => return Err(self.error("semicolon expected after global declaration")),
            }
        }

        self.next()
    }

    /// `enum [name] { A, B = 4, C }`, after the `enum` keyword.
    fn enum_declaration(&mut self) -> W1ldResult<()> {
        // The tag name is accepted and ignored.
        if let TK::Id(_) = self.token.kind {
            self.next()?;
        }

        if self.token.kind != TK::LeftBrace {
            return Ok(());
        }
        self.next()?;

        let mut value: Word = 0;
        while self.token.kind != TK::RightBrace {
            let id = self.ident("bad enum identifier")?;
            self.next()?;

            if self.token.kind == TK::Op(Op::Assign) {
                self.next()?;
                value = self.enum_initializer()?;
            }

            let declared = self.symbols.declare_global(
                id,
                Decl {
                    class: Class::Enum,
                    ty: Ty::Int,
                    value,
                },
            );
            if !declared {
                return Err(self.error(format!(
                    "duplicate global declaration '{}'",
                    self.symbols.name(id)
                )));
            }
            value = value.wrapping_add(1);

            match self.token.kind {
                TK::Comma => self.next()?,
                TK::RightBrace => {}
                _ => return Err(self.error("bad enum declaration")),
            }
        }

        self.next()
    }

    fn enum_initializer(&mut self) -> W1ldResult<Word> {
        let negative = self.token.kind == TK::Op(Op::Sub);
        if negative {
            self.next()?;
        }

        match self.token.kind {
            TK::Num(value) => {
                self.next()?;
                Ok(if negative { value.wrapping_neg() } else { value })
            }
            _ => Err(self.error("bad enum initializer")),
        }
    }

    /// Parameters, locals and body of a function, starting at its `(`.
    ///
    /// Parameters are pushed by the caller in declaration order, so the
    /// first one sits deepest in the frame:
    ///
    /// ```text
    /// | param 0        |  bp + n + 1
    /// | ...            |
    /// | param n - 1    |  bp + 2
    /// | return address |  bp + 1
    /// | old bp         |  bp
    /// | local 1        |  bp - 1
    /// | local 2        |  bp - 2
    /// ```
    fn function_definition(&mut self, id: SymbolId, ty: Ty) -> W1ldResult<()> {
        let addr = self.text.here();
        self.symbols.declare_global(
            id,
            Decl {
                class: Class::Func,
                ty,
                value: addr as Word,
            },
        );
        self.next()?;

        let mut params: Word = 0;
        while self.token.kind != TK::RightParen {
            let base = self.base_type()?;
            let ty = self.pointer_suffix(base)?;
            let param = self.ident("bad parameter declaration")?;
            let fresh = self.symbols.declare_local(
                param,
                Decl {
                    class: Class::Local,
                    ty,
                    value: params,
                },
            );
            if !fresh {
                return Err(self.error(format!(
                    "duplicate parameter declaration '{}'",
                    self.symbols.name(param)
                )));
            }
            params += 1;
            self.next()?;

            match self.token.kind {
                TK::Comma => self.next()?,
                TK::RightParen => {}
                _ => return Err(self.error("bad parameter declaration")),
            }
        }
        self.next()?;

        self.frame_base = params + 1;
        self.expect(TK::LeftBrace, "bad function definition")?;

        let mut slot = self.frame_base;
        while let TK::Keyword(Keyword::Int | Keyword::Char) = self.token.kind {
            let base = self.base_type()?;
            while self.token.kind != TK::Semicolon {
                let ty = self.pointer_suffix(base)?;
                let local = self.ident("bad local declaration")?;
                slot += 1;
                let fresh = self.symbols.declare_local(
                    local,
                    Decl {
                        class: Class::Local,
                        ty,
                        value: slot,
                    },
                );
                if !fresh {
                    return Err(self.error(format!(
                        "duplicate local declaration '{}'",
                        self.symbols.name(local)
                    )));
                }
                self.next()?;

                match self.token.kind {
                    TK::Comma => self.next()?,
                    TK::Semicolon => {}
                    _ => return Err(self.error("bad local declaration")),
                }
            }
            self.next()?;
        }

        self.emit_with(Opcode::ENT, slot - self.frame_base)?;

        let mut returns = false;
        while self.token.kind != TK::RightBrace {
            if self.token.kind == TK::EOF {
                return Err(self.error("unexpected end of input in function body"));
            }
            returns |= self.statement()?;
        }

        if !returns {
            if self.conf.strict_returns {
                return Err(self.error(format!(
                    "missing return in function '{}'",
                    self.symbols.name(id)
                )));
            }
            self.emit_with(Opcode::IMM, 0)?;
            self.emit(Opcode::LEV)?;
        }

        debug!(
            "function {} at {:04}, {} params, {} locals",
            self.symbols.name(id),
            addr,
            params,
            slot - self.frame_base
        );

        self.symbols.leave_function();
        self.next()
    }
}

/// Statements.
impl<'a> Compiler<'a> {
    /// Compile one statement.
    ///
    /// Returns `true` when every path through the statement ends in `return`.
    fn statement(&mut self) -> W1ldResult<bool> {
        match self.token.kind {
            TK::Keyword(Keyword::If) => {
                self.next()?;
                self.expect(TK::LeftParen, "open paren expected")?;
                self.expression(Op::Assign)?;
                self.expect(TK::RightParen, "close paren expected")?;

                let skip_then = self.emit_with(Opcode::JEZ, 0)?;
                let then_returns = self.statement()?;

                if self.token.kind == TK::Keyword(Keyword::Else) {
                    self.next()?;
                    let skip_else = self.emit_with(Opcode::JMP, 0)?;
                    self.text.patch_here(skip_then);
                    let else_returns = self.statement()?;
                    self.text.patch_here(skip_else);
                    Ok(then_returns && else_returns)
                } else {
                    self.text.patch_here(skip_then);
                    Ok(false)
                }
            }
            TK::Keyword(Keyword::While) => {
                self.next()?;
                let condition = self.text.here();
                self.expect(TK::LeftParen, "open paren expected")?;
                self.expression(Op::Assign)?;
                self.expect(TK::RightParen, "close paren expected")?;

                let exit = self.emit_with(Opcode::JEZ, 0)?;
                self.statement()?;
                self.emit_with(Opcode::JMP, condition as Word)?;
                self.text.patch_here(exit);
                Ok(false)
            }
            TK::Keyword(Keyword::Return) => {
                self.next()?;
                if self.token.kind != TK::Semicolon {
                    self.expression(Op::Assign)?;
                }
                self.emit(Opcode::LEV)?;
                self.expect(TK::Semicolon, "semicolon expected")?;
                Ok(true)
            }
            TK::LeftBrace => {
                self.next()?;
                let mut returns = false;
                while self.token.kind != TK::RightBrace {
                    if self.token.kind == TK::EOF {
                        return Err(self.error("close brace expected"));
                    }
                    returns |= self.statement()?;
                }
                self.next()?;
                Ok(returns)
            }
            TK::Semicolon => {
                self.next()?;
                Ok(false)
            }
            _ => {
                self.expression(Op::Assign)?;
                self.expect(TK::Semicolon, "semicolon expected")?;
                Ok(false)
            }
        }
    }
}

/// Expressions.
impl<'a> Compiler<'a> {
    /// Compile an expression, consuming binary and postfix operators
    /// that bind at least as tightly as `level`.
    fn expression(&mut self, level: Op) -> W1ldResult<()> {
        self.unary()?;

        while let TK::Op(op) = self.token.kind {
            if op < level {
                break;
            }
            self.binary(op)?;
        }

        Ok(())
    }

    /// Primary expressions and prefix operators.
    fn unary(&mut self) -> W1ldResult<()> {
        match self.token.kind {
            TK::EOF => return Err(self.error("unexpected end of input in expression")),
            TK::Num(value) => {
                self.emit_with(Opcode::IMM, value)?;
                self.next()?;
                self.ty = Ty::Int;
            }
            TK::Str(addr) => {
                self.emit_with(Opcode::IMM, addr as Word)?;
                self.next()?;
                // Adjacent literals were lexed into consecutive data bytes.
                while let TK::Str(_) = self.token.kind {
                    self.next()?;
                }
                self.data.terminate_string()?;
                self.ty = Ty::Char.pointer_to();
            }
            TK::Keyword(Keyword::Sizeof) => {
                self.next()?;
                self.expect(TK::LeftParen, "open paren expected in sizeof")?;
                let base = self.base_type()?;
                let ty = self.pointer_suffix(base)?;
                self.expect(TK::RightParen, "close paren expected in sizeof")?;
                self.emit_with(Opcode::IMM, ty.size() as Word)?;
                self.ty = Ty::Int;
            }
            TK::Id(id) => {
                self.next()?;
                if self.token.kind == TK::LeftParen {
                    self.call(id)?;
                } else {
                    self.variable(id)?;
                }
            }
            TK::LeftParen => {
                self.next()?;
                if let TK::Keyword(Keyword::Int | Keyword::Char) = self.token.kind {
                    let base = self.base_type()?;
                    let ty = self.pointer_suffix(base)?;
                    self.expect(TK::RightParen, "bad cast")?;
                    self.expression(Op::Inc)?;
                    self.ty = ty;
                } else {
                    self.expression(Op::Assign)?;
                    self.expect(TK::RightParen, "close paren expected")?;
                }
            }
            TK::Op(Op::Mul) => {
                self.next()?;
                self.expression(Op::Inc)?;
                self.ty = self
                    .ty
                    .pointee()
                    .ok_or_else(|| self.error("bad dereference"))?;
                self.emit(self.ty.load_op())?;
            }
            TK::Op(Op::And) => {
                self.next()?;
                self.expression(Op::Inc)?;
                if !self.text.take_load() {
                    return Err(self.error("bad address-of"));
                }
                self.ty = self.ty.pointer_to();
            }
            TK::Bang => {
                self.next()?;
                self.expression(Op::Inc)?;
                self.emit(Opcode::PUSH)?;
                self.emit_with(Opcode::IMM, 0)?;
                self.emit(Opcode::EQ)?;
                self.ty = Ty::Int;
            }
            TK::Tilde => {
                self.next()?;
                self.expression(Op::Inc)?;
                self.emit(Opcode::PUSH)?;
                self.emit_with(Opcode::IMM, -1)?;
                self.emit(Opcode::XOR)?;
                self.ty = Ty::Int;
            }
            TK::Op(Op::Add) => {
                self.next()?;
                self.expression(Op::Inc)?;
                self.ty = Ty::Int;
            }
            TK::Op(Op::Sub) => {
                self.next()?;
                if let TK::Num(value) = self.token.kind {
                    self.emit_with(Opcode::IMM, value.wrapping_neg())?;
                    self.next()?;
                } else {
                    self.emit_with(Opcode::IMM, -1)?;
                    self.emit(Opcode::PUSH)?;
                    self.expression(Op::Inc)?;
                    self.emit(Opcode::MUL)?;
                }
                self.ty = Ty::Int;
            }
            TK::Op(op @ (Op::Inc | Op::Dec)) => {
                self.next()?;
                self.expression(Op::Inc)?;
                if !self.text.reload()? {
                    return Err(self.error("bad lvalue in pre-increment"));
                }
                self.emit(Opcode::PUSH)?;
                self.emit_with(Opcode::IMM, self.ty.stride() as Word)?;
                self.emit(if op == Op::Inc { Opcode::ADD } else { Opcode::SUB })?;
                self.emit(self.ty.store_op())?;
            }
            _ => return Err(self.error("bad expression")),
        }

        Ok(())
    }

    /// Reference to a variable or constant, loaded into `ax`.
    fn variable(&mut self, id: SymbolId) -> W1ldResult<()> {
        let decl = self.resolve(id)?;
        match decl.class {
            Class::Enum => {
                self.emit_with(Opcode::IMM, decl.value)?;
                self.ty = Ty::Int;
                return Ok(());
            }
            Class::Local => {
                self.emit_with(Opcode::LEA, self.frame_base - decl.value)?;
            }
            Class::Global => {
                self.emit_with(Opcode::IMM, decl.value)?;
            }
            Class::Func | Class::Sys => {
                return Err(self.error(format!(
                    "function '{}' used as a value",
                    self.symbols.name(id)
                )));
            }
        }

        self.ty = decl.ty;
        self.emit(decl.ty.load_op())?;
        Ok(())
    }

    /// Function call, starting at the `(` after the name.
    fn call(&mut self, id: SymbolId) -> W1ldResult<()> {
        let decl = self.resolve(id)?;
        self.next()?;

        let mut argc: Word = 0;
        while self.token.kind != TK::RightParen {
            self.expression(Op::Assign)?;
            self.emit(Opcode::PUSH)?;
            argc += 1;

            match self.token.kind {
                TK::Comma => self.next()?,
                TK::RightParen => {}
                _ => return Err(self.error("close paren expected in call")),
            }
        }
        self.next()?;

        match decl.class {
            Class::Sys => {
                let op = Opcode::decode(decl.value)
                    .filter(|op| op.is_builtin())
                    .ok_or_else(|| self.error("bad builtin function"))?;
                self.emit(op)?;
            }
            Class::Func => {
                self.emit_with(Opcode::CALL, decl.value)?;
            }
            _ => {
                return Err(self.error(format!(
                    "'{}' is not a function",
                    self.symbols.name(id)
                )))
            }
        }

        if argc > 0 {
            self.emit_with(Opcode::ADJ, argc)?;
        }
        self.ty = decl.ty;
        Ok(())
    }

    /// Binary or postfix operator `op`, which is the current token.
    fn binary(&mut self, op: Op) -> W1ldResult<()> {
        // Type of the left operand.
        let left = self.ty;

        match op {
            Op::Assign => {
                self.next()?;
                if !self.text.push_load_address() {
                    return Err(self.error("bad lvalue in assignment"));
                }
                self.expression(Op::Assign)?;
                self.emit(left.store_op())?;
                self.ty = left;
            }
            Op::Cond => {
                self.next()?;
                let skip_then = self.emit_with(Opcode::JEZ, 0)?;
                self.expression(Op::Assign)?;
                self.expect(TK::Colon, "conditional missing colon")?;
                let skip_else = self.emit_with(Opcode::JMP, 0)?;
                self.text.patch_here(skip_then);
                self.expression(Op::Cond)?;
                self.text.patch_here(skip_else);
            }
            Op::Lor => {
                self.next()?;
                let short = self.emit_with(Opcode::JNZ, 0)?;
                self.expression(Op::Lan)?;
                self.text.patch_here(short);
                self.normalize_bool()?;
                self.ty = Ty::Int;
            }
            Op::Lan => {
                self.next()?;
                let short = self.emit_with(Opcode::JEZ, 0)?;
                self.expression(Op::Or)?;
                self.text.patch_here(short);
                self.normalize_bool()?;
                self.ty = Ty::Int;
            }
            Op::Or => self.arithmetic(Op::Xor, Opcode::OR)?,
            Op::Xor => self.arithmetic(Op::And, Opcode::XOR)?,
            Op::And => self.arithmetic(Op::Eq, Opcode::AND)?,
            Op::Eq => self.arithmetic(Op::Lt, Opcode::EQ)?,
            Op::Ne => self.arithmetic(Op::Lt, Opcode::NE)?,
            Op::Lt => self.arithmetic(Op::Shl, Opcode::LT)?,
            Op::Gt => self.arithmetic(Op::Shl, Opcode::GT)?,
            Op::Le => self.arithmetic(Op::Shl, Opcode::LE)?,
            Op::Ge => self.arithmetic(Op::Shl, Opcode::GE)?,
            Op::Shl => self.arithmetic(Op::Add, Opcode::SHL)?,
            Op::Shr => self.arithmetic(Op::Add, Opcode::SHR)?,
            Op::Add => {
                self.next()?;
                self.emit(Opcode::PUSH)?;
                self.expression(Op::Mul)?;
                if left.is_pointer() {
                    self.scale(left.stride())?;
                }
                self.emit(Opcode::ADD)?;
                self.ty = left;
            }
            Op::Sub => {
                self.next()?;
                self.emit(Opcode::PUSH)?;
                self.expression(Op::Mul)?;
                if left.is_pointer() && left == self.ty {
                    // Distance between two pointers, in elements.
                    self.emit(Opcode::SUB)?;
                    let stride = left.stride();
                    if stride > 1 {
                        self.emit(Opcode::PUSH)?;
                        self.emit_with(Opcode::IMM, stride as Word)?;
                        self.emit(Opcode::DIV)?;
                    }
                    self.ty = Ty::Int;
                } else {
                    if left.is_pointer() {
                        self.scale(left.stride())?;
                    }
                    self.emit(Opcode::SUB)?;
                    self.ty = left;
                }
            }
            Op::Mul => self.arithmetic(Op::Inc, Opcode::MUL)?,
            Op::Div => self.arithmetic(Op::Inc, Opcode::DIV)?,
            Op::Mod => self.arithmetic(Op::Inc, Opcode::MOD)?,
            Op::Inc | Op::Dec => {
                if !self.text.reload()? {
                    return Err(self.error("bad lvalue in post-increment"));
                }
                let stride = left.stride() as Word;
                let (apply, undo) = if op == Op::Inc {
                    (Opcode::ADD, Opcode::SUB)
                } else {
                    (Opcode::SUB, Opcode::ADD)
                };
                // Store the updated value, then leave the old one in `ax`.
                self.emit(Opcode::PUSH)?;
                self.emit_with(Opcode::IMM, stride)?;
                self.emit(apply)?;
                self.emit(left.store_op())?;
                self.emit(Opcode::PUSH)?;
                self.emit_with(Opcode::IMM, stride)?;
                self.emit(undo)?;
                self.next()?;
            }
            Op::Brak => {
                self.next()?;
                self.emit(Opcode::PUSH)?;
                self.expression(Op::Assign)?;
                self.expect(TK::RightBracket, "close bracket expected")?;
                let element = left
                    .pointee()
                    .ok_or_else(|| self.error("pointer type expected"))?;
                self.scale(element.size())?;
                self.emit(Opcode::ADD)?;
                self.ty = element;
                self.emit(element.load_op())?;
            }
        }

        Ok(())
    }

    /// Integer operator: push the left operand, compile the right operand
    /// at `level`, combine with `instr`.
    fn arithmetic(&mut self, level: Op, instr: Opcode) -> W1ldResult<()> {
        self.next()?;
        self.emit(Opcode::PUSH)?;
        self.expression(level)?;
        self.emit(instr)?;
        self.ty = Ty::Int;
        Ok(())
    }

    /// Turn the truth value in `ax` into 0 or 1.
    fn normalize_bool(&mut self) -> W1ldResult<()> {
        self.emit(Opcode::PUSH)?;
        self.emit_with(Opcode::IMM, 0)?;
        self.emit(Opcode::NE)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;

    fn compile_err(source: &str) -> ParseError {
        match compile(source) {
            Err(W1ldError::Parse(err)) => err,
            Err(err) => panic!("expected parse error, got {err}"),
            Ok(_) => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_startup_stub() {
        let program = compile("int main() { return 0; }").unwrap();
        assert_eq!(
            &program.text[..2],
            &[Opcode::PUSH.as_word(), Opcode::EXIT.as_word()]
        );
        assert_eq!(program.entry, 2);
        assert_eq!(program.text[2], Opcode::ENT.as_word());
    }

    #[test]
    fn test_missing_main() {
        let err = compile_err("int f() { return 0; }");
        assert!(err.message.contains("main"), "{}", err.message);
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = compile_err("int main() {\n  return y;\n}");
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "undeclared identifier 'y'");
    }

    #[test]
    fn test_duplicate_declarations() {
        assert!(compile_err("int a; char a;")
            .message
            .starts_with("duplicate global"));
        assert!(compile_err("int f(int a, int a) { return 0; }")
            .message
            .starts_with("duplicate parameter"));
        assert!(compile_err("int f() { int a; char a; return 0; }")
            .message
            .starts_with("duplicate local"));
    }

    #[test]
    fn test_bad_lvalue() {
        assert!(compile_err("int main() { 1 = 2; }")
            .message
            .contains("lvalue"));
        assert!(compile_err("int main() { return &3; }")
            .message
            .contains("address-of"));
    }

    #[test]
    fn test_bad_dereference() {
        let err = compile_err("int main() { int x; return *x; }");
        assert_eq!(err.message, "bad dereference");
    }

    #[test]
    fn test_strict_returns() {
        let conf = CompileConf {
            strict_returns: true,
            ..Default::default()
        };
        let source = "int f(int x) { if (x) return 1; }\nint main() { return f(1); }";
        let err = crate::compiler::compile_with(source, conf.clone()).unwrap_err();
        assert!(err.to_string().contains("missing return in function 'f'"));

        let source = "int f(int x) { if (x) return 1; else return 2; }\nint main() { return f(1); }";
        assert!(crate::compiler::compile_with(source, conf).is_ok());
    }

    #[test]
    fn test_pointer_scaling_emitted() {
        let mut compiler =
            Compiler::new("int *p; int main() { return p + 1; }", CompileConf::default()).unwrap();
        compiler.compile().unwrap();
        let text = compiler.text();
        let scale = [
            Opcode::PUSH.as_word(),
            Opcode::IMM.as_word(),
            WORD_SIZE as Word,
            Opcode::MUL.as_word(),
            Opcode::ADD.as_word(),
        ];
        assert!(text.windows(scale.len()).any(|window| window == scale));

        let mut compiler =
            Compiler::new("char *p; int main() { return p + 1; }", CompileConf::default())
                .unwrap();
        compiler.compile().unwrap();
        assert!(!compiler
            .text()
            .windows(2)
            .any(|window| window == [Opcode::MUL.as_word(), Opcode::ADD.as_word()]));
    }

    #[test]
    fn test_shadowed_global_restored() {
        let source = "int x; char *y;\n\
                      int f(char x) { int y; y = x; return y; }\n\
                      int main() { return f(1); }";
        let mut compiler = Compiler::new(source, CompileConf::default()).unwrap();
        compiler.compile().unwrap();

        let symbols = compiler.symbols();
        let x = symbols.lookup("x").unwrap();
        let y = symbols.lookup("y").unwrap();
        assert_eq!(symbols.resolve(x).unwrap().class, Class::Global);
        assert_eq!(symbols.resolve(x).unwrap().ty, Ty::Int);
        assert_eq!(symbols.resolve(y).unwrap().ty, Ty::Char.pointer_to());
    }
}
