//! Symbol table.
//!
//! Every distinct identifier gets exactly one entry, created the first
//! time the lexer sees the name. Entries are never removed.
//!
//! Declarations resolve in two tiers. Parameters and locals of the
//! function being compiled live in a scope map that is consulted first,
//! and is cleared when the function body ends. Global declarations are
//! stored on the entry itself and are never touched by local scopes,
//! so leaving a function restores any shadowed global exactly.
use std::collections::HashMap;

use smol_str::SmolStr;

use super::{tokens::Keyword, ty::Ty};
use crate::constants::Word;

/// Index of an entry in the [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage class of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// Global variable, value is its data address.
    Global,
    /// Parameter or local variable, value is its frame slot.
    Local,
    /// Builtin function, value is its opcode.
    Sys,
    /// Enumeration constant, value is the constant.
    Enum,
    /// User function, value is its text address.
    Func,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decl {
    pub class: Class,
    pub ty: Ty,
    pub value: Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub hash: u64,
    /// Set when the name is reserved.
    pub keyword: Option<Keyword>,
    /// Declaration at global scope, `None` while undeclared.
    pub global: Option<Decl>,
}

#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    /// Declarations local to the function being compiled.
    locals: HashMap<SymbolId, Decl>,
}

impl SymbolTable {
    /// Create a table with the reserved keywords already entered.
    pub fn new() -> Self {
        let mut table = Self {
            symbols: vec![],
            locals: HashMap::new(),
        };

        for keyword in Keyword::ALL {
            let id = table.intern(keyword.as_str().as_bytes());
            table.symbols[id.index()].keyword = Some(keyword);
        }

        table
    }

    /// Rolling hash used to pre-compare names.
    pub fn hash(name: &[u8]) -> u64 {
        let mut bytes = name.iter();
        let seed = bytes.next().copied().unwrap_or_default() as u64;
        bytes.fold(seed, |hash, &c| {
            hash.wrapping_mul(143).wrapping_add(c as u64)
        })
    }

    /// Find the entry for `name`, appending a new one if the name is unseen.
    pub fn intern(&mut self, name: &[u8]) -> SymbolId {
        let hash = Self::hash(name);
        if let Some(id) = self.find(hash, name) {
            return id;
        }

        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: SmolStr::new(String::from_utf8_lossy(name)),
            hash,
            keyword: None,
            global: None,
        });
        id
    }

    /// Find the entry for `name` without inserting.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.find(Self::hash(name.as_bytes()), name.as_bytes())
    }

    fn find(&self, hash: u64, name: &[u8]) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|symbol| symbol.hash == hash && symbol.name.as_bytes() == name)
            .map(|index| SymbolId(index as u32))
    }

    #[inline]
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    #[inline]
    pub fn name(&self, id: SymbolId) -> &str {
        self.symbols[id.index()].name.as_str()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Declaration currently in effect: local scope first, then global.
    #[inline]
    pub fn resolve(&self, id: SymbolId) -> Option<Decl> {
        self.locals
            .get(&id)
            .copied()
            .or(self.symbols[id.index()].global)
    }

    /// Declare at global scope.
    ///
    /// Returns `false`, leaving the entry unchanged, when the name already
    /// has a global declaration.
    pub fn declare_global(&mut self, id: SymbolId, decl: Decl) -> bool {
        let symbol = &mut self.symbols[id.index()];
        if symbol.global.is_some() {
            return false;
        }
        symbol.global = Some(decl);
        true
    }

    /// Declare in the current function's scope, shadowing any global.
    ///
    /// Returns `false` when the name is already local to this function.
    pub fn declare_local(&mut self, id: SymbolId, decl: Decl) -> bool {
        if self.locals.contains_key(&id) {
            return false;
        }
        self.locals.insert(id, decl);
        true
    }

    /// End the current function body, restoring every shadowed global.
    pub fn leave_function(&mut self) {
        self.locals.clear();
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
