//! Disassembler.
use std::{
    collections::HashSet,
    fmt::{self, Write as FmtWrite},
};

use itertools::Itertools;

use crate::{
    bytecode::{Opcode, Program},
    constants::{TextAddr, Word},
};

/// Bytes per row in a data segment dump.
const DATA_ROW: usize = 16;

pub struct Disassembler<'a> {
    text: &'a [Word],
    data: &'a [u8],
    entry: Option<TextAddr>,
    /// Addresses targeted by jumps and calls.
    labels: HashSet<TextAddr>,
    /// Addresses targeted by calls.
    functions: HashSet<TextAddr>,
}

impl<'a> Disassembler<'a> {
    pub fn new(text: &'a [Word]) -> Self {
        let mut disasm = Self {
            text,
            data: &[],
            entry: None,
            labels: HashSet::new(),
            functions: HashSet::new(),
        };
        disasm.find_labels();
        disasm
    }

    pub fn from_program(program: &'a Program) -> Self {
        let mut disasm = Self::new(&program.text);
        disasm.data = &program.data[..];
        disasm.entry = Some(program.entry);
        disasm.functions.insert(program.entry);
        disasm
    }

    /// Walk the instructions once to collect branch targets.
    fn find_labels(&mut self) {
        let mut cursor = 0;
        while let Some(&word) = self.text.get(cursor) {
            let op = Opcode::decode(word);
            let operand = self.text.get(cursor + 1).copied();

            if let (Some(op), Some(target)) = (op, operand) {
                if let Ok(target) = TextAddr::try_from(target) {
                    match op {
                        Opcode::CALL => {
                            self.functions.insert(target);
                        }
                        Opcode::JMP | Opcode::JEZ | Opcode::JNZ => {
                            self.labels.insert(target);
                        }
                        _ => {}
                    }
                }
            }

            cursor += Self::width(op);
        }
    }

    /// Number of words the instruction at an address occupies.
    #[inline]
    fn width(op: Option<Opcode>) -> usize {
        match op {
            Some(op) if op.has_operand() => 2,
            _ => 1,
        }
    }

    pub fn print_text(&self) {
        let mut s = String::new();
        match self.disassemble(&mut s) {
            Ok(()) => println!("{s}"),
            Err(err) => log::error!("failed to print text: {err}"),
        }
    }

    /// Write the full listing to the given writer.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        let mut cursor = 0;
        while cursor < self.text.len() {
            cursor = self.instruction(w, cursor)?;
        }

        if !self.data.is_empty() {
            writeln!(w)?;
            self.dump_data(w)?;
        }

        Ok(())
    }

    /// Write a single instruction, returning the address of the next one.
    pub fn instruction<W: FmtWrite>(&self, w: &mut W, addr: TextAddr) -> Result<TextAddr, fmt::Error> {
        if self.functions.contains(&addr) {
            match self.entry {
                Some(entry) if entry == addr => writeln!(w, "main:")?,
                _ => writeln!(w, "fn_{addr:04}:")?,
            }
        } else if self.labels.contains(&addr) {
            writeln!(w, "L{addr:04}:")?;
        }

        let word = match self.text.get(addr) {
            Some(word) => *word,
            None => return Ok(addr + 1),
        };

        match Opcode::decode(word) {
            Some(op) if op.has_operand() => {
                let operand = self.text.get(addr + 1).copied().unwrap_or_default();
                match op {
                    Opcode::JMP | Opcode::JEZ | Opcode::JNZ => {
                        writeln!(w, "{addr:04}: {:<4} L{operand:04}", op.mnemonic())?
                    }
                    Opcode::CALL => writeln!(w, "{addr:04}: {:<4} fn_{operand:04}", op.mnemonic())?,
                    _ => writeln!(w, "{addr:04}: {:<4} {operand}", op.mnemonic())?,
                }
                Ok(addr + 2)
            }
            Some(op) => {
                writeln!(w, "{addr:04}: {}", op.mnemonic())?;
                Ok(addr + 1)
            }
            None => {
                writeln!(w, "{addr:04}: .word {word}")?;
                Ok(addr + 1)
            }
        }
    }

    /// Hex dump of the data segment.
    pub fn dump_data<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        writeln!(w, "data ({} bytes):", self.data.len())?;
        for (row, chunk) in self.data.chunks(DATA_ROW).enumerate() {
            let hex = chunk.iter().map(|b| format!("{b:02x}")).join(" ");
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            writeln!(w, "{:08x}: {:<47}  {}", row * DATA_ROW, hex, ascii)?;
        }
        Ok(())
    }
}
