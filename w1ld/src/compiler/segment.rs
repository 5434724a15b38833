//! Output segments written by the compiler.
use crate::{
    bytecode::Opcode,
    constants::{MemAddr, TextAddr, Word, DATA_START, WORD_SIZE},
    error::{Segment, W1ldError, W1ldResult},
};

/// Allocate a zero-length buffer that can grow to `capacity` elements
/// without reallocating.
fn reserve<T>(segment: Segment, capacity: usize) -> W1ldResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| W1ldError::Allocation {
            segment,
            size: capacity.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(buf)
}

/// Instruction words, written sequentially.
pub struct TextSegment {
    words: Vec<Word>,
    capacity: usize,
    /// Address and opcode of the most recently emitted instruction.
    last: Option<(TextAddr, Opcode)>,
}

impl TextSegment {
    pub fn with_capacity(capacity: usize) -> W1ldResult<Self> {
        Ok(Self {
            words: reserve(Segment::Text, capacity)?,
            capacity,
            last: None,
        })
    }

    /// Address the next emitted word will occupy.
    #[inline]
    pub fn here(&self) -> TextAddr {
        self.words.len()
    }

    #[inline]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    fn push(&mut self, word: Word) -> W1ldResult<TextAddr> {
        if self.words.len() >= self.capacity {
            return Err(W1ldError::CodegenOverflow {
                segment: Segment::Text,
                capacity: self.capacity,
            });
        }
        self.words.push(word);
        Ok(self.words.len() - 1)
    }

    /// Emit an instruction without operand.
    pub fn emit(&mut self, op: Opcode) -> W1ldResult<TextAddr> {
        debug_assert!(!op.has_operand(), "{op} requires an operand");
        let addr = self.push(op.as_word())?;
        self.last = Some((addr, op));
        Ok(addr)
    }

    /// Emit an instruction with its operand.
    ///
    /// Returns the address of the operand word, so jumps can be patched later.
    pub fn emit_with(&mut self, op: Opcode, operand: Word) -> W1ldResult<TextAddr> {
        debug_assert!(op.has_operand(), "{op} takes no operand");
        let addr = self.push(op.as_word())?;
        self.last = Some((addr, op));
        self.push(operand)
    }

    /// Overwrite a previously emitted operand word.
    pub fn patch(&mut self, slot: TextAddr, value: Word) {
        self.words[slot] = value;
    }

    /// Point a jump operand at the next instruction to be emitted.
    pub fn patch_here(&mut self, slot: TextAddr) {
        let here = self.here() as Word;
        self.patch(slot, here);
    }

    /// The final instruction, if it is a load (`LC` or `LI`).
    fn last_load(&self) -> Option<(TextAddr, Opcode)> {
        match self.last {
            Some((addr, op @ (Opcode::LC | Opcode::LI))) if addr + 1 == self.words.len() => {
                Some((addr, op))
            }
            _ => None,
        }
    }

    /// Remove a trailing load, leaving its address in `ax`.
    ///
    /// Returns `false` if the last instruction wasn't a load.
    pub fn take_load(&mut self) -> bool {
        match self.last_load() {
            Some((addr, _)) => {
                self.words.truncate(addr);
                self.last = None;
                true
            }
            None => false,
        }
    }

    /// Replace a trailing load with `PUSH`, keeping its address on the stack.
    pub fn push_load_address(&mut self) -> bool {
        match self.last_load() {
            Some((addr, _)) => {
                self.words[addr] = Opcode::PUSH.as_word();
                self.last = Some((addr, Opcode::PUSH));
                true
            }
            None => false,
        }
    }

    /// Keep the address of a trailing load on the stack, then load again.
    ///
    /// Used by `++` and `--` which both read and write the lvalue.
    pub fn reload(&mut self) -> W1ldResult<bool> {
        match self.last_load() {
            Some((addr, op)) => {
                self.words[addr] = Opcode::PUSH.as_word();
                self.emit(op)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// String literals and global variables.
///
/// Offsets in this segment are the runtime addresses, because the data
/// segment is loaded at the bottom of VM memory. The first word is kept
/// zero so that no object lives at the null address.
#[derive(Debug)]
pub struct DataSegment {
    bytes: Vec<u8>,
    capacity: usize,
}

impl DataSegment {
    pub fn with_capacity(capacity: usize) -> W1ldResult<Self> {
        let mut bytes = reserve(Segment::Data, capacity)?;
        if capacity < DATA_START {
            return Err(W1ldError::CodegenOverflow {
                segment: Segment::Data,
                capacity,
            });
        }
        bytes.resize(DATA_START, 0);
        Ok(Self { bytes, capacity })
    }

    /// Address of the next byte to be written.
    #[inline]
    pub fn here(&self) -> MemAddr {
        self.bytes.len()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn push(&mut self, byte: u8) -> W1ldResult<()> {
        if self.bytes.len() >= self.capacity {
            return Err(W1ldError::CodegenOverflow {
                segment: Segment::Data,
                capacity: self.capacity,
            });
        }
        self.bytes.push(byte);
        Ok(())
    }

    /// NUL terminate the string being written and realign to a word boundary.
    pub fn terminate_string(&mut self) -> W1ldResult<()> {
        self.push(0)?;
        self.align()
    }

    /// Pad with zeros up to the next word boundary.
    pub fn align(&mut self) -> W1ldResult<()> {
        while self.bytes.len() % WORD_SIZE != 0 {
            self.push(0)?;
        }
        Ok(())
    }

    /// Reserve a zeroed, aligned word for a global variable.
    pub fn alloc_word(&mut self) -> W1ldResult<MemAddr> {
        self.align()?;
        let addr = self.here();
        for _ in 0..WORD_SIZE {
            self.push(0)?;
        }
        Ok(addr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_text_overflow() {
        let mut text = TextSegment::with_capacity(3).unwrap();
        text.emit(Opcode::PUSH).unwrap();
        text.emit_with(Opcode::IMM, 7).unwrap();
        let err = text.emit(Opcode::EXIT).unwrap_err();
        assert!(matches!(
            err,
            W1ldError::CodegenOverflow {
                segment: Segment::Text,
                capacity: 3
            }
        ));
    }

    #[test]
    fn test_take_load() {
        let mut text = TextSegment::with_capacity(16).unwrap();
        text.emit_with(Opcode::LEA, -1).unwrap();
        text.emit(Opcode::LI).unwrap();
        assert!(text.take_load());
        assert_eq!(text.words(), &[Opcode::LEA.as_word(), -1]);
        assert!(!text.take_load());
    }

    #[test]
    fn test_operand_never_mistaken_for_load() {
        let mut text = TextSegment::with_capacity(16).unwrap();
        text.emit_with(Opcode::IMM, Opcode::LI.as_word()).unwrap();
        assert!(!text.push_load_address());
        assert!(!text.reload().unwrap());
    }

    #[test]
    fn test_reload() {
        let mut text = TextSegment::with_capacity(16).unwrap();
        text.emit_with(Opcode::IMM, 64).unwrap();
        text.emit(Opcode::LC).unwrap();
        assert!(text.reload().unwrap());
        assert_eq!(
            text.words(),
            &[
                Opcode::IMM.as_word(),
                64,
                Opcode::PUSH.as_word(),
                Opcode::LC.as_word()
            ]
        );
    }

    #[test]
    fn test_data_layout() {
        let mut data = DataSegment::with_capacity(64).unwrap();
        assert_eq!(data.here(), DATA_START);

        data.push(b'h').unwrap();
        data.push(b'i').unwrap();
        data.terminate_string().unwrap();
        assert_eq!(data.here() % WORD_SIZE, 0);

        let addr = data.alloc_word().unwrap();
        assert_eq!(addr, DATA_START + WORD_SIZE);
        assert_eq!(&data.bytes()[DATA_START..DATA_START + 3], b"hi\0");
    }

    #[test]
    fn test_data_overflow() {
        let mut data = DataSegment::with_capacity(DATA_START + 1).unwrap();
        data.push(1).unwrap();
        assert!(matches!(
            data.push(2),
            Err(W1ldError::CodegenOverflow {
                segment: Segment::Data,
                ..
            })
        ));
    }
}
