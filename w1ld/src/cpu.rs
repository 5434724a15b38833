//! CPU registers and memory state.
use crate::{
    constants::{MemAddr, TextAddr, Word, WORD_SIZE},
    error::{ResourceError, W1ldResult},
    memory::Memory,
};

/// Core state for a w1ld interpreter.
pub struct Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter, index of the next word in the text segment.
    pub(crate) pc: TextAddr,
    /// Stack pointer, address of the top stack word. Grows down.
    pub(crate) sp: MemAddr,
    /// Base pointer of the current call frame.
    pub(crate) bp: MemAddr,
    /// Accumulator holding the result of the last operation.
    pub(crate) ax: Word,

    // ------------------------------------------------------------------------
    // Memory
    pub(crate) memory: Memory,

    // ------------------------------------------------------------------------
    // Control
    /// Number of instructions executed since the program was loaded.
    pub(crate) cycle: u64,
}

impl Cpu {
    pub fn new(pool_size: usize) -> W1ldResult<Self> {
        let memory = Memory::new(pool_size)?;
        let stack_base = memory.stack_base();
        Ok(Self {
            pc: 0,
            sp: stack_base,
            bp: stack_base,
            ax: 0,
            memory,
            cycle: 0,
        })
    }

    /// Reset the registers. Memory is left untouched.
    pub(crate) fn reset(&mut self) {
        self.pc = 0;
        self.sp = self.memory.stack_base();
        self.bp = self.sp;
        self.ax = 0;
        self.cycle = 0;
    }

    pub fn pc(&self) -> TextAddr {
        self.pc
    }

    pub fn sp(&self) -> MemAddr {
        self.sp
    }

    pub fn bp(&self) -> MemAddr {
        self.bp
    }

    pub fn ax(&self) -> Word {
        self.ax
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Move the stack pointer, which must stay inside the stack region.
    pub(crate) fn set_sp(&mut self, sp: Word) -> Result<(), ResourceError> {
        match usize::try_from(sp) {
            Ok(addr) if (self.memory.stack_limit()..=self.memory.stack_base()).contains(&addr) => {
                self.sp = addr;
                Ok(())
            }
            _ => Err(ResourceError::Stack { sp }),
        }
    }

    pub(crate) fn push(&mut self, value: Word) -> Result<(), ResourceError> {
        self.set_sp(self.sp as Word - WORD_SIZE as Word)?;
        self.memory.store_word(self.sp as Word, value)
    }

    pub(crate) fn pop(&mut self) -> Result<Word, ResourceError> {
        let value = self.stack_arg(0)?;
        self.sp += WORD_SIZE;
        Ok(value)
    }

    /// Word at `sp + index * word`, without popping.
    ///
    /// Builtins find their arguments this way, last argument at index 0.
    pub(crate) fn stack_arg(&self, index: usize) -> Result<Word, ResourceError> {
        let addr = index
            .checked_mul(WORD_SIZE)
            .and_then(|offset| self.sp.checked_add(offset))
            .filter(|addr| *addr < self.memory.stack_base())
            .ok_or(ResourceError::Stack { sp: self.sp as Word })?;
        self.memory.load_word(addr as Word)
    }

    /// Number of words currently on the stack.
    pub(crate) fn stack_depth(&self) -> usize {
        (self.memory.stack_base() - self.sp) / WORD_SIZE
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut cpu = Cpu::new(64).unwrap();
        cpu.push(1).unwrap();
        cpu.push(2).unwrap();
        assert_eq!(cpu.sp(), 192 - 16);
        assert_eq!(cpu.stack_arg(0).unwrap(), 2);
        assert_eq!(cpu.stack_arg(1).unwrap(), 1);
        assert_eq!(cpu.pop().unwrap(), 2);
        assert_eq!(cpu.pop().unwrap(), 1);
        assert_eq!(cpu.stack_depth(), 0);
        assert_eq!(cpu.pop(), Err(ResourceError::Stack { sp: 192 }));
    }

    #[test]
    fn test_stack_overflow() {
        let mut cpu = Cpu::new(64).unwrap();
        for i in 0..8 {
            cpu.push(i).unwrap();
        }
        assert_eq!(cpu.push(8), Err(ResourceError::Stack { sp: 120 }));
        assert_eq!(cpu.sp(), 128);
    }

    #[test]
    fn test_set_sp_bounds() {
        let mut cpu = Cpu::new(64).unwrap();
        assert!(cpu.set_sp(128).is_ok());
        assert!(cpu.set_sp(192).is_ok());
        assert!(cpu.set_sp(193).is_err());
        assert!(cpu.set_sp(64).is_err());
        assert!(cpu.set_sp(-8).is_err());
    }

    #[test]
    fn test_stack_arg_out_of_range() {
        let mut cpu = Cpu::new(64).unwrap();
        cpu.push(7).unwrap();
        assert_eq!(cpu.stack_depth(), 1);
        assert!(matches!(cpu.stack_arg(1), Err(ResourceError::Stack { .. })));
        assert!(matches!(cpu.stack_arg(1 << 62), Err(ResourceError::Stack { .. })));
        assert!(matches!(cpu.stack_arg(usize::MAX), Err(ResourceError::Stack { .. })));
    }
}
