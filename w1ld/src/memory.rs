//! Byte addressed machine memory.
//!
//! One arena holds three regions of `pool_size` bytes each:
//!
//! ```text
//! 0          pool        2 * pool      3 * pool
//! | data     | heap      | stack  <--- |
//! ```
//!
//! Programs hold addresses as plain integers, so every access is
//! checked against the arena bounds. The first data word is reserved,
//! which makes address 0 an invalid pointer.
use std::ops::Range;

use crate::{
    constants::{MemAddr, Word, DATA_START, WORD_SIZE},
    error::{ResourceError, Segment, W1ldError, W1ldResult},
};

pub struct Memory {
    bytes: Box<[u8]>,
    pool_size: usize,
    /// Next free heap byte.
    heap_top: MemAddr,
}

impl Memory {
    pub fn new(pool_size: usize) -> W1ldResult<Self> {
        let len = pool_size.checked_mul(3).ok_or(W1ldError::Allocation {
            segment: Segment::Stack,
            size: usize::MAX,
        })?;

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| W1ldError::Allocation {
                segment: Segment::Stack,
                size: len,
            })?;
        bytes.resize(len, 0);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            pool_size,
            heap_top: pool_size,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    #[inline]
    pub fn heap_base(&self) -> MemAddr {
        self.pool_size
    }

    /// Lowest address the stack may grow down to.
    #[inline]
    pub fn stack_limit(&self) -> MemAddr {
        self.pool_size * 2
    }

    /// Initial stack pointer. One past the highest stack byte.
    #[inline]
    pub fn stack_base(&self) -> MemAddr {
        self.pool_size * 3
    }

    /// Zero all regions and release every heap allocation.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
        self.heap_top = self.heap_base();
    }

    /// Copy a data segment image to the bottom of memory.
    pub fn load_data(&mut self, data: &[u8]) -> W1ldResult<()> {
        if data.len() > self.pool_size {
            return Err(W1ldError::CodegenOverflow {
                segment: Segment::Data,
                capacity: self.pool_size,
            });
        }
        self.bytes[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Bounds check an access of `len` bytes at `addr`.
    fn range(&self, addr: Word, len: usize) -> Result<Range<usize>, ResourceError> {
        let err = || ResourceError::Memory { addr, len };
        let start = usize::try_from(addr).map_err(|_| err())?;
        let end = start.checked_add(len).ok_or_else(err)?;
        if start < DATA_START || end > self.bytes.len() {
            return Err(err());
        }
        Ok(start..end)
    }

    pub fn load_word(&self, addr: Word) -> Result<Word, ResourceError> {
        let range = self.range(addr, WORD_SIZE)?;
        let mut buf = [0; WORD_SIZE];
        buf.copy_from_slice(&self.bytes[range]);
        Ok(Word::from_le_bytes(buf))
    }

    pub fn store_word(&mut self, addr: Word, value: Word) -> Result<(), ResourceError> {
        let range = self.range(addr, WORD_SIZE)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn load_byte(&self, addr: Word) -> Result<u8, ResourceError> {
        let range = self.range(addr, 1)?;
        Ok(self.bytes[range.start])
    }

    pub fn store_byte(&mut self, addr: Word, value: u8) -> Result<(), ResourceError> {
        let range = self.range(addr, 1)?;
        self.bytes[range.start] = value;
        Ok(())
    }

    /// `len` bytes starting at `addr`. A negative length is an error.
    pub fn slice(&self, addr: Word, len: Word) -> Result<&[u8], ResourceError> {
        let len = Self::length(addr, len)?;
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, addr: Word, len: Word) -> Result<&mut [u8], ResourceError> {
        let len = Self::length(addr, len)?;
        let range = self.range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    fn length(addr: Word, len: Word) -> Result<usize, ResourceError> {
        usize::try_from(len).map_err(|_| ResourceError::Memory { addr, len: 0 })
    }

    /// NUL terminated string at `addr`, without the terminator.
    pub fn c_str(&self, addr: Word) -> Result<&[u8], ResourceError> {
        let range = self.range(addr, 0)?;
        let tail = &self.bytes[range.start..];
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(&tail[..end]),
            None => Err(ResourceError::Memory {
                addr,
                len: tail.len(),
            }),
        }
    }

    /// Allocate `size` bytes on the heap, word aligned.
    ///
    /// Returns `None` when the heap is exhausted or the size is negative.
    /// Memory is never freed until the next [`Memory::clear`].
    pub fn alloc(&mut self, size: Word) -> Option<MemAddr> {
        let size = usize::try_from(size).ok()?;
        let addr = self.heap_top;
        let padded = size.checked_add(WORD_SIZE - 1)? / WORD_SIZE * WORD_SIZE;
        let end = addr.checked_add(padded)?;
        if end > self.stack_limit() {
            return None;
        }
        self.heap_top = end;
        Some(addr)
    }
}
